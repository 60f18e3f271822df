//! # BotMark: Markdown-defined Chatbots
//!
//! BotMark turns annotated Markdown documents into runnable conversational
//! agents: a document compiler, a conditional activation engine, a workflow
//! diagram model with bounded path enumeration, and an async graph traversal
//! engine that schedules capabilities along the enumerated paths.
//!
//! ## Core Concepts
//!
//! - **Document**: one Markdown file compiled into a [`document::BotDocument`]
//!   (header, blocks, topic tables, assets, graph variants, info region)
//! - **Activation**: per-utterance topic matching plus specificity-ranked
//!   selection of blocks and graph variants
//! - **Diagram**: the flowchart/state-diagram mini-language embedded in
//!   `graph` blocks, with every start-to-end walk precomputed
//! - **Traversal**: async execution of capabilities along the valid walks,
//!   with router-driven branching under a closed-choice contract
//!
//! ## Quick Start
//!
//! ### Compiling a document
//!
//! ````
//! use botmark::compiler::{compile, CompileOptions};
//!
//! let source = r#"---
//! model: example
//! ---
//!
//! | Topic | Description | prompt_prefix |
//! |-------|-------------|---------------|
//! | greet | greetings   | hi            |
//!
//! ```text {#system match="greet"}
//! Greet the user warmly.
//! ```
//! "#;
//!
//! let doc = compile(source, &CompileOptions::default());
//! assert_eq!(doc.topics().len(), 1);
//! assert_eq!(doc.blocks[0].id(), Some("system"));
//! ````
//!
//! ### Activating against an utterance
//!
//! ```
//! use botmark::activation::{find_active_topics, rank, select_blocks};
//! use botmark::compiler::{compile, CompileOptions};
//!
//! # let source = "| Topic | Description | prompt_prefix |\n|-|-|-|\n| greet | greetings | hi |\n";
//! let doc = compile(source, &CompileOptions::default());
//! let context = find_active_topics(doc.topics(), "hi there");
//! assert_eq!(context.get("greet"), Some(&true));
//!
//! let selected = select_blocks(&doc.blocks, |b| rank(b.match_expr(), &context));
//! assert!(selected.is_empty());
//! ```
//!
//! ### Running a traversal
//!
//! Capabilities implement [`traversal::Capability`]; a
//! [`traversal::GraphTraversal`] binds them to a graph variant and walks it.
//! Binding fails fast when a graph node has no capability; see the module
//! docs for the full contract.
//!
//! ## Module Guide
//!
//! - [`compiler`] - Markdown source to [`document::BotDocument`]
//! - [`document`] - The compiled document model
//! - [`activation`] - Topic matching and ranked block/graph selection
//! - [`diagram`] - Diagram grammar and bounded path enumeration
//! - [`traversal`] - Async capability scheduling along valid walks
//! - [`agent`] - End-to-end orchestration of one document
//! - [`message`] - Conversation turn primitives
//! - [`fetch`] - Content hydration for `src`-bearing blocks
//! - [`defaults`] - Deployment-wide header defaults
//! - [`telemetry`] - Subscriber setup for embedding applications

pub mod activation;
pub mod agent;
pub mod compiler;
pub mod defaults;
pub mod diagram;
pub mod document;
pub mod fetch;
pub mod message;
pub mod telemetry;
pub mod traversal;
