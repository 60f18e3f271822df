//! Ties the pieces together: one compiled document acting as an agent.
//!
//! [`BotAgent`] owns a [`BotDocument`] plus the deployment [`Defaults`].
//! For each utterance it activates topics, ranks and selects blocks and a
//! graph variant, builds the capability map from embedded agent-definition
//! blocks through a caller-supplied [`CapabilityFactory`], and runs the
//! traversal. Documents without an active graph variant answer `None` and
//! leave response generation to the embedding application.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::activation::{self, ActivationContext, rank};
use crate::compiler::{CompileOptions, compile};
use crate::defaults::Defaults;
use crate::document::{Block, BotDocument, GraphVariant, Header};
use crate::message::Message;
use crate::traversal::{
    Capability, CapabilityError, GraphTraversal, Router, TraversalError, TraversalOptions,
    TraversalOutcome, WILDCARD,
};

/// Builds runnable capabilities from agent-definition documents.
///
/// This is the seam where an LLM backend (or anything else) plugs in: the
/// engine hands over the nested document, already overlaid with the
/// deployment defaults, and gets back the capability to bind under that
/// node id.
pub trait CapabilityFactory: Send + Sync {
    fn build(&self, document: &BotDocument) -> Result<Arc<dyn Capability>, CapabilityError>;

    /// Router for multi-option traversal steps. `None` means branch
    /// decisions fall through to the first offered option.
    fn router(&self) -> Option<Arc<dyn Router>> {
        None
    }
}

/// Orchestration failure.
#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error("building the capability for '{node_id}' failed")]
    #[diagnostic(code(botmark::agent::factory))]
    Factory {
        node_id: String,
        #[source]
        source: CapabilityError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Traversal(#[from] TraversalError),
}

/// Caller-side inputs for one response.
#[derive(Clone, Debug, Default)]
pub struct RespondOptions {
    /// History every capability starts from on its first visit.
    pub history: Vec<Message>,
}

/// The per-utterance activation snapshot.
pub struct Activation<'a> {
    /// Topic name to active flag, from the document's topic table.
    pub context: ActivationContext,
    /// Winning block per id.
    pub blocks: FxHashMap<String, Block>,
    /// Winning graph variant, if any activated.
    pub graph: Option<&'a GraphVariant>,
    /// Front matter overlaid with the selected `header` block, with the
    /// deployment defaults filling the gaps.
    pub header: Header,
}

/// A question/answer pair harvested from a `unittest` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: Option<String>,
}

/// Parse `#` headings as questions and `>` quotes as their expected
/// answers. A blank line or the next heading closes the current pair.
#[must_use]
pub fn qa_pairs(text: &str) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer_lines: Vec<String> = Vec::new();

    let mut flush = |question: &mut Option<String>, answer_lines: &mut Vec<String>| {
        if let Some(q) = question.take() {
            let answer = (!answer_lines.is_empty())
                .then(|| answer_lines.join("\n").trim().to_string());
            pairs.push(QaPair {
                question: q,
                answer,
            });
        }
        answer_lines.clear();
    };

    for line in text.trim().lines() {
        let line = line.trim();
        if let Some(heading) = line.strip_prefix('#') {
            flush(&mut question, &mut answer_lines);
            question = Some(heading.trim_start_matches('#').trim().to_string());
        } else if let Some(quoted) = line.strip_prefix('>') {
            answer_lines.push(quoted.trim().to_string());
        } else if line.is_empty() {
            flush(&mut question, &mut answer_lines);
        }
    }
    flush(&mut question, &mut answer_lines);
    pairs
}

/// One document plus deployment defaults, ready to respond.
pub struct BotAgent {
    document: BotDocument,
    defaults: Defaults,
}

impl BotAgent {
    #[must_use]
    pub fn new(document: BotDocument) -> Self {
        Self::with_defaults(document, Defaults::default())
    }

    #[must_use]
    pub fn with_defaults(document: BotDocument, defaults: Defaults) -> Self {
        Self { document, defaults }
    }

    /// Compile source text and wrap it.
    #[must_use]
    pub fn compile(source: &str, options: &CompileOptions) -> Self {
        Self::new(compile(source, options))
    }

    #[must_use]
    pub fn document(&self) -> &BotDocument {
        &self.document
    }

    /// Activate topics and select blocks, graph and header for one
    /// utterance.
    #[must_use]
    pub fn activate(&self, utterance: &str) -> Activation<'_> {
        let context = activation::find_active_topics(self.document.topics(), utterance);
        let blocks = activation::select_blocks(&self.document.blocks, |b| {
            rank(b.match_expr(), &context)
        });
        let graph = activation::select_graph(&self.document.graphs, |g| {
            rank(g.match_expr(), &context)
        });

        let mut header = self.document.header.clone();
        if let Some(block) = blocks.get("header") {
            if let Some(Value::Object(overlay)) = block.content.as_data() {
                for (key, value) in overlay {
                    header.insert(key.clone(), value.clone());
                }
            }
        }
        self.defaults.merge_into(&mut header);

        Activation {
            context,
            blocks,
            graph,
            header,
        }
    }

    /// Answer one utterance through the active graph variant.
    ///
    /// `None` means no variant activated; the caller decides what a
    /// graph-less response looks like. Every node of the active graph is
    /// bound to the capability built from its agent-definition block; the
    /// document itself (graphs removed, so traversal cannot recurse into
    /// its own workflow) is bound as the wildcard for the rest.
    pub async fn respond(
        &self,
        utterance: &str,
        factory: &dyn CapabilityFactory,
        options: &RespondOptions,
    ) -> Result<Option<TraversalOutcome>, AgentError> {
        let activation = self.activate(utterance);
        let Some(variant) = activation.graph else {
            tracing::debug!("no graph variant activated");
            return Ok(None);
        };

        let mut capabilities: FxHashMap<String, Arc<dyn Capability>> = FxHashMap::default();
        let fallback = self.document.clone_without_graphs();
        capabilities.insert(
            WILDCARD.to_string(),
            factory
                .build(&fallback)
                .map_err(|source| AgentError::Factory {
                    node_id: WILDCARD.to_string(),
                    source,
                })?,
        );

        for (id, block) in &activation.blocks {
            if !block.has_class("agent") {
                continue;
            }
            let Some(nested) = block.content.as_document() else {
                continue;
            };
            let mut document = nested.clone();
            self.defaults.merge_into(&mut document.header);
            capabilities.insert(
                id.clone(),
                factory
                    .build(&document)
                    .map_err(|source| AgentError::Factory {
                        node_id: id.clone(),
                        source,
                    })?,
            );
        }

        let traversal = GraphTraversal::new(variant.clone(), capabilities, factory.router())?;
        let outcome = traversal
            .run(TraversalOptions {
                start_message: utterance.to_string(),
                initial_history: options.history.clone(),
            })
            .await?;
        Ok(Some(outcome))
    }

    /// Question/answer pairs from every `unittest` block, sorted by block
    /// id for stable iteration.
    #[must_use]
    pub fn unit_tests(&self) -> Vec<(String, Vec<QaPair>)> {
        let selected = activation::select_blocks(&self.document.blocks, |b| {
            if b.has_class("unittest") { 1 } else { -1 }
        });
        let mut cases: Vec<(String, Vec<QaPair>)> = selected
            .into_iter()
            .filter_map(|(id, block)| {
                let pairs = block.content.as_text().map(qa_pairs)?;
                (!pairs.is_empty()).then_some((id, pairs))
            })
            .collect();
        cases.sort_by(|a, b| a.0.cmp(&b.0));
        cases
    }
}
