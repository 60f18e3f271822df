//! The compiled document model.
//!
//! A [`BotDocument`] is the immutable output of one
//! [`compile`](crate::compiler::compile) call: header metadata, the fenced
//! blocks in document order, recognized tables, inline assets, workflow
//! graph variants and the rendered info region. Downstream components only
//! read it; per-request views (activation contexts, selected block sets) are
//! derived fresh each time.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagram::Diagram;

/// Header metadata parsed from YAML front matter.
pub type Header = serde_json::Map<String, Value>;

/// Attribute map attached to a fenced block or inline asset.
///
/// Values are strings or numbers, exactly as written in the `{...}` block.
pub type Attributes = FxHashMap<String, Value>;

/// Payload of a fenced block.
///
/// `json`/`yaml` blocks are decoded into structured data at compile time;
/// a markdown block with an `agent` class is compiled recursively into a
/// nested document. Everything else stays raw text.
///
/// Serialized externally tagged: a structured payload that happens to be a
/// bare JSON string must stay distinguishable from raw text across a
/// round-trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlockContent {
    Text(String),
    Document(Box<BotDocument>),
    Data(Value),
}

impl BlockContent {
    /// The raw text payload, if this content is plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The decoded structured payload, if any.
    #[must_use]
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            BlockContent::Data(v) => Some(v),
            _ => None,
        }
    }

    /// The nested document, if this block embeds an agent definition.
    #[must_use]
    pub fn as_document(&self) -> Option<&BotDocument> {
        match self {
            BlockContent::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

impl Default for BlockContent {
    fn default() -> Self {
        BlockContent::Text(String::new())
    }
}

/// A uniquely-identified, typed, conditionally-activatable content unit.
///
/// Blocks without an `id` attribute never make it into a document; the
/// compiler discards them before construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Language tag from the fence info string, or inferred from a
    /// known-language class.
    pub language: Option<String>,
    /// Free-form class tags (`.foo` in the attribute block).
    pub classes: Vec<String>,
    /// Attribute map; always contains `id`.
    pub attributes: Attributes,
    /// Raw or decoded payload.
    pub content: BlockContent,
}

impl Block {
    /// The block's addressable id.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }

    /// The activation expression from the `match` attribute, if present.
    #[must_use]
    pub fn match_expr(&self) -> Option<&str> {
        self.attributes.get("match").and_then(Value::as_str)
    }

    /// True if the class list contains `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// One row of a recognized topic table.
///
/// Rows whose `disabled` cell was truthy are dropped at compile time and
/// never appear here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRow {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prompt_prefix: String,
    #[serde(default)]
    pub prompt_suffix: String,
    #[serde(default)]
    pub prompt_regex: String,
    #[serde(default)]
    pub disabled: bool,
}

/// An inline image or link collected from the document body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Image `src` or link `href`.
    pub src: String,
    /// Title text, when given.
    pub title: Option<String>,
    /// Alt text (images) or link text.
    pub text: String,
    /// Class tags from a trailing `{...}` attribute block.
    pub classes: Vec<String>,
    /// Remaining attributes from the attribute block.
    pub attributes: Attributes,
    /// True for links tagged with the `mcp` class: a remote-tool endpoint
    /// rather than a content reference.
    pub remote_tool: bool,
}

/// A workflow graph extracted from a `graph` block, with its precomputed
/// sentinel-to-sentinel walks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphVariant {
    pub graph: Diagram,
    /// Valid walks sorted ascending by length.
    pub valid_paths: Vec<Vec<String>>,
    /// Raw fence attributes, including any search-bound overrides.
    pub attributes: Attributes,
}

impl GraphVariant {
    /// The activation expression from the `match` attribute, if present.
    #[must_use]
    pub fn match_expr(&self) -> Option<&str> {
        self.attributes.get("match").and_then(Value::as_str)
    }
}

/// A compiled BotMark document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BotDocument {
    /// Front-matter metadata; empty when absent or malformed.
    pub header: Header,
    /// Addressable blocks in document order. The same id may appear more
    /// than once; activation-time selection resolves which variant applies.
    pub blocks: Vec<Block>,
    /// Recognized named tables (currently only `topic`).
    pub tables: FxHashMap<String, Vec<TopicRow>>,
    /// Inline images in document order.
    pub images: Vec<Asset>,
    /// Inline links in document order.
    pub links: Vec<Asset>,
    /// Graph variants in document order.
    pub graphs: Vec<GraphVariant>,
    /// Rendered markup of the `::: info` container region.
    pub info: String,
}

impl BotDocument {
    /// Topic rows, or an empty slice when the document has no topic table.
    #[must_use]
    pub fn topics(&self) -> &[TopicRow] {
        self.tables.get("topic").map_or(&[], Vec::as_slice)
    }

    /// Unconditional id lookup over document order; when the same id occurs
    /// more than once, the later block wins.
    #[must_use]
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().rev().find(|b| b.id() == Some(id))
    }

    /// Deep copy with the graph variants removed. Used when a document is
    /// bound as the wildcard capability so traversal cannot recurse into
    /// its own workflow.
    #[must_use]
    pub fn clone_without_graphs(&self) -> Self {
        Self {
            graphs: Vec::new(),
            ..self.clone()
        }
    }
}
