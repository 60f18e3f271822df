use std::sync::Arc;

use botmark::agent::CapabilityFactory;
use botmark::compiler::{CompileOptions, compile};
use botmark::diagram::{self, PathBounds};
use botmark::document::{BotDocument, GraphVariant};
use botmark::traversal::{Capability, CapabilityError, Router};

use super::capabilities::SuffixCapability;

/// Compile with default options.
pub fn doc(source: &str) -> BotDocument {
    compile(source, &CompileOptions::default())
}

/// Parse diagram text and enumerate its walks with default bounds.
pub fn variant(code: &str) -> GraphVariant {
    let graph = diagram::parse(code);
    let valid_paths = diagram::enumerate_paths(&graph, &PathBounds::default());
    GraphVariant {
        graph,
        valid_paths,
        ..GraphVariant::default()
    }
}

/// Factory that builds a [`SuffixCapability`] tagging output with the
/// nested document's `name` header, so transcripts show which definition
/// handled each node.
pub struct NameTagFactory {
    pub router: Option<Arc<dyn Router>>,
}

impl NameTagFactory {
    pub fn new() -> Self {
        Self { router: None }
    }

    pub fn with_router(router: Arc<dyn Router>) -> Self {
        Self {
            router: Some(router),
        }
    }
}

impl CapabilityFactory for NameTagFactory {
    fn build(&self, document: &BotDocument) -> Result<Arc<dyn Capability>, CapabilityError> {
        let name = document
            .header
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("anon");
        Ok(Arc::new(SuffixCapability::new(format!("[{name}]"))))
    }

    fn router(&self) -> Option<Arc<dyn Router>> {
        self.router.clone()
    }
}
