//! Deployment-wide header defaults.
//!
//! A document's front matter usually carries only what is specific to that
//! bot; shared settings (model name, temperature, locale) come from the
//! environment. [`Defaults`] is that overlay, passed explicitly wherever it
//! applies. Nothing in this crate reads it ambiently.

use serde_json::Value;

use crate::document::Header;

/// Header keys merged into every compiled document that opts in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Defaults {
    pub header: Header,
}

impl Defaults {
    #[must_use]
    pub fn new(header: Header) -> Self {
        Self { header }
    }

    /// Read defaults from the `BOTMARK_DEFAULTS` environment variable
    /// (a JSON object), loading `.env` first. Anything other than a JSON
    /// object is logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let Ok(raw) = std::env::var("BOTMARK_DEFAULTS") else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(header)) => Self { header },
            Ok(_) => {
                tracing::warn!("BOTMARK_DEFAULTS is not a JSON object, ignoring");
                Self::default()
            }
            Err(err) => {
                tracing::warn!(%err, "BOTMARK_DEFAULTS rejected, ignoring");
                Self::default()
            }
        }
    }

    /// Fill `header` with every default key it does not set itself.
    /// Document-provided values always win.
    pub fn merge_into(&self, header: &mut Header) {
        for (key, value) in &self.header {
            if !header.contains_key(key) {
                header.insert(key.clone(), value.clone());
            }
        }
    }
}
