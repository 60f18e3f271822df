//! Recognition of named tables in the document body.
//!
//! A table is matched against a fixed set of patterns; the first pattern
//! whose required headers are all present claims the table, and every other
//! table is ignored. The only pattern today is `topic`: required columns
//! `topic` (the row name) and `description`, optional matcher columns
//! defaulting to empty, and a `disabled` column defaulting to falsy. Rows
//! with a truthy `disabled` cell are dropped at compile time.

use serde_json::Value;

use crate::document::TopicRow;

/// A table as tokenized from the body: lowercased header cells plus rows of
/// raw cell text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    fn cell<'a>(&self, row: &'a [String], header: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == header)?;
        row.get(idx).map(String::as_str)
    }
}

/// Loose truthiness over attribute values: booleans as-is, numbers by
/// (near-)zero test, strings by the usual switch words.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 1e-4),
        Value::String(s) => is_truthy_str(s),
        _ => false,
    }
}

#[must_use]
pub fn is_truthy_str(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Interpret a table as a topic table, if its headers qualify.
///
/// Returns `None` when the `topic`/`description` columns are missing, so the
/// caller can fall through to other patterns (or ignore the table).
#[must_use]
pub fn topic_rows(table: &RawTable) -> Option<Vec<TopicRow>> {
    if !["topic", "description"]
        .iter()
        .all(|h| table.headers.iter().any(|have| have == h))
    {
        return None;
    }

    let mut rows = Vec::new();
    for row in &table.rows {
        let get = |header: &str, default: &str| {
            table
                .cell(row, header)
                .unwrap_or(default)
                .to_string()
        };
        if is_truthy_str(&get("disabled", "no")) {
            continue;
        }
        rows.push(TopicRow {
            name: get("topic", ""),
            description: get("description", ""),
            prompt_prefix: get("prompt_prefix", ""),
            prompt_suffix: get("prompt_suffix", ""),
            prompt_regex: get("prompt_regex", ""),
            disabled: false,
        });
    }
    Some(rows)
}
