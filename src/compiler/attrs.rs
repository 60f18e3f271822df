//! Fence info-string and `{...}` attribute-block parsing.
//!
//! The syntax is the familiar attribute-list form: `{#id .class key=value
//! other="quoted value"}`. The same block appears after inline links and
//! images and inside fence info strings (`` ```python {#tool .agent} ``).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::document::Attributes;

static INFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)?\s*(\{.*\})?").expect("info string pattern"));

/// Split a fence info string into `(language, attributes, classes)`.
#[must_use]
pub fn parse_info_string(info: &str) -> (Option<String>, Attributes, Vec<String>) {
    let Some(caps) = INFO_RE.captures(info.trim()) else {
        return (None, Attributes::default(), Vec::new());
    };
    let language = caps.get(1).map(|m| m.as_str().to_string());
    let (attributes, classes) = caps
        .get(2)
        .map(|m| {
            let inner = &m.as_str()[1..m.as_str().len() - 1];
            parse_attr_block(inner)
        })
        .unwrap_or_default();
    (language, attributes, classes)
}

/// Parse the inside of a `{...}` block into attributes and classes.
///
/// `#x` sets the `id` attribute, `.x` appends a class, `k=v` sets an
/// attribute (double-quoted values may contain spaces). Values that parse
/// as numbers are stored as numbers. Malformed fragments are skipped.
#[must_use]
pub fn parse_attr_block(src: &str) -> (Attributes, Vec<String>) {
    let mut attributes = Attributes::default();
    let mut classes = Vec::new();

    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            chars.next();
            let id = read_bare(&mut chars);
            if !id.is_empty() {
                attributes.insert("id".to_string(), Value::String(id));
            }
        } else if c == '.' {
            chars.next();
            let class = read_bare(&mut chars);
            if !class.is_empty() && !classes.contains(&class) {
                classes.push(class);
            }
        } else {
            let key = read_until(&mut chars, |c| c == '=' || c.is_whitespace());
            if chars.peek() == Some(&'=') {
                chars.next();
                let value = read_value(&mut chars);
                if !key.is_empty() {
                    attributes.insert(key, coerce(&value));
                }
            }
            // A bare word with no '=' carries no meaning here; drop it.
        }
    }

    (attributes, classes)
}

fn read_bare(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    read_until(chars, char::is_whitespace)
}

fn read_until(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    stop: impl Fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if stop(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    if chars.peek() == Some(&'"') {
        chars.next();
        let value = read_until(chars, |c| c == '"');
        chars.next(); // closing quote, if present
        value
    } else {
        read_bare(chars)
    }
}

/// Numbers stay numbers, everything else is a string.
fn coerce(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_string())
}

/// Numeric view of an attribute value written as a number or numeric string.
#[must_use]
pub fn attr_u64(attributes: &Attributes, key: &str) -> Option<u64> {
    match attributes.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Float view of an attribute value.
#[must_use]
pub fn attr_f64(attributes: &Attributes, key: &str) -> Option<f64> {
    match attributes.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
