//! The document compiler.
//!
//! [`compile`] turns BotMark source text into a [`BotDocument`] in one pass:
//! cut the working region between the sentinel comments, split off YAML
//! front matter, strip HTML comments, then walk the Markdown event stream
//! collecting fenced blocks, recognized tables, inline assets, graph blocks
//! and the `::: info` container.
//!
//! Compilation never fails to the caller. Every degraded input (bad YAML,
//! undecodable JSON, a fetch that times out, a nesting runaway) is logged
//! and produces the best document the rest of the text allows.

pub mod attrs;
pub mod tables;

pub use attrs::{parse_attr_block, parse_info_string};
pub use tables::{RawTable, is_truthy};

use std::sync::LazyLock;
use std::time::Duration;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use serde_json::Value;

use crate::diagram::{self, PathBounds};
use crate::document::{Asset, Block, BlockContent, BotDocument, GraphVariant, Header};
use crate::fetch::{Fetcher, FsFetcher};

use attrs::{attr_f64, attr_u64};

/// Languages a block may be tagged with through a class instead of the
/// fence info string.
const KNOWN_LANGUAGES: [&str; 10] = [
    "json", "binary", "python", "xml", "html", "txt", "mako", "jinja2", "markdown", "md",
];

static START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s*BOTMARK\s*START\s*-->").expect("start marker"));
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s*BOTMARK\s*END\s*-->").expect("end marker"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"));
static FRONT_MATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n?(.*)\z").expect("front matter pattern")
});

/// Knobs for one compilation.
#[derive(Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Content source for `src`-hydrated blocks. `None` uses the local
    /// filesystem.
    pub fetcher: Option<&'a dyn Fetcher>,
    /// How deep nested agent-definition blocks may recurse.
    pub max_nesting: usize,
}

impl Default for CompileOptions<'_> {
    fn default() -> Self {
        Self {
            fetcher: None,
            max_nesting: 8,
        }
    }
}

/// Compile BotMark source text into a document.
#[must_use]
pub fn compile(source: &str, options: &CompileOptions) -> BotDocument {
    compile_at_depth(source, options, 0)
}

/// The text between the sentinel comments, or the whole input when the
/// markers are absent. An end marker before the start marker yields an
/// empty region rather than a panic.
#[must_use]
pub fn working_region(source: &str) -> &str {
    let start = START_RE.find(source).map_or(0, |m| m.end());
    let end = END_RE.find(source).map_or(source.len(), |m| m.start());
    if end <= start {
        return "";
    }
    source[start..end].trim()
}

/// Split off YAML front matter. Malformed YAML degrades to an empty header
/// with the original text kept as body.
fn split_front_matter(region: &str) -> (Header, &str) {
    let Some(caps) = FRONT_MATTER_RE.captures(region) else {
        return (Header::default(), region);
    };
    let yaml_block = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str()).trim();

    match serde_yaml::from_str::<serde_yaml::Value>(yaml_block)
        .map_err(|e| e.to_string())
        .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string()))
    {
        Ok(Value::Object(map)) => (map, body),
        Ok(_) => {
            tracing::warn!("front matter is not a mapping, ignoring");
            (Header::default(), body)
        }
        Err(err) => {
            tracing::warn!(%err, "front matter rejected, keeping raw text");
            (Header::default(), region)
        }
    }
}

struct PendingAsset {
    is_image: bool,
    src: String,
    title: Option<String>,
    text: String,
}

fn compile_at_depth(source: &str, options: &CompileOptions, depth: usize) -> BotDocument {
    let mut doc = BotDocument::default();

    let region = working_region(source);
    let (header, body) = split_front_matter(region);
    doc.header = header;
    let body = COMMENT_RE.replace_all(body, "");

    let md_options = Options::ENABLE_TABLES;
    let mut events = Parser::new_ext(&body, md_options)
        .into_offset_iter()
        .peekable();

    let mut fence: Option<(String, String)> = None;
    let mut table: Option<RawTable> = None;
    let mut in_head = false;
    let mut cell: Option<String> = None;
    let mut row: Vec<String> = Vec::new();
    // A stack: an image may sit inside a link, and both are collected.
    let mut assets: Vec<PendingAsset> = Vec::new();
    let mut info_open: Option<usize> = None;

    while let Some((event, range)) = events.next() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                fence = Some((info.to_string(), String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, content)) = fence.take() {
                    finish_fence(&mut doc, &info, content, options, depth);
                }
            }

            Event::Start(Tag::Table(_)) => table = Some(RawTable::default()),
            Event::Start(Tag::TableHead) => in_head = true,
            Event::End(TagEnd::TableHead) => in_head = false,
            Event::Start(Tag::TableRow) => row.clear(),
            Event::End(TagEnd::TableRow) => {
                if let Some(t) = table.as_mut() {
                    t.rows.push(std::mem::take(&mut row));
                }
            }
            Event::Start(Tag::TableCell) => cell = Some(String::new()),
            Event::End(TagEnd::TableCell) => {
                let text = cell.take().unwrap_or_default();
                if let Some(t) = table.as_mut() {
                    if in_head {
                        t.headers.push(text.trim().to_lowercase());
                    } else {
                        row.push(text.trim().to_string());
                    }
                }
            }
            Event::End(TagEnd::Table) => {
                if let Some(t) = table.take() {
                    if let Some(rows) = tables::topic_rows(&t) {
                        doc.tables.insert("topic".to_string(), rows);
                    }
                }
            }

            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                assets.push(PendingAsset {
                    is_image: true,
                    src: dest_url.to_string(),
                    title: (!title.is_empty()).then(|| title.to_string()),
                    text: String::new(),
                });
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                assets.push(PendingAsset {
                    is_image: false,
                    src: dest_url.to_string(),
                    title: (!title.is_empty()).then(|| title.to_string()),
                    text: String::new(),
                });
            }
            Event::End(TagEnd::Image | TagEnd::Link) => {
                if let Some(pending) = assets.pop() {
                    // A `{...}` block immediately after the asset belongs
                    // to it.
                    let (attributes, classes) = match events.peek() {
                        Some((Event::Text(t), _)) if t.starts_with('{') => t
                            .find('}')
                            .map(|close| parse_attr_block(&t[1..close]))
                            .unwrap_or_default(),
                        _ => Default::default(),
                    };
                    if !classes.iter().any(|c| c == "disabled") {
                        let remote_tool = !pending.is_image && classes.iter().any(|c| c == "mcp");
                        let collected = Asset {
                            src: pending.src,
                            title: pending.title,
                            text: pending.text,
                            classes,
                            attributes,
                            remote_tool,
                        };
                        if pending.is_image {
                            doc.images.push(collected);
                        } else {
                            doc.links.push(collected);
                        }
                    }
                }
            }

            Event::Text(text) => {
                if let Some((_, buf)) = fence.as_mut() {
                    buf.push_str(&text);
                } else if let Some(buf) = cell.as_mut() {
                    buf.push_str(&text);
                } else if let Some(pending) = assets.last_mut() {
                    pending.text.push_str(&text);
                } else {
                    let trimmed = text.trim();
                    if info_open.is_none() && (trimmed == "::: info" || trimmed == ":::info") {
                        info_open = Some(range.end);
                    } else if trimmed == ":::" {
                        if let Some(start) = info_open.take() {
                            html::push_html(
                                &mut doc.info,
                                Parser::new_ext(&body[start..range.start], md_options),
                            );
                        }
                    }
                }
            }
            Event::Code(code) => {
                if let Some(buf) = cell.as_mut() {
                    buf.push_str(&code);
                } else if let Some(pending) = assets.last_mut() {
                    pending.text.push_str(&code);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(buf) = cell.as_mut() {
                    buf.push(' ');
                } else if let Some(pending) = assets.last_mut() {
                    pending.text.push(' ');
                }
            }
            _ => {}
        }
    }

    doc
}

/// Classify and record one completed fenced block.
fn finish_fence(
    doc: &mut BotDocument,
    info: &str,
    mut content: String,
    options: &CompileOptions,
    depth: usize,
) {
    let (mut language, attributes, mut classes) = parse_info_string(info);

    let Some(id) = attributes.get("id").and_then(Value::as_str) else {
        return;
    };
    if classes.iter().any(|c| c == "disabled") {
        return;
    }

    if let Some(src) = attributes.get("src").and_then(Value::as_str) {
        let timeout = Duration::from_secs(attr_u64(&attributes, "timeout").unwrap_or(10));
        let binary = classes.iter().any(|c| c == "binary");
        let fetcher = options.fetcher.unwrap_or(&FsFetcher);
        match fetcher.fetch(src, timeout, binary) {
            Ok(payload) => content = payload.into_text(),
            Err(err) => {
                tracing::warn!(%src, %err, "content fetch failed, keeping inline content");
            }
        }
    }

    if language.is_none() {
        language = KNOWN_LANGUAGES
            .iter()
            .find(|l| classes.iter().any(|c| c == *l))
            .map(|l| (*l).to_string());
        if let Some(lang) = &language {
            classes.retain(|c| c != lang);
        }
    }

    if id == "graph" {
        let bounds = PathBounds {
            max_depth: attr_u64(&attributes, "max-steps").unwrap_or(10) as usize,
            max_wall: Duration::from_secs_f64(
                attr_f64(&attributes, "timeout-seconds").unwrap_or(2.0),
            ),
            max_paths: attr_u64(&attributes, "max-paths").unwrap_or(1000) as usize,
        };
        let graph = diagram::parse(&content);
        let valid_paths = diagram::enumerate_paths(&graph, &bounds);
        doc.graphs.push(GraphVariant {
            graph,
            valid_paths,
            attributes,
        });
        return;
    }

    let content = match language.as_deref() {
        Some("json") => match serde_json::from_str::<Value>(&content) {
            Ok(value) => BlockContent::Data(value),
            Err(err) => {
                tracing::warn!(id, %err, "json block rejected, keeping raw text");
                BlockContent::Text(content)
            }
        },
        Some("yaml") => match serde_yaml::from_str::<serde_yaml::Value>(&content)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string()))
        {
            Ok(value) => BlockContent::Data(value),
            Err(err) => {
                tracing::warn!(id, %err, "yaml block rejected, keeping raw text");
                BlockContent::Text(content)
            }
        },
        Some("markdown" | "md") if classes.iter().any(|c| c == "agent") => {
            if depth + 1 >= options.max_nesting {
                tracing::warn!(id, depth, "agent nesting limit reached, keeping raw text");
                BlockContent::Text(content)
            } else {
                BlockContent::Document(Box::new(compile_at_depth(&content, options, depth + 1)))
            }
        }
        _ => BlockContent::Text(content),
    };

    doc.blocks.push(Block {
        language,
        classes,
        attributes,
        content,
    });
}
