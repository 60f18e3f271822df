//! Diagram model for the workflow mini-language embedded in `graph` blocks.
//!
//! Two dialects are recognized, both a small subset of the familiar
//! flowchart/state-diagram notation:
//!
//! - **Flowchart**: shaped nodes (`A[label]`, `B(label)`, `C((label))`,
//!   `D{label}`, `E>label]`) connected by `-->`, `==>` or dotted arrows with
//!   an optional `|label|` between arrow and target.
//! - **State diagram** (`stateDiagram-v2`): `A --> B : label`, with nodes
//!   implicitly declared by first mention and `[*]` as the start/end sentinel.
//!
//! A `title:` directive and the diagram-type directive are detected from
//! leading lines; any line that matches neither grammar is ignored rather
//! than rejected. Node ids referenced by an edge but never given a shape are
//! synthesized as box nodes labeled with their own id.

pub mod paths;

pub use paths::{PathBounds, enumerate_paths};

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Universal start/end sentinel node id.
pub const SENTINEL: &str = "[*]";

/// Which dialect a diagram was written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    #[default]
    Flowchart,
    StateDiagram,
}

/// Shape of a declared (or synthesized) node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    Box,
    Round,
    Rhombus,
    Asymmetric,
    State,
}

/// A node in the diagram graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
}

/// A directed edge, keeping the raw arrow style token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub style: String,
}

/// Parsed diagram: node map plus edge list in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub title: Option<String>,
    pub kind: DiagramKind,
    pub nodes: FxHashMap<String, DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

static NODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\w+)\s*\["(.*?)"\]|(\w+)\s*\[(.*?)\]|(\w+)\s*\(\((.*?)\)\)|(\w+)\s*\((.*?)\)|(\w+)\s*\{(.*?)\}|(\w+)\s*>(.*?)\]"#,
    )
    .expect("node pattern")
});

static EDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        (?P<source>\w+|\[\*\])
        (?:\[[^\]]*\]|\(\([^)]*\)\)|\([^)]*\)|\{[^}]*\}|"[^"]*")?
        \s*(?P<style>--+>|==+>|(?:-\.){1,3}->)\s*
        (?:\|(?P<label>[^|]*)\|\s*)?
        (?P<target>\w+|\[\*\])
        (?:\[[^\]]*\]|\(\([^)]*\)\)|\([^)]*\)|\{[^}]*\}|"[^"]*")?
        "#,
    )
    .expect("edge pattern")
});

static STATE_EDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<source>\[\*\]|\w+)\s*-->\s*(?P<target>\[\*\]|\w+)\s*(?::\s*(?P<label>.+))?")
        .expect("state edge pattern")
});

/// Parse diagram text into a [`Diagram`].
///
/// Never fails: unrecognized lines are skipped, so a best-effort graph is
/// always produced (possibly empty).
pub fn parse(code: &str) -> Diagram {
    let mut diagram = Diagram::default();
    let lines: Vec<&str> = code.trim().lines().collect();

    // Directive scan runs over the whole text first so the type is known
    // before any edge line is interpreted.
    for line in &lines {
        let stripped = line.trim();
        if let Some(title) = stripped.strip_prefix("title:") {
            diagram.title = Some(title.trim().to_string());
        } else if stripped.contains("stateDiagram-v2") {
            diagram.kind = DiagramKind::StateDiagram;
        } else if stripped.starts_with("flowchart") {
            diagram.kind = DiagramKind::Flowchart;
        }
    }

    let mut connected: Vec<String> = Vec::new();
    for line in &lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with("%%") || line.starts_with("title:") {
            continue;
        }
        match diagram.kind {
            DiagramKind::Flowchart => parse_flowchart_line(line, &mut diagram, &mut connected),
            DiagramKind::StateDiagram => parse_state_line(line, &mut diagram),
        }
    }

    // Synthesize any node referenced by an edge but never shaped.
    for edge in &diagram.edges {
        for id in [&edge.source, &edge.target] {
            if !diagram.nodes.contains_key(id.as_str()) {
                diagram.nodes.insert(
                    id.clone(),
                    DiagramNode {
                        id: id.clone(),
                        label: id.clone(),
                        shape: NodeShape::Box,
                    },
                );
            }
        }
    }

    diagram
}

fn parse_flowchart_line(line: &str, diagram: &mut Diagram, connected: &mut Vec<String>) {
    for caps in EDGE_RE.captures_iter(line) {
        let source = caps["source"].to_string();
        let target = caps["target"].to_string();
        diagram.edges.push(DiagramEdge {
            source: source.clone(),
            target: target.clone(),
            label: caps
                .name("label")
                .map(|m| unescape_entities(m.as_str().trim())),
            style: caps["style"].to_string(),
        });
        connected.push(source);
        connected.push(target);
    }

    // Shape declarations only register for ids that participate in an edge,
    // matching the behavior of treating stray bracket text as prose.
    for caps in NODE_RE.captures_iter(line) {
        const SHAPES: [NodeShape; 6] = [
            NodeShape::Box,
            NodeShape::Box,
            NodeShape::Round,
            NodeShape::Round,
            NodeShape::Rhombus,
            NodeShape::Asymmetric,
        ];
        for (slot, shape) in SHAPES.iter().enumerate() {
            let (Some(id), label) = (caps.get(slot * 2 + 1), caps.get(slot * 2 + 2)) else {
                continue;
            };
            let id = id.as_str();
            if connected.iter().any(|c| c == id) {
                diagram.nodes.insert(
                    id.to_string(),
                    DiagramNode {
                        id: id.to_string(),
                        label: label
                            .map(|m| unescape_entities(m.as_str().trim()))
                            .unwrap_or_default(),
                        shape: *shape,
                    },
                );
            }
            break;
        }
    }
}

fn parse_state_line(line: &str, diagram: &mut Diagram) {
    for caps in STATE_EDGE_RE.captures_iter(line) {
        let source = caps["source"].to_string();
        let target = caps["target"].to_string();
        for id in [&source, &target] {
            diagram.nodes.entry(id.clone()).or_insert_with(|| DiagramNode {
                id: id.clone(),
                label: id.clone(),
                shape: NodeShape::State,
            });
        }
        diagram.edges.push(DiagramEdge {
            source,
            target,
            label: caps
                .name("label")
                .map(|m| unescape_entities(m.as_str().trim())),
            style: "-->".to_string(),
        });
    }
}

/// Decode the handful of named HTML entities that show up in edge labels.
fn unescape_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_diagram_with_sentinels() {
        let diagram = parse(
            "stateDiagram-v2\n\
             [*] --> A\n\
             A --> B : refine\n\
             B --> [*]\n",
        );
        assert_eq!(diagram.kind, DiagramKind::StateDiagram);
        assert_eq!(diagram.edges.len(), 3);
        assert_eq!(diagram.edges[1].label.as_deref(), Some("refine"));
        assert_eq!(diagram.nodes[SENTINEL].shape, NodeShape::State);
        assert_eq!(diagram.nodes["A"].label, "A");
    }

    #[test]
    fn flowchart_shapes_and_labels() {
        let diagram = parse(
            "flowchart TD\n\
             A[Collect] --> B{Decide}\n\
             B -->|yes| C((Finish))\n\
             B -.-> D>Audit]\n",
        );
        assert_eq!(diagram.kind, DiagramKind::Flowchart);
        assert_eq!(diagram.nodes["A"].shape, NodeShape::Box);
        assert_eq!(diagram.nodes["B"].shape, NodeShape::Rhombus);
        assert_eq!(diagram.nodes["C"].shape, NodeShape::Round);
        assert_eq!(diagram.nodes["D"].shape, NodeShape::Asymmetric);
        assert_eq!(diagram.edges[1].label.as_deref(), Some("yes"));
        assert_eq!(diagram.edges[2].style, "-.->");
    }

    #[test]
    fn undeclared_node_synthesized_as_box() {
        let diagram = parse("flowchart\nA[Start] --> C\n");
        let c = &diagram.nodes["C"];
        assert_eq!(c.id, "C");
        assert_eq!(c.label, "C");
        assert_eq!(c.shape, NodeShape::Box);
    }

    #[test]
    fn title_and_junk_lines() {
        let diagram = parse(
            "title: Pipeline\n\
             %% a comment line\n\
             complete nonsense here\n\
             A --> B\n",
        );
        assert_eq!(diagram.title.as_deref(), Some("Pipeline"));
        assert_eq!(diagram.edges.len(), 1);
    }

    #[test]
    fn edge_label_entities_unescaped() {
        let diagram = parse("A -->|fish &amp; chips| B\n");
        assert_eq!(diagram.edges[0].label.as_deref(), Some("fish & chips"));
    }
}
