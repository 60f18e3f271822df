//! The graph traversal engine.
//!
//! A [`GraphTraversal`] binds a selected [`GraphVariant`] to a set of named
//! [`Capability`] implementations and (optionally) a [`Router`], then walks
//! the graph from the start sentinel until an end sentinel or a dead end.
//! At every step the admissible next nodes are derived from the variant's
//! precomputed valid paths, never from the raw edge list, so the walk can
//! only ever follow a route that is known to terminate.
//!
//! Each node keeps its own message history, seeded from the caller's initial
//! history on first visit; the latest capability output is threaded to the
//! next node as its input. Binding errors (a node with no capability) are
//! fatal before any capability runs; router misbehavior is recoverable and
//! degrades to the first offered option.

pub mod router;

pub use router::{ClosedChoice, FirstOption, RouteReply, Router, RouterError};

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::diagram::SENTINEL;
use crate::document::GraphVariant;
use crate::message::Message;

/// Capability key that handles any node without a dedicated capability.
pub const WILDCARD: &str = SENTINEL;

/// What one capability invocation produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityOutput {
    /// Text handed to the next node as its input (and, from the last node
    /// visited, the traversal's final answer).
    pub output: String,
    /// Turns appended to the node's history.
    pub new_messages: Vec<Message>,
}

impl CapabilityOutput {
    /// Output that also records the exchange as a user/assistant turn pair.
    #[must_use]
    pub fn exchange(input: &str, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            new_messages: vec![Message::user(input), Message::assistant(&output)],
            output,
        }
    }
}

/// Capability-side failure; aborts the traversal.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One node's worth of behavior: take the current input and the node's
/// history, produce an output and the turns to remember.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(
        &self,
        input: &str,
        history: &[Message],
    ) -> Result<CapabilityOutput, CapabilityError>;
}

/// One admissible next node, with the label of the edge leading to it when
/// the diagram gave one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextOption {
    pub node_id: String,
    pub label: Option<String>,
}

/// Traversal failure.
#[derive(Debug, Error, Diagnostic)]
pub enum TraversalError {
    #[error("no capability bound for graph node '{node_id}'")]
    #[diagnostic(
        code(botmark::traversal::missing_capability),
        help("bind a capability under this node id, or provide a wildcard capability")
    )]
    MissingCapability { node_id: String },

    #[error("router chose '{chosen}' but the offered options were: {offered}")]
    #[diagnostic(code(botmark::traversal::router_contract))]
    RouterContract { chosen: String, offered: String },

    #[error("capability '{node_id}' failed")]
    #[diagnostic(code(botmark::traversal::capability))]
    Capability {
        node_id: String,
        #[source]
        source: CapabilityError,
    },
}

/// Caller-side inputs for one run.
#[derive(Clone, Debug, Default)]
pub struct TraversalOptions {
    /// Input handed to the first node visited.
    pub start_message: String,
    /// History every node starts from on its first visit.
    pub initial_history: Vec<Message>,
}

/// What a completed run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalOutcome {
    /// Final per-node histories, keyed by node id.
    pub histories: FxHashMap<String, Vec<Message>>,
    /// Non-sentinel node ids in visit order.
    pub transcript: Vec<String>,
    /// Output of the last node visited, or the start message when no node
    /// ran at all.
    pub final_answer: String,
}

/// The admissible next nodes after `walk`, derived from the valid paths.
///
/// Options are unique and in first-appearance order across the path list;
/// each carries the label of the corresponding edge when one exists (on a
/// duplicated edge, the last declaration's label wins).
#[must_use]
pub fn next_options(variant: &GraphVariant, walk: &[String]) -> Vec<NextOption> {
    let mut labels: FxHashMap<(&str, &str), &str> = FxHashMap::default();
    for edge in &variant.graph.edges {
        if let Some(label) = &edge.label {
            labels.insert((edge.source.as_str(), edge.target.as_str()), label);
        }
    }

    let current = walk.last().map_or(SENTINEL, String::as_str);
    let mut options: Vec<NextOption> = Vec::new();
    for path in &variant.valid_paths {
        if path.len() <= walk.len() || path[..walk.len()] != *walk {
            continue;
        }
        let next = &path[walk.len()];
        if options.iter().any(|o| &o.node_id == next) {
            continue;
        }
        options.push(NextOption {
            node_id: next.clone(),
            label: labels
                .get(&(current, next.as_str()))
                .map(ToString::to_string),
        });
    }
    options
}

/// A graph variant bound to its capabilities and router, ready to run.
pub struct GraphTraversal {
    variant: GraphVariant,
    capabilities: FxHashMap<String, Arc<dyn Capability>>,
    router: Option<Arc<dyn Router>>,
}

impl GraphTraversal {
    /// Bind a variant to capabilities, failing fast if any graph node lacks
    /// one. The check runs before any capability is invoked; a wildcard
    /// capability (key [`WILDCARD`]) satisfies every node.
    pub fn new(
        variant: GraphVariant,
        capabilities: FxHashMap<String, Arc<dyn Capability>>,
        router: Option<Arc<dyn Router>>,
    ) -> Result<Self, TraversalError> {
        if !capabilities.contains_key(WILDCARD) {
            for node_id in variant.graph.nodes.keys() {
                if node_id != SENTINEL && !capabilities.contains_key(node_id) {
                    return Err(TraversalError::MissingCapability {
                        node_id: node_id.clone(),
                    });
                }
            }
        }
        Ok(Self {
            variant,
            capabilities,
            router,
        })
    }

    /// Walk the graph from the start sentinel.
    ///
    /// The walk ends when an end sentinel is chosen or no valid path extends
    /// the current prefix. A single admissible option is taken without
    /// consulting the router.
    pub async fn run(&self, options: TraversalOptions) -> Result<TraversalOutcome, TraversalError> {
        let mut walk = vec![SENTINEL.to_string()];
        let mut transcript: Vec<String> = Vec::new();
        let mut histories: FxHashMap<String, Vec<Message>> = FxHashMap::default();
        let mut last_output = options.start_message.clone();

        loop {
            let candidates = next_options(&self.variant, &walk);
            let next = match candidates.len() {
                0 => break,
                1 => candidates[0].node_id.clone(),
                _ => {
                    let current = walk.last().map_or(SENTINEL, String::as_str);
                    let history = histories.get(current).map_or(&[][..], Vec::as_slice);
                    self.pick(&transcript, history, &last_output, &candidates)
                        .await
                }
            };
            if next == SENTINEL {
                break;
            }

            let capability = self
                .capabilities
                .get(&next)
                .or_else(|| self.capabilities.get(WILDCARD))
                .ok_or_else(|| TraversalError::MissingCapability {
                    node_id: next.clone(),
                })?;

            let history = histories
                .entry(next.clone())
                .or_insert_with(|| options.initial_history.clone());
            tracing::debug!(node = %next, "invoking capability");
            let result = capability.invoke(&last_output, history).await.map_err(
                |source| TraversalError::Capability {
                    node_id: next.clone(),
                    source,
                },
            )?;
            history.extend(result.new_messages);
            last_output = result.output;

            transcript.push(next.clone());
            walk.push(next);
        }

        Ok(TraversalOutcome {
            histories,
            transcript,
            final_answer: last_output,
        })
    }

    /// Resolve a multi-option step. `history` is the running history of the
    /// node the walk is leaving. Router errors and contract violations are
    /// logged and degrade to the first offered option.
    async fn pick(
        &self,
        transcript: &[String],
        history: &[Message],
        last_output: &str,
        candidates: &[NextOption],
    ) -> String {
        let fallback = candidates[0].node_id.clone();
        let Some(router) = &self.router else {
            tracing::debug!(%fallback, "no router bound, taking first option");
            return fallback;
        };
        match router
            .choose(transcript, history, last_output, candidates)
            .await
        {
            Ok(reply) => match ClosedChoice::new(candidates).validate(&reply) {
                Ok(()) => {
                    if let Some(rationale) = &reply.rationale {
                        tracing::debug!(node = %reply.node_id, %rationale, "router decision");
                    }
                    reply.node_id
                }
                Err(err) => {
                    tracing::warn!(%err, %fallback, "router reply rejected, falling back");
                    fallback
                }
            },
            Err(err) => {
                tracing::warn!(%err, %fallback, "router failed, falling back");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{self, PathBounds};

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        async fn invoke(
            &self,
            input: &str,
            _history: &[Message],
        ) -> Result<CapabilityOutput, CapabilityError> {
            Ok(CapabilityOutput::exchange(input, input.to_string()))
        }
    }

    struct Append(&'static str);

    #[async_trait]
    impl Capability for Append {
        async fn invoke(
            &self,
            input: &str,
            _history: &[Message],
        ) -> Result<CapabilityOutput, CapabilityError> {
            Ok(CapabilityOutput::exchange(input, format!("{input}{}", self.0)))
        }
    }

    struct Always(&'static str);

    #[async_trait]
    impl Router for Always {
        async fn choose(
            &self,
            _transcript: &[String],
            _history: &[Message],
            _last_output: &str,
            _options: &[NextOption],
        ) -> Result<RouteReply, RouterError> {
            Ok(RouteReply::new(self.0))
        }
    }

    fn variant(code: &str) -> GraphVariant {
        let graph = diagram::parse(code);
        let valid_paths = diagram::enumerate_paths(&graph, &PathBounds::default());
        GraphVariant {
            graph,
            valid_paths,
            ..GraphVariant::default()
        }
    }

    fn caps(pairs: Vec<(&str, Arc<dyn Capability>)>) -> FxHashMap<String, Arc<dyn Capability>> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn single_node_walk_echoes() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> [*]");
        let traversal =
            GraphTraversal::new(variant, caps(vec![("A", Arc::new(Echo))]), None).expect("bound");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: "hello".to_string(),
                ..TraversalOptions::default()
            })
            .await
            .expect("run");

        assert_eq!(outcome.transcript, vec!["A".to_string()]);
        assert_eq!(outcome.final_answer, "hello");
        assert_eq!(outcome.histories["A"].len(), 2);
    }

    #[tokio::test]
    async fn missing_capability_is_fatal_before_any_invocation() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\nB --> [*]");
        let err = GraphTraversal::new(variant, caps(vec![("A", Arc::new(Echo))]), None)
            .err()
            .expect("must fail");
        assert!(matches!(err, TraversalError::MissingCapability { node_id } if node_id == "B"));
    }

    #[tokio::test]
    async fn wildcard_capability_covers_unbound_nodes() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\nB --> [*]");
        let traversal = GraphTraversal::new(
            variant,
            caps(vec![(WILDCARD, Arc::new(Append("!")))]),
            None,
        )
        .expect("wildcard binds everything");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: "x".to_string(),
                ..TraversalOptions::default()
            })
            .await
            .expect("run");
        assert_eq!(outcome.transcript, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(outcome.final_answer, "x!!");
    }

    #[tokio::test]
    async fn router_picks_among_branches() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B : left\nA --> C : right\nB --> [*]\nC --> [*]");
        let traversal = GraphTraversal::new(
            variant,
            caps(vec![
                ("A", Arc::new(Append("a"))),
                ("B", Arc::new(Append("b"))),
                ("C", Arc::new(Append("c"))),
            ]),
            Some(Arc::new(Always("C"))),
        )
        .expect("bound");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: String::new(),
                ..TraversalOptions::default()
            })
            .await
            .expect("run");
        assert_eq!(outcome.transcript, vec!["A".to_string(), "C".to_string()]);
        assert_eq!(outcome.final_answer, "ac");
    }

    struct HistoryGate;

    #[async_trait]
    impl Router for HistoryGate {
        async fn choose(
            &self,
            _transcript: &[String],
            history: &[Message],
            _last_output: &str,
            _options: &[NextOption],
        ) -> Result<RouteReply, RouterError> {
            // Routes on the deciding node's own history: the seed message
            // plus the exchange the node just recorded must be visible.
            let seeded = history.first().is_some_and(|m| m.content == "routing hint");
            Ok(RouteReply::new(if seeded && history.len() == 3 {
                "C"
            } else {
                "B"
            }))
        }
    }

    #[tokio::test]
    async fn router_sees_the_deciding_node_history() {
        let variant =
            variant("stateDiagram-v2\n[*] --> A\nA --> B\nA --> C\nB --> [*]\nC --> [*]");
        let traversal = GraphTraversal::new(
            variant,
            caps(vec![(WILDCARD, Arc::new(Echo))]),
            Some(Arc::new(HistoryGate)),
        )
        .expect("bound");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: "go".to_string(),
                initial_history: vec![Message::system("routing hint")],
            })
            .await
            .expect("run");
        assert_eq!(outcome.transcript, vec!["A".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn no_reachable_walk_answers_with_start_message() {
        // "[*] --> A" never reaches an end sentinel, so no valid path
        // exists and nothing runs.
        let variant = variant("stateDiagram-v2\n[*] --> A");
        let traversal =
            GraphTraversal::new(variant, caps(vec![("A", Arc::new(Echo))]), None).expect("bound");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: "hello".to_string(),
                ..TraversalOptions::default()
            })
            .await
            .expect("run");
        assert!(outcome.transcript.is_empty());
        assert_eq!(outcome.final_answer, "hello");
    }

    #[tokio::test]
    async fn rogue_router_degrades_to_first_option() {
        // The branch through B is shorter, so its path sorts first and B is
        // the first offered option.
        let variant = variant(
            "stateDiagram-v2\n[*] --> A\nA --> B\nA --> C\nB --> [*]\nC --> D\nD --> [*]",
        );
        let traversal = GraphTraversal::new(
            variant,
            caps(vec![(WILDCARD, Arc::new(Append("-")))]),
            Some(Arc::new(Always("NOT_A_NODE"))),
        )
        .expect("bound");

        let outcome = traversal
            .run(TraversalOptions::default())
            .await
            .expect("run");
        assert_eq!(outcome.transcript, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn next_options_carry_edge_labels() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B : go\nB --> [*]");
        let walk = vec![SENTINEL.to_string(), "A".to_string()];
        let options = next_options(&variant, &walk);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].node_id, "B");
        assert_eq!(options[0].label.as_deref(), Some("go"));
    }

    #[tokio::test]
    async fn histories_seed_from_initial_history() {
        let variant = variant("stateDiagram-v2\n[*] --> A\nA --> [*]");
        let traversal =
            GraphTraversal::new(variant, caps(vec![("A", Arc::new(Echo))]), None).expect("bound");

        let outcome = traversal
            .run(TraversalOptions {
                start_message: "q".to_string(),
                initial_history: vec![Message::system("be terse")],
            })
            .await
            .expect("run");
        let history = &outcome.histories["A"];
        assert_eq!(history[0], Message::system("be terse"));
        assert_eq!(history.len(), 3);
    }
}
