//! The branch-decision seam.
//!
//! When a traversal step has more than one admissible next node, the engine
//! delegates the choice to a [`Router`]. A router sees the transcript so
//! far, the running history of the node that just produced the output, the
//! output itself and the closed option list; it replies with one of the
//! offered node ids. [`ClosedChoice`] is the validator that enforces the
//! closed-set contract on whatever the router said.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{NextOption, TraversalError};
use crate::message::Message;

/// A router's answer: the chosen node id plus an optional free-form
/// rationale (logged, never interpreted).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReply {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl RouteReply {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            rationale: None,
        }
    }
}

/// Router-side failure. The engine treats these as recoverable: it logs and
/// falls back to the first offered option.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RouterError {
    pub message: String,
}

impl RouterError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Chooses among the admissible next nodes of one traversal step.
#[async_trait]
pub trait Router: Send + Sync {
    /// Pick one of `options`. `history` is the running message history of
    /// the node whose output is being routed (empty before any node ran).
    /// The reply's `node_id` must be drawn from the offered list; anything
    /// else is rejected by [`ClosedChoice`].
    async fn choose(
        &self,
        transcript: &[String],
        history: &[Message],
        last_output: &str,
        options: &[NextOption],
    ) -> Result<RouteReply, RouterError>;
}

/// Validates a [`RouteReply`] against the option list it was offered.
///
/// There are no dynamic escape hatches here: a reply naming any node outside
/// the offered set is rejected, no matter how plausible the id looks.
#[derive(Clone, Copy, Debug)]
pub struct ClosedChoice<'a> {
    options: &'a [NextOption],
}

impl<'a> ClosedChoice<'a> {
    #[must_use]
    pub fn new(options: &'a [NextOption]) -> Self {
        Self { options }
    }

    /// Check that the reply names an offered node.
    pub fn validate(&self, reply: &RouteReply) -> Result<(), TraversalError> {
        if self.options.iter().any(|o| o.node_id == reply.node_id) {
            Ok(())
        } else {
            Err(TraversalError::RouterContract {
                chosen: reply.node_id.clone(),
                offered: self
                    .options
                    .iter()
                    .map(|o| o.node_id.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

/// Deterministic fallback router: always takes the first offered option.
///
/// This is also the behavior the engine degrades to when a real router
/// errors or violates the closed-choice contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstOption;

#[async_trait]
impl Router for FirstOption {
    async fn choose(
        &self,
        _transcript: &[String],
        _history: &[Message],
        _last_output: &str,
        options: &[NextOption],
    ) -> Result<RouteReply, RouterError> {
        options
            .first()
            .map(|o| RouteReply::new(o.node_id.clone()))
            .ok_or_else(|| RouterError::new("no options offered"))
    }
}
