//! Conditional activation: which topics, blocks and graph variant apply to
//! one incoming utterance.
//!
//! Activation is recomputed per request and never persisted. The flow is:
//! [`find_active_topics`] builds a topic → bool context from the document's
//! topic table, [`expr::rank`] scores each candidate's `match` expression
//! against that context, and [`select_blocks`] / [`select_graph`] pick the
//! winners.

pub mod expr;

pub use expr::{ActivationContext, BoolExpr, ExprError, rank};

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::document::{Block, GraphVariant, TopicRow};

/// Evaluate every topic row's matchers against an utterance.
///
/// A topic is active if any *configured* matcher matches: `prompt_prefix`
/// (starts-with), `prompt_suffix` (ends-with) or `prompt_regex` (search).
/// Empty matchers are skipped and never cause a match; an invalid regex is
/// logged and skipped.
#[must_use]
pub fn find_active_topics(topics: &[TopicRow], utterance: &str) -> ActivationContext {
    let mut context = ActivationContext::default();
    for topic in topics {
        let mut active = false;
        if !topic.prompt_prefix.is_empty() && utterance.starts_with(&topic.prompt_prefix) {
            active = true;
        }
        if !topic.prompt_suffix.is_empty() && utterance.ends_with(&topic.prompt_suffix) {
            active = true;
        }
        if !topic.prompt_regex.is_empty() {
            match Regex::new(&topic.prompt_regex) {
                Ok(re) => {
                    if re.is_match(utterance) {
                        active = true;
                    }
                }
                Err(err) => {
                    tracing::warn!(topic = %topic.name, %err, "invalid prompt_regex, skipping");
                }
            }
        }
        context.insert(topic.name.clone(), active);
    }
    context
}

/// Select the applicable block per id.
///
/// Blocks are visited in document order. For blocks sharing an id, the one
/// with the highest non-negative rank wins; on an equal score the *later*
/// block replaces the earlier one. Swapping this to first-wins would
/// silently change document semantics, so the `>=` comparison is load-
/// bearing. Negative-rank blocks are excluded outright.
#[must_use]
pub fn select_blocks(blocks: &[Block], rank_fn: impl Fn(&Block) -> i32) -> FxHashMap<String, Block> {
    let mut selected: FxHashMap<String, Block> = FxHashMap::default();
    let mut scores: FxHashMap<String, i32> = FxHashMap::default();

    for block in blocks {
        let Some(id) = block.id() else { continue };
        let score = rank_fn(block);
        if score >= 0 && score >= scores.get(id).copied().unwrap_or(-1) {
            selected.insert(id.to_string(), block.clone());
            scores.insert(id.to_string(), score);
        }
    }
    selected
}

/// Select the graph variant with the highest non-negative rank.
///
/// Unlike [`select_blocks`], only a *strictly* greater score displaces the
/// current winner, so ties keep the earliest variant.
#[must_use]
pub fn select_graph<'a>(
    graphs: &'a [GraphVariant],
    rank_fn: impl Fn(&GraphVariant) -> i32,
) -> Option<&'a GraphVariant> {
    let mut best: Option<&GraphVariant> = None;
    let mut best_score = -1;
    for variant in graphs {
        let score = rank_fn(variant);
        if score > best_score {
            best = Some(variant);
            best_score = score;
        }
    }
    best
}
