//! Bounded enumeration of sentinel-to-sentinel walks through a diagram.
//!
//! The search is depth-first over an adjacency list built from the edge list
//! and is deliberately non-exhaustive: it stops expanding a branch at the
//! depth bound and abandons the whole search once the wall-clock deadline or
//! the path-count cap is reached, returning whatever it has. A partial
//! result is a valid result; correctness here means "a subset of short
//! paths", never "all paths".

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::{Diagram, SENTINEL};

/// Caps applied to a single enumeration run.
///
/// The deadline is polled cooperatively between DFS expansions; nothing is
/// preempted mid-expansion.
#[derive(Clone, Copy, Debug)]
pub struct PathBounds {
    /// Maximum number of hops along a single walk.
    pub max_depth: usize,
    /// Wall-clock budget for the whole search.
    pub max_wall: Duration,
    /// Maximum number of completed paths to record.
    pub max_paths: usize,
}

impl Default for PathBounds {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_wall: Duration::from_secs(2),
            max_paths: 1000,
        }
    }
}

/// Enumerate walks from `"[*]"` back to `"[*]"`, shortest first.
///
/// A graph with no such walk yields an empty list. Ties in length keep
/// discovery order (the sort is stable).
pub fn enumerate_paths(diagram: &Diagram, bounds: &PathBounds) -> Vec<Vec<String>> {
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in &diagram.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let deadline = Instant::now() + bounds.max_wall;
    let mut found: Vec<Vec<String>> = Vec::new();
    let mut stack: Vec<(Vec<&str>, usize)> = vec![(vec![SENTINEL], 0)];

    while let Some((path, depth)) = stack.pop() {
        if Instant::now() > deadline || found.len() >= bounds.max_paths {
            break;
        }

        let current = *path.last().expect("path never empty");
        if current == SENTINEL && path.len() > 1 {
            found.push(path.iter().map(|s| (*s).to_string()).collect());
            continue;
        }
        if depth >= bounds.max_depth {
            continue;
        }
        for neighbor in adjacency.get(current).into_iter().flatten() {
            let mut next = path.clone();
            next.push(neighbor);
            stack.push((next, depth + 1));
        }
    }

    found.sort_by_key(Vec::len);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramEdge;

    fn edge(source: &str, target: &str) -> DiagramEdge {
        DiagramEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            style: "-->".to_string(),
        }
    }

    fn diagram(edges: Vec<DiagramEdge>) -> Diagram {
        Diagram {
            edges,
            ..Diagram::default()
        }
    }

    #[test]
    fn short_and_long_path_sorted() {
        let d = diagram(vec![
            edge(SENTINEL, "A"),
            edge("A", "B"),
            edge("B", SENTINEL),
            edge("A", SENTINEL),
        ]);
        let paths = enumerate_paths(
            &d,
            &PathBounds {
                max_depth: 5,
                ..PathBounds::default()
            },
        );
        assert_eq!(
            paths,
            vec![
                vec![SENTINEL.to_string(), "A".to_string(), SENTINEL.to_string()],
                vec![
                    SENTINEL.to_string(),
                    "A".to_string(),
                    "B".to_string(),
                    SENTINEL.to_string(),
                ],
            ]
        );
    }

    #[test]
    fn no_walk_yields_empty() {
        let d = diagram(vec![edge("A", "B")]);
        assert!(enumerate_paths(&d, &PathBounds::default()).is_empty());
    }

    #[test]
    fn depth_bound_prunes_long_walks() {
        let d = diagram(vec![
            edge(SENTINEL, "A"),
            edge("A", "B"),
            edge("B", "C"),
            edge("C", SENTINEL),
        ]);
        let short_only = enumerate_paths(
            &d,
            &PathBounds {
                max_depth: 2,
                ..PathBounds::default()
            },
        );
        assert!(short_only.is_empty());

        let deep = enumerate_paths(
            &d,
            &PathBounds {
                max_depth: 4,
                ..PathBounds::default()
            },
        );
        assert_eq!(deep.len(), 1);
    }

    #[test]
    fn cycle_is_capped_by_path_count() {
        // A self-loop on A makes infinitely many walks; the caps keep the
        // search finite.
        let d = diagram(vec![
            edge(SENTINEL, "A"),
            edge("A", "A"),
            edge("A", SENTINEL),
        ]);
        let paths = enumerate_paths(
            &d,
            &PathBounds {
                max_depth: 50,
                max_wall: Duration::from_millis(200),
                max_paths: 7,
            },
        );
        assert!(!paths.is_empty());
        assert!(paths.len() <= 7);
        for pair in paths.windows(2) {
            assert!(pair[0].len() <= pair[1].len());
        }
    }
}
