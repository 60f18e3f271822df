mod common;

use std::sync::Arc;

use common::{
    CountingCapability, EchoCapability, FailingCapability, ScriptedRouter, SuffixCapability,
    variant,
};

use botmark::message::Message;
use botmark::traversal::{
    Capability, GraphTraversal, TraversalError, TraversalOptions, WILDCARD,
};
use rustc_hash::FxHashMap;

fn caps(pairs: Vec<(&str, Arc<dyn Capability>)>) -> FxHashMap<String, Arc<dyn Capability>> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[tokio::test]
async fn echo_walk_produces_transcript_and_answer() {
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> [*]\n");
    let traversal = GraphTraversal::new(variant, caps(vec![("A", Arc::new(EchoCapability))]), None)
        .expect("bound");

    let outcome = traversal
        .run(TraversalOptions {
            start_message: "ping".to_string(),
            ..TraversalOptions::default()
        })
        .await
        .expect("run");

    assert_eq!(outcome.transcript, vec!["A".to_string()]);
    assert_eq!(outcome.final_answer, "ping");
}

#[tokio::test]
async fn missing_capability_fails_before_any_capability_runs() {
    let counting = CountingCapability::default();
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\nB --> [*]\n");

    let err = GraphTraversal::new(
        variant,
        caps(vec![("A", Arc::new(counting.clone()))]),
        None,
    )
    .err()
    .expect("binding must fail");

    assert!(matches!(err, TraversalError::MissingCapability { node_id } if node_id == "B"));
    assert_eq!(counting.count(), 0);
}

#[tokio::test]
async fn output_threads_through_a_chain() {
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\nB --> C\nC --> [*]\n");
    let traversal = GraphTraversal::new(
        variant,
        caps(vec![
            ("A", Arc::new(SuffixCapability::new("-a"))),
            ("B", Arc::new(SuffixCapability::new("-b"))),
            ("C", Arc::new(SuffixCapability::new("-c"))),
        ]),
        None,
    )
    .expect("bound");

    let outcome = traversal
        .run(TraversalOptions {
            start_message: "x".to_string(),
            ..TraversalOptions::default()
        })
        .await
        .expect("run");

    assert_eq!(outcome.final_answer, "x-a-b-c");
    assert_eq!(
        outcome.transcript,
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    );
}

#[tokio::test]
async fn scripted_router_steers_the_walk() {
    let variant = variant(
        "stateDiagram-v2\n\
         [*] --> triage\n\
         triage --> billing : invoice\n\
         triage --> shipping : parcel\n\
         billing --> [*]\n\
         shipping --> [*]\n",
    );
    let traversal = GraphTraversal::new(
        variant,
        caps(vec![(WILDCARD, Arc::new(EchoCapability))]),
        Some(Arc::new(ScriptedRouter::new(vec!["shipping"]))),
    )
    .expect("bound");

    let outcome = traversal
        .run(TraversalOptions {
            start_message: "where is my parcel".to_string(),
            ..TraversalOptions::default()
        })
        .await
        .expect("run");
    assert_eq!(
        outcome.transcript,
        vec!["triage".to_string(), "shipping".to_string()]
    );
}

#[tokio::test]
async fn dead_end_graph_answers_with_start_message() {
    // No walk ever reaches the end sentinel, so no capability runs and
    // the start message passes through as the answer.
    let counting = CountingCapability::default();
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\n");
    let traversal = GraphTraversal::new(
        variant,
        caps(vec![(WILDCARD, Arc::new(counting.clone()))]),
        None,
    )
    .expect("bound");

    let outcome = traversal
        .run(TraversalOptions {
            start_message: "hello".to_string(),
            ..TraversalOptions::default()
        })
        .await
        .expect("run");

    assert!(outcome.transcript.is_empty());
    assert_eq!(outcome.final_answer, "hello");
    assert_eq!(counting.count(), 0);
}

#[tokio::test]
async fn capability_failure_aborts_with_node_context() {
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> [*]\n");
    let traversal =
        GraphTraversal::new(variant, caps(vec![("A", Arc::new(FailingCapability))]), None)
            .expect("bound");

    let err = traversal
        .run(TraversalOptions::default())
        .await
        .expect_err("capability fails");
    assert!(matches!(err, TraversalError::Capability { node_id, .. } if node_id == "A"));
}

#[tokio::test]
async fn each_node_history_seeds_from_initial() {
    let variant = variant("stateDiagram-v2\n[*] --> A\nA --> B\nB --> [*]\n");
    let traversal = GraphTraversal::new(
        variant,
        caps(vec![
            ("A", Arc::new(EchoCapability)),
            ("B", Arc::new(EchoCapability)),
        ]),
        None,
    )
    .expect("bound");

    let outcome = traversal
        .run(TraversalOptions {
            start_message: "q".to_string(),
            initial_history: vec![Message::system("shared context")],
        })
        .await
        .expect("run");

    for node in ["A", "B"] {
        let history = &outcome.histories[node];
        assert_eq!(history[0], Message::system("shared context"));
        assert_eq!(history.len(), 3);
    }
}
