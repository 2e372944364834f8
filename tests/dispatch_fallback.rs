//! Fallback behavior through the public dispatcher surface: queue ordering,
//! pinned retries, retry bounds, escalation.

mod common;

use common::{StubAdapter, StubOutcome};
use llm_relay::{Dispatcher, Error, RequestSpec};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn dispatcher() -> Dispatcher {
    Dispatcher::builder().build().unwrap()
}

#[tokio::test]
async fn ordered_queue_is_walked_front_to_back_once_each() {
    common::init_tracing();
    let stub = Arc::new(
        StubAdapter::new("stub")
            .script("A", vec![StubOutcome::RateLimited(None)])
            .script("B", vec![StubOutcome::RateLimited(None)])
            .script("C", vec![StubOutcome::Ok(json!({"winner": "C"}))]),
    );

    let spec = RequestSpec::builder("pick one")
        .models(["A", "B", "C"])
        .custom_provider(stub.clone())
        .build();

    let payload = dispatcher().try_complete(spec).await.unwrap();
    assert_eq!(payload.as_json().unwrap()["winner"], "C");
    assert_eq!(stub.models_called(), vec!["A", "B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn pinned_candidate_retries_in_place_with_floored_waits() {
    let stub = Arc::new(StubAdapter::new("stub").script(
        "A",
        vec![
            StubOutcome::RateLimited(Some(5)),
            StubOutcome::RateLimited(Some(5)),
            StubOutcome::Ok(json!({"ok": true})),
        ],
    ));

    let spec = RequestSpec::builder("patience")
        .model("A")
        .custom_provider(stub.clone())
        .build();

    let started = tokio::time::Instant::now();
    let payload = dispatcher().try_complete(spec).await.unwrap();

    assert_eq!(payload.as_json().unwrap()["ok"], true);
    assert_eq!(stub.models_called(), vec!["A", "A", "A"]);
    // Two waits, each floored to 30s regardless of the 5s hint.
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test]
async fn malformed_output_is_bounded_at_four_attempts_then_null() {
    let stub = Arc::new(StubAdapter::new("stub").script("A", vec![StubOutcome::Malformed]));

    let spec = RequestSpec::builder("unparsable")
        .model("A")
        .custom_provider(stub.clone())
        .build();

    let result = dispatcher().complete(spec).await;
    assert!(result.is_none());
    assert_eq!(stub.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn overload_retries_are_capped_with_a_typed_error() {
    let stub = Arc::new(StubAdapter::new("stub").script("A", vec![StubOutcome::Overloaded]));

    let spec = RequestSpec::builder("unavailable")
        .model("A")
        .custom_provider(stub.clone())
        .build();

    let err = dispatcher().try_complete(spec).await.unwrap_err();
    match err {
        Error::OverloadExhausted { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("expected OverloadExhausted, got {other}"),
    }
    assert_eq!(stub.calls().len(), 5);
}

#[tokio::test]
async fn fatal_failure_escalates_without_touching_later_candidates() {
    let stub = Arc::new(
        StubAdapter::new("stub")
            .script("A", vec![StubOutcome::Fatal])
            .script("B", vec![StubOutcome::Ok(json!({"never": true}))]),
    );

    let spec = RequestSpec::builder("doomed")
        .models(["A", "B"])
        .custom_provider(stub.clone())
        .build();

    let err = dispatcher().try_complete(spec).await.unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(stub.models_called(), vec!["A"]);
}

#[tokio::test]
async fn drained_queue_reports_exhaustion() {
    let stub = Arc::new(
        StubAdapter::new("stub")
            .script("A", vec![StubOutcome::RateLimited(None)])
            .script("B", vec![StubOutcome::RateLimited(None)]),
    );

    let spec = RequestSpec::builder("no luck")
        .models(["A", "B"])
        .custom_provider(stub.clone())
        .build();

    let err = dispatcher().try_complete(spec).await.unwrap_err();
    match err {
        Error::ExhaustedCandidates { tried } => assert_eq!(tried, 2),
        other => panic!("expected ExhaustedCandidates, got {other}"),
    }
    assert_eq!(stub.models_called(), vec!["A", "B"]);
}

#[tokio::test]
async fn default_walk_cursor_skips_rate_limited_cheap_candidates() {
    // Replace the standard families the default priority list resolves to.
    let gemini_stub = Arc::new(
        StubAdapter::new("gemini")
            .script("gemini-2.0-flash", vec![StubOutcome::RateLimited(None)])
            .script("gemini-2.5-flash", vec![StubOutcome::Ok(json!({"tier": "mid"}))]),
    );
    let router_stub = Arc::new(StubAdapter::new("openrouter"));

    let dispatcher = Dispatcher::builder()
        .register_adapter(gemini_stub.clone())
        .register_adapter(router_stub.clone())
        .build()
        .unwrap();

    let first = RequestSpec::builder("first call").build();
    dispatcher.try_complete(first).await.unwrap();
    assert_eq!(
        gemini_stub.models_called(),
        vec!["gemini-2.0-flash", "gemini-2.5-flash"]
    );

    // An unrelated later call starts past the rate-limited index.
    let second = RequestSpec::builder("second call").build();
    dispatcher.try_complete(second).await.unwrap();
    assert_eq!(
        gemini_stub.models_called(),
        vec!["gemini-2.0-flash", "gemini-2.5-flash", "gemini-2.5-flash"]
    );
    assert!(router_stub.calls().is_empty());
}

#[tokio::test]
async fn descriptor_contract_reaches_the_adapter_compiled() {
    let stub = Arc::new(
        StubAdapter::new("stub").script("A", vec![StubOutcome::Ok(json!({"result": 3}))]),
    );

    let spec = RequestSpec::builder("sum")
        .input("a", json!(1))
        .input("b", json!(2))
        .outputs(json!({"result": "Number | sum"}))
        .model("A")
        .custom_provider(stub.clone())
        .build();

    dispatcher().try_complete(spec).await.unwrap();
    let calls = stub.calls();
    assert!(calls[0].had_schema, "adapter must see the compiled schema, not the descriptor");
}
