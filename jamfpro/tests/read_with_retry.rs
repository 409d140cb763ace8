//! Behaviour of the read retry loop and the id lookup under a paused clock

#![allow(clippy::disallowed_methods)]

use jamfpro::crud::read_with_retry::{
    read_with_retry, ReadAttempt, ReadRetryError, ReadWithRetryOptions, StateContainer,
};
use jamfpro::crud::retryfetch::fetch_by_id;
use jamfpro::crud::state::ResourceData;
use jamfpro::crud::ErrorInfo;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tfplug::resource::{ReadResourceRequest, ReadResourceResponse};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::Context;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

/// Container that records every write
#[derive(Default)]
struct RecordingContainer {
    state: Option<DynamicValue>,
    writes: Vec<Option<DynamicValue>>,
}

impl StateContainer for RecordingContainer {
    fn state(&self) -> Option<&DynamicValue> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: Option<DynamicValue>) {
        self.writes.push(state.clone());
        self.state = state;
    }
}

fn seeded_container() -> RecordingContainer {
    let mut state = DynamicValue::object();
    state.set_id("42");
    RecordingContainer {
        state: Some(state),
        writes: Vec::new(),
    }
}

fn request() -> ReadResourceRequest {
    ReadResourceRequest::new("jamfpro_building", DynamicValue::object())
}

fn failure(detail: &str) -> ReadResourceResponse {
    ReadResourceResponse::with_diagnostics(
        Diagnostic::error("Error Reading Building", detail).into(),
    )
}

fn success(version: u32) -> ReadResourceResponse {
    let mut state = DynamicValue::object();
    state.set_id("42");
    state
        .set_string(&AttributePath::new("name"), format!("building v{}", version))
        .unwrap();
    ReadResourceResponse::with_state(state)
}

fn fast_options(max_retries: u32) -> ReadWithRetryOptions {
    ReadWithRetryOptions {
        max_retries,
        initial_retry_interval: Duration::from_millis(10),
        max_retry_interval: Duration::from_millis(50),
        ..ReadWithRetryOptions::for_operation("Read", "jamfpro_building")
    }
}

#[tokio::test(start_paused = true)]
async fn refuses_to_start_with_less_than_safety_margin() {
    let ctx = Context::new().with_timeout(Duration::from_millis(500));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { success(1) }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    assert!(matches!(result, Err(ReadRetryError::InsufficientTime)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(container.writes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn requires_a_deadline() {
    let mut container = seeded_container();

    let result = read_with_retry(
        &Context::new(),
        |_ctx, _req, _attempt| async { success(1) },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    let err = assert_err!(result);
    assert_eq!(
        err.to_string(),
        "context must have a deadline for retry operations"
    );
}

#[tokio::test(start_paused = true)]
async fn terminal_error_makes_exactly_one_call() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();
    let start = Instant::now();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { failure("API returned error (HTTP 400): invalid request") }
        },
        request(),
        &mut container,
        ReadWithRetryOptions::for_operation("Read", "jamfpro_building"),
    )
    .await;

    match result {
        Err(ReadRetryError::NonRetryable { info, source }) => {
            assert_eq!(info, ErrorInfo::new(400, "BadRequest"));
            assert_eq!(source.attempt, 1);
        }
        other => panic!("expected non-retryable error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(container.writes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn retryable_error_exhausts_max_retries_plus_one_calls() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { failure("API returned error (HTTP 503): Service Unavailable") }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    let err = assert_err!(result);
    assert!(matches!(err, ReadRetryError::Exhausted { attempts: 4, .. }));
    assert!(err.to_string().contains("after 4 attempts"), "{}", err);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(container.writes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn success_after_transient_errors_commits_once() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 2 {
                    failure("API returned error (HTTP 503): Service Unavailable")
                } else {
                    success(n)
                }
            }
        },
        request(),
        &mut container,
        fast_options(5),
    )
    .await;

    assert_ok!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(container.writes.len(), 1);

    let committed = container.writes[0].as_ref().unwrap();
    assert_eq!(
        committed.get_string(&AttributePath::new("name")).unwrap(),
        "building v3"
    );
}

#[tokio::test(start_paused = true)]
async fn unclassified_errors_are_retried() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    failure("connection reset by peer")
                } else {
                    success(n)
                }
            }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    assert_ok!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn not_found_after_create_is_retried() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    failure("API returned error (HTTP 404): Building not found")
                } else {
                    success(n)
                }
            }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    assert_ok!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_wait_returns_promptly() {
    let ctx = Context::new().with_timeout(Duration::from_secs(300));
    let canceller = ctx.clone();
    let mut container = seeded_container();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let opts = ReadWithRetryOptions {
        initial_retry_interval: Duration::from_secs(20),
        max_retry_interval: Duration::from_secs(30),
        ..fast_options(5)
    };

    let start = Instant::now();
    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| async { failure("HTTP 503") },
        request(),
        &mut container,
        opts,
    )
    .await;

    assert!(matches!(result, Err(ReadRetryError::CancelledDuringWait(_))));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(container.writes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_context_stops_before_first_attempt() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    ctx.cancel();
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { success(1) }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    let err = assert_err!(result);
    assert!(matches!(err, ReadRetryError::Cancelled { attempt: 1, .. }));
    assert!(err
        .to_string()
        .starts_with("context cancelled during retry attempt 1"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_retries_without_overshooting() {
    let ctx = Context::new().with_timeout(Duration::from_secs(10));
    let calls = AtomicU32::new(0);
    let mut container = seeded_container();
    let start = Instant::now();

    // default 2s / x1.5 / 30s backoff with 30 retries
    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { failure("HTTP 503") }
        },
        request(),
        &mut container,
        ReadWithRetryOptions::for_operation("Read", "jamfpro_building"),
    )
    .await;

    let made = calls.load(Ordering::SeqCst);
    match result {
        Err(ReadRetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, made),
        other => panic!("expected exhaustion, got {:?}", other),
    }
    // waits of 2s + 3s fit, the 4.5s one would end inside the safety margin
    assert_eq!(made, 3);
    assert!(start.elapsed() <= Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn read_function_sees_label_attempt_and_seeded_state() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let seen: Mutex<Vec<(ReadAttempt, String)>> = Mutex::new(Vec::new());
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, req: ReadResourceRequest, attempt: ReadAttempt| {
            let id = req.current_state.id();
            let first = attempt.attempt == 1;
            seen.lock().unwrap().push((attempt, id));
            async move {
                if first {
                    failure("HTTP 429 too many requests")
                } else {
                    success(2)
                }
            }
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    assert_ok!(result);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0.operation, "Read");
    assert_eq!(seen[0].0.attempt, 1);
    assert_eq!(seen[1].0.attempt, 2);
    assert!(seen.iter().all(|(_, id)| id == "42"));
}

#[tokio::test(start_paused = true)]
async fn vanished_resource_commits_null_state() {
    let ctx = Context::new().with_timeout(Duration::from_secs(60));
    let mut container = seeded_container();

    let result = read_with_retry(
        &ctx,
        |_ctx, _req, _attempt| async {
            ReadResourceResponse::with_diagnostics(Default::default())
        },
        request(),
        &mut container,
        fast_options(3),
    )
    .await;

    assert_ok!(result);
    assert_eq!(container.writes, vec![None]);
    assert!(container.state().is_none());
}

#[tokio::test(start_paused = true)]
async fn id_lookup_that_keeps_failing_with_404_clears_id_with_warning() {
    let ctx = Context::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut state = DynamicValue::object();
    state.set_id("17");

    let (found, diags): (Option<String>, _) =
        fetch_by_id(&ctx, &mut state, Duration::from_secs(20), "17", |_id| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("API returned error (HTTP 404): Building not found".to_string()) }
        })
        .await;

    assert!(found.is_none());
    assert!(!diags.has_error());
    let warnings: Vec<_> = diags.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].summary, "Resource not found");
    assert_eq!(state.id(), "");
    assert!(calls.load(Ordering::SeqCst) > 1);
}
