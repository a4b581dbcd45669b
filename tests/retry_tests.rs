use std::time::Duration;

use turnos_load::{Exhaustion, HttpMethod, HttpRequest, RetryPolicy, RetryingExecutor};

mod mock_transport;
use mock_transport::{Reply, ScriptedTransport};

fn listing() -> HttpRequest {
    HttpRequest::get("/api/usuarios/1/reservas", "GET /api/usuarios/{id}/reservas")
}

/// The paused clock advances in whole-millisecond ticks.
fn assert_gap(gap: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(5),
        "expected ~{expected_ms}ms between attempts, got {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn first_terminal_response_is_returned() {
    let mut transport =
        ScriptedTransport::new().on(HttpMethod::Get, "/api/usuarios", vec![Reply::ok("[]")]);

    let result = RetryingExecutor::default().execute(&mut transport, &listing()).await;

    assert!(result.succeeded);
    assert_eq!(result.status, Some(200));
    assert_eq!(result.body_str(), "[]");
    assert_eq!(result.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_never_retried() {
    for status in [400, 401, 404, 409] {
        let mut transport = ScriptedTransport::new().on(
            HttpMethod::Get,
            "/api/usuarios",
            vec![Reply::status(status)],
        );

        let result = RetryingExecutor::default().execute(&mut transport, &listing()).await;

        assert!(result.succeeded);
        assert_eq!(result.status, Some(status));
        assert_eq!(result.attempts, 1);
        assert_eq!(transport.sent().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn server_errors_back_off_exponentially() {
    let mut transport = ScriptedTransport::new().on(
        HttpMethod::Get,
        "/api/usuarios",
        vec![Reply::status(503)],
    );

    let result = RetryingExecutor::default().execute(&mut transport, &listing()).await;

    assert!(!result.succeeded);
    assert_eq!(result.attempts, 3);
    // reads hand back the last response
    assert_eq!(result.status, Some(503));

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_gap(sent[1].at - sent[0].at, 200);
    assert_gap(sent[2].at - sent[1].at, 400);
}

#[tokio::test(start_paused = true)]
async fn recovers_after_transient_faults() {
    let mut transport = ScriptedTransport::new().on(
        HttpMethod::Get,
        "/api/usuarios",
        vec![Reply::NetworkError, Reply::status(502), Reply::ok("[]")],
    );

    let result = RetryingExecutor::default().execute(&mut transport, &listing()).await;

    assert!(result.is_status(200));
    assert_eq!(result.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn attempts_never_exceed_policy() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(10),
    };
    let mut transport =
        ScriptedTransport::new().on(HttpMethod::Get, "/api/usuarios", vec![Reply::NetworkError]);

    let result = RetryingExecutor::new(policy).execute(&mut transport, &listing()).await;

    assert_eq!(result.attempts, 5);
    assert_eq!(transport.sent().len(), 5);
    assert_eq!(result.status, None);
}

#[tokio::test(start_paused = true)]
async fn exhausted_writes_return_no_response() {
    let mut transport = ScriptedTransport::new().on(
        HttpMethod::Post,
        "/api/reservas",
        vec![Reply::Status(500, "boom".into())],
    );
    let request = HttpRequest::post_json(
        "/api/reservas/byuser",
        "POST /api/reservas/byuser",
        &serde_json::json!({ "turnoId": 1 }),
    );
    let executor = RetryingExecutor::default();

    let result = executor.execute(&mut transport, &request).await;
    assert!(!result.succeeded);
    assert_eq!(result.status, None);
    assert_eq!(result.body, None);

    let result = executor
        .execute_with(&mut transport, &request, Exhaustion::ReturnLast)
        .await;
    assert_eq!(result.status, Some(500));
    assert_eq!(result.body_str(), "boom");
}

#[tokio::test(start_paused = true)]
async fn zero_attempt_policy_still_sends_once() {
    let policy = RetryPolicy {
        max_attempts: 0,
        initial_backoff: Duration::from_millis(200),
    };
    let mut transport =
        ScriptedTransport::new().on(HttpMethod::Get, "/api/usuarios", vec![Reply::ok("[]")]);

    let result = RetryingExecutor::new(policy).execute(&mut transport, &listing()).await;

    assert_eq!(result.attempts, 1);
    assert!(result.is_status(200));
}

#[tokio::test(start_paused = true)]
async fn harness_errors_fail_without_retry() {
    let mut transport =
        ScriptedTransport::new().on(HttpMethod::Get, "/api/usuarios", vec![Reply::HarnessError]);

    let result = RetryingExecutor::default().execute(&mut transport, &listing()).await;

    assert!(!result.succeeded);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.status, None);
    assert_eq!(transport.sent().len(), 1);
}
