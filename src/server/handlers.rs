//! API request handlers.
//!
//! The primes handler never computes anything itself: it validates the path
//! segment, submits the limit to the dispatcher and awaits the unit's outcome.
//! Failures are logged with full detail and answered with a generic 500.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::instrument;

use crate::version;

use super::AppState;
use super::error::{ApiError, ApiErrorBody};
use super::middleware::RequestId;
use super::types::{HealthResponse, PrimesResponse};

/// Parse the `N` path segment the way JavaScript's `parseInt` does.
///
/// Leading whitespace and one sign are skipped, a `0x` prefix switches to
/// hexadecimal, and digits are read up to the first character that is not
/// one: `"10abc"` is 10, `"2.5"` is 2, `"1e3"` is 1. Returns `None` when no
/// digit is found. Values beyond `i64` saturate.
pub fn parse_limit(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match s.get(..2) {
        Some("0x" | "0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        seen_digit = true;
        value = value
            .saturating_mul(i64::from(radix))
            .saturating_add(i64::from(digit));
    }

    seen_digit.then_some(if negative { -value } else { value })
}

/// Compute all primes up to `N`.
///
/// The computation runs in a fresh isolated compute unit; the request task
/// only waits for its outcome. The request ID is logged beside the unit id.
#[utoipa::path(
    get,
    path = "/api/primes/{n}",
    params(
        ("n" = String, Path, description = "Inclusive upper bound, an integer greater than 1"),
    ),
    responses(
        (status = 200, description = "Primes up to N", body = PrimesResponse),
        (status = 400, description = "N is not an integer greater than 1", body = ApiErrorBody),
        (status = 500, description = "The compute unit failed", body = ApiErrorBody),
    ),
    tag = "primes"
)]
#[instrument(skip(state, request_id, raw), fields(request_id = %request_id, n = %raw))]
pub async fn get_primes(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(raw): Path<String>,
) -> Result<Json<PrimesResponse>, ApiError> {
    let Some(limit) = parse_limit(&raw) else {
        tracing::debug!("Rejected unparseable limit");
        return Err(ApiError::invalid_limit());
    };

    let submission = state.dispatcher.submit(limit).inspect_err(|e| {
        tracing::debug!(error = %e, "Submission rejected");
    })?;
    let unit = submission.unit_id();
    let limit = submission.limit();

    match submission.await {
        Ok(result) => {
            tracing::debug!(%unit, count = result.primes.len(), "Primes computed");
            Ok(Json(PrimesResponse::from_result(limit, result)))
        }
        Err(e) => {
            tracing::error!(%request_id, %unit, limit, error = %e, "Request failed");
            Err(e.into())
        }
    }
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::full_version(),
        isolation: state.isolation,
        worker_capacity: state.dispatcher.worker_capacity(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, DispatcherConfig};
    use crate::error::Result;
    use crate::server::build_router;
    use crate::server::error::{INVALID_LIMIT_MESSAGE, SERVER_ERROR_MESSAGE};
    use crate::server::types::{PrimeList, TRUNCATION_MESSAGE};
    use crate::worker::{
        ComputationRequest, Isolation, ThreadSpawner, UnitEvent, UnitExit, UnitHandle, UnitId, UnitSpawner,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    /// Spawner whose units always fail the same way.
    struct FaultySpawner {
        events: Vec<UnitEvent>,
        spawned: Arc<AtomicUsize>,
    }

    impl UnitSpawner for FaultySpawner {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn spawn(&self, id: UnitId, _request: ComputationRequest) -> Result<UnitHandle> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            for event in &self.events {
                let _ = tx.send(event.clone());
            }
            Ok(UnitHandle::new(id, rx, None))
        }
    }

    fn state_with(spawner: Arc<dyn UnitSpawner>, isolation: Isolation) -> Arc<AppState> {
        Arc::new(AppState::new(
            Dispatcher::new(spawner, DispatcherConfig { worker_capacity: 3 }),
            isolation,
        ))
    }

    fn thread_state() -> Arc<AppState> {
        state_with(Arc::new(ThreadSpawner::new()), Isolation::Thread)
    }

    async fn get(state: Arc<AppState>, uri: &str) -> Response {
        build_router(state, None)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("10"), Some(10));
        assert_eq!(parse_limit("-3"), Some(-3));
        assert_eq!(parse_limit("+7"), Some(7));
        assert_eq!(parse_limit("  42"), Some(42));
        assert_eq!(parse_limit("0x1A"), Some(26));
        assert_eq!(parse_limit("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_limit("abc"), None);
        assert_eq!(parse_limit(""), None);
        assert_eq!(parse_limit("-"), None);
        assert_eq!(parse_limit("0x"), None);
        assert_eq!(parse_limit(".5"), None);
    }

    #[test]
    fn test_parse_limit_stops_at_first_non_digit() {
        assert_eq!(parse_limit("10abc"), Some(10));
        assert_eq!(parse_limit("2.5"), Some(2));
        assert_eq!(parse_limit("1e3"), Some(1));
        assert_eq!(parse_limit("12 34"), Some(12));
    }

    #[tokio::test]
    async fn test_primes_up_to_ten() {
        let response = get(thread_state(), "/api/primes/10").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["limit"], 10);
        assert_eq!(json["count"], 4);
        assert_eq!(json["primes"], serde_json::json!([2, 3, 5, 7]));
        assert!(json["duration_ms"].as_f64().unwrap() >= 0.0);
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn test_smallest_valid_limit() {
        let json = json_body(get(thread_state(), "/api/primes/2").await).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["primes"], serde_json::json!([2]));
    }

    #[tokio::test]
    async fn test_leading_integer_prefix_is_used() {
        let state = thread_state();

        let response = get(Arc::clone(&state), "/api/primes/10abc").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["limit"], 10);
        assert_eq!(json["primes"], serde_json::json!([2, 3, 5, 7]));

        let json = json_body(get(Arc::clone(&state), "/api/primes/2.5").await).await;
        assert_eq!(json["limit"], 2);
        assert_eq!(json["primes"], serde_json::json!([2]));

        let json = json_body(get(state, "/api/primes/%2010").await).await;
        assert_eq!(json["limit"], 10);
        assert_eq!(json["count"], 4);
    }

    #[tokio::test]
    async fn test_large_limit_is_truncated() {
        let json = json_body(get(thread_state(), "/api/primes/100000").await).await;
        assert_eq!(json["count"], 9_592);
        assert_eq!(json["primes"], "2,3,5,7,11,13,17,19,23,29...");
        assert_eq!(json["message"], TRUNCATION_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_limits_are_rejected_without_spawning() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let state = state_with(
            Arc::new(FaultySpawner {
                events: vec![],
                spawned: Arc::clone(&spawned),
            }),
            Isolation::Thread,
        );

        for n in ["abc", "1", "0", "-7", "1.9", "e3", "-", "0x1"] {
            let response = get(Arc::clone(&state), &format!("/api/primes/{}", n)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "n = {}", n);
            assert_eq!(
                json_body(response).await,
                serde_json::json!({ "error": INVALID_LIMIT_MESSAGE })
            );
        }
        assert_eq!(spawned.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unit_error_yields_single_500() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let state = state_with(
            Arc::new(FaultySpawner {
                events: vec![
                    UnitEvent::Error("injected failure".to_string()),
                    UnitEvent::Exit(UnitExit::code(1)),
                ],
                spawned: Arc::clone(&spawned),
            }),
            Isolation::Thread,
        );

        let response = get(state, "/api/primes/50").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": SERVER_ERROR_MESSAGE })
        );
        assert_eq!(spawned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abnormal_exit_yields_500() {
        let state = state_with(
            Arc::new(FaultySpawner {
                events: vec![UnitEvent::Exit(UnitExit::signal(9))],
                spawned: Arc::new(AtomicUsize::new(0)),
            }),
            Isolation::Process,
        );

        let response = get(state, "/api/primes/50").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn get_with_request_id(state: Arc<AppState>, uri: &str, request_id: &str) -> Response {
        build_router(state, None)
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("x-request-id", request_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_follows_primes_request() {
        let response = get_with_request_id(thread_state(), "/api/primes/10", "req-42").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");
        assert_eq!(json_body(response).await["count"], 4);

        let failing = state_with(
            Arc::new(FaultySpawner {
                events: vec![UnitEvent::Exit(UnitExit::signal(9))],
                spawned: Arc::new(AtomicUsize::new(0)),
            }),
            Isolation::Process,
        );
        let response = get_with_request_id(failing, "/api/primes/10", "req-43").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["x-request-id"], "req-43");
    }

    #[tokio::test]
    async fn test_repeated_requests_agree() {
        let state = thread_state();
        let first = json_body(get(Arc::clone(&state), "/api/primes/97").await).await;
        let second = json_body(get(state, "/api/primes/97").await).await;
        assert_eq!(first["primes"], second["primes"]);
        assert_eq!(first["count"], 25);
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = get(thread_state(), "/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["isolation"], "thread");
        assert_eq!(json["worker_capacity"], 3);
        assert_eq!(json["version"], version::full_version());
    }

    #[tokio::test]
    async fn test_truncated_response_deserializes() {
        let response = get(thread_state(), "/api/primes/1000").await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: PrimesResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(matches!(parsed.primes, PrimeList::Truncated(_)));
        assert_eq!(parsed.count, 168);
    }
}
