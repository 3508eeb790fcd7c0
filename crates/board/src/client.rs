//! HTTP client for the board's REST API.
//!
//! Every logical call runs under a bounded total deadline with exponential
//! backoff plus jitter on transient failures (network errors, 5xx, 429).
//! Other 4xx responses are fatal immediately.

use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    rand::Rng,
    reqwest::{Method, StatusCode},
    serde::de::DeserializeOwned,
    tracing::{debug, warn},
};

use prism_common::{Error, Result};

use crate::types::{BoardEpic, BoardTask, TaskListResponse};

/// Per-attempt HTTP timeout; the retry loop owns the overall deadline.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total wall-clock budget for one logical call.
    pub deadline: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Exponential delay for the given attempt (1-based), half deterministic and
/// half jitter so synchronized clients fan out.
fn backoff_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exp = policy
        .base_delay
        .saturating_mul(1u32 << attempt.min(16).saturating_sub(1))
        .min(policy.max_delay);
    let half = exp / 2;
    let jitter_ms = rand::rng().random_range(0..=half.as_millis().max(1) as u64);
    half + Duration::from_millis(jitter_ms)
}

/// Operations PRISM needs from a board. Kept as a trait so the router can be
/// driven against a fake board in tests.
#[async_trait]
pub trait BoardClient: Send + Sync {
    async fn healthy(&self) -> bool;
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<BoardTask>>;
    async fn create_task(
        &self,
        project_id: &str,
        title: &str,
        body: &str,
        epic_id: Option<&str>,
    ) -> Result<BoardTask>;
    async fn create_epic(
        &self,
        project_id: &str,
        title: &str,
        description: &str,
    ) -> Result<BoardEpic>;
    async fn get_task(&self, board_id: &str) -> Result<BoardTask>;
    async fn update_task_status(&self, board_id: &str, status: &str) -> Result<BoardTask>;
}

pub struct HttpBoardClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpBoardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let start = Instant::now();
        let mut attempt = 0u32;
        let mut last_error = String::new();

        loop {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .timeout(ATTEMPT_TIMEOUT);
            if let Some(ref b) = body {
                req = req.json(b);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json().await.map_err(|e| {
                            Error::message(format!("board returned malformed JSON: {e}"))
                        });
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::not_found(format!("board resource {path}")));
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = format!("{status}");
                    } else {
                        // Remaining 4xx are caller errors; retrying won't help.
                        return Err(Error::invalid(format!(
                            "board rejected {method} {path}: {status}"
                        )));
                    }
                },
                Err(e) => {
                    last_error = e.to_string();
                },
            }

            attempt += 1;
            let delay = backoff_delay(attempt, &self.retry);
            if start.elapsed() + delay >= self.retry.deadline {
                return Err(Error::ExternalUnavailable(format!(
                    "board {method} {path} failed after {attempt} attempts: {last_error}"
                )));
            }
            warn!(%method, path, attempt, error = %last_error, "board call failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl BoardClient for HttpBoardClient {
    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "board health probe failed");
                false
            },
        }
    }

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<BoardTask>> {
        let resp: TaskListResponse = self
            .request(
                Method::GET,
                &format!("/api/projects/{project_id}/tasks"),
                None,
            )
            .await?;
        Ok(resp.into_tasks())
    }

    async fn create_task(
        &self,
        project_id: &str,
        title: &str,
        body: &str,
        epic_id: Option<&str>,
    ) -> Result<BoardTask> {
        let mut payload = serde_json::json!({
            "title": title,
            "description": body,
            "status": "todo",
        });
        if let Some(epic_id) = epic_id {
            payload["epicId"] = serde_json::Value::String(epic_id.to_string());
        }
        self.request(
            Method::POST,
            &format!("/api/projects/{project_id}/tasks"),
            Some(payload),
        )
        .await
    }

    async fn create_epic(
        &self,
        project_id: &str,
        title: &str,
        description: &str,
    ) -> Result<BoardEpic> {
        self.request(
            Method::POST,
            &format!("/api/projects/{project_id}/epics"),
            Some(serde_json::json!({ "title": title, "description": description })),
        )
        .await
    }

    async fn get_task(&self, board_id: &str) -> Result<BoardTask> {
        self.request(Method::GET, &format!("/api/tasks/{board_id}"), None)
            .await
    }

    async fn update_task_status(&self, board_id: &str, status: &str) -> Result<BoardTask> {
        self.request(
            Method::PATCH,
            &format!("/api/tasks/{board_id}"),
            Some(serde_json::json!({ "status": status })),
        )
        .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Json, Router, extract::State, http::StatusCode, routing::get, routing::post},
        std::{
            net::SocketAddr,
            sync::{
                Arc,
                atomic::{AtomicU32, Ordering},
            },
        },
        tokio::net::TcpListener,
    };

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            deadline: Duration::from_millis(400),
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        }
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        addr
    }

    #[tokio::test]
    async fn test_get_task_roundtrip() {
        let router = Router::new().route(
            "/api/tasks/{id}",
            get(|| async {
                Json(serde_json::json!({
                    "id": "b-42", "title": "Login", "status": "in-progress",
                    "description": "JWT login", "epicId": "e-1"
                }))
            }),
        );
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}"));
        let task = client.get_task("b-42").await.unwrap();
        assert_eq!(task.title, "Login");
        assert_eq!(task.status, "in-progress");
    }

    #[tokio::test]
    async fn test_transient_5xx_is_retried_then_succeeds() {
        let hits = Arc::new(AtomicU32::new(0));
        let state = Arc::clone(&hits);
        let router = Router::new()
            .route(
                "/api/tasks/{id}",
                get(|State(hits): State<Arc<AtomicU32>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(serde_json::json!({
                            "id": "b-1", "title": "Flaky", "status": "todo"
                        })))
                    }
                }),
            )
            .with_state(state);
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}")).with_retry(fast_retry());
        let task = client.get_task("b-1").await.unwrap();
        assert_eq!(task.title, "Flaky");
        assert!(hits.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_persistent_5xx_exhausts_deadline() {
        let router = Router::new().route(
            "/api/tasks/{id}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}")).with_retry(fast_retry());
        let err = client.get_task("b-1").await.unwrap_err();
        assert!(matches!(err, Error::ExternalUnavailable(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_4xx_is_fatal_without_retry() {
        let hits = Arc::new(AtomicU32::new(0));
        let state = Arc::clone(&hits);
        let router = Router::new()
            .route(
                "/api/projects/{id}/tasks",
                post(|State(hits): State<Arc<AtomicU32>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::UNPROCESSABLE_ENTITY
                }),
            )
            .with_state(state);
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}")).with_retry(fast_retry());
        let err = client
            .create_task("p-1", "title", "body", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {err}");
        assert_eq!(hits.load(Ordering::SeqCst), 1, "no retry on 4xx");
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let router = Router::new();
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}")).with_retry(fast_retry());
        let err = client.get_task("ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_external_unavailable() {
        let client =
            HttpBoardClient::new("http://127.0.0.1:1").with_retry(fast_retry());
        let err = client.get_task("b-1").await.unwrap_err();
        assert!(matches!(err, Error::ExternalUnavailable(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_health_probe() {
        let router = Router::new().route("/health", get(|| async { "ok" }));
        let addr = serve(router).await;
        let client = HttpBoardClient::new(format!("http://{addr}"));
        assert!(client.healthy().await);

        let down = HttpBoardClient::new("http://127.0.0.1:1");
        assert!(!down.healthy().await);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        let d1 = backoff_delay(1, &policy);
        assert!(d1 >= policy.base_delay / 2);
        let d10 = backoff_delay(10, &policy);
        assert!(d10 <= policy.max_delay + policy.max_delay / 2);
    }
}
