use crate::config::SyncConfig;
use crate::error::SyncError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for the backend's batch sync endpoint
pub struct BackendClient {
    endpoint: String,
    http_client: reqwest::Client,
    last_success: Arc<AtomicU64>, // Unix timestamp in seconds
}

impl BackendClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint,
            http_client,
            last_success: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.sync_endpoint(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn last_success_timestamp(&self) -> u64 {
        self.last_success.load(Ordering::Relaxed)
    }

    /// POST the whole batch as one JSON array. Any 2xx status counts as delivered.
    pub async fn post_records(&self, records: &[serde_json::Value]) -> Result<(), SyncError> {
        let body =
            serde_json::to_vec(records).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("{}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Rejected {
                status: status.as_u16(),
            });
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_success.store(now, Ordering::Relaxed);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(format!("{}/sync", server.uri()), Duration::from_secs(2))
    }

    #[test]
    fn test_client_creation() {
        let config = SyncConfig::new("http://localhost:8080").unwrap();
        let client = BackendClient::from_config(&config);

        assert_eq!(client.endpoint(), "http://localhost:8080/sync");
        assert_eq!(client.last_success_timestamp(), 0);
    }

    #[tokio::test]
    async fn test_post_sends_json_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!([{"id": 1}, {"id": 2}])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "synced"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .post_records(&[json!({"id": 1}), json!({"id": 2})])
            .await
            .unwrap();
        assert!(client.last_success_timestamp() > 0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.post_records(&[json!({"id": 1})]).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 400 }));
        assert_eq!(client.last_success_timestamp(), 0);
    }

    #[tokio::test]
    async fn test_accepts_any_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert!(client_for(&server)
            .post_records(&[json!({"id": 1})])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = BackendClient::new(
            "http://127.0.0.1:1/sync".to_string(),
            Duration::from_secs(2),
        );
        let err = client.post_records(&[json!({"id": 1})]).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
