//! Remote tutor backend: JSON over HTTP to the tutoring service.
//!
//! Request body: `{ "message", "history": [{ "role", "text" }], "module" }`.
//! Response body: `{ "text", "latency_ms", "used_rag", "system_status", "suggested_actions"? }`.
//!
//! No client-side timeout is configured here; the session imposes one
//! around the whole call so that expiry counts as a breaker failure.

use async_trait::async_trait;
use serde::Serialize;
use stockflow_core::inference::HistoryTurn;
use stockflow_core::{ChatReply, ChatRequest, InferenceBackend, InferenceError, ModuleType};
use tracing::{debug, warn};

/// HTTP client for the tutor service.
pub struct RemoteTutorBackend {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    message: &'a str,
    history: &'a [HistoryTurn],
    module: ModuleType,
}

impl RemoteTutorBackend {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, InferenceError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(InferenceError::NotConfigured("backend url is empty".into()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| InferenceError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            url,
            api_key,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl InferenceBackend for RemoteTutorBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, InferenceError> {
        let body = ApiRequest {
            message: &request.message,
            history: &request.history,
            module: request.module,
        };

        debug!(url = %self.url, module = %request.module, history = request.history.len(), "Sending chat request");

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Tutor backend returned error");
            let message = if error_body.is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                error_body
            };
            return Err(InferenceError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<ChatReply>()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response and return the request it received.
    async fn serve_once(status_line: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            l.to_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });

        (format!("http://{addr}/api/v1/chat"), handle)
    }

    #[tokio::test]
    async fn decodes_successful_reply() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"text":"Loops are feedback.","latency_ms":120.0,"used_rag":true,"system_status":"HEALTHY"}"#,
        )
        .await;

        let backend = RemoteTutorBackend::new(url, Some("token-123".into())).unwrap();
        let request = ChatRequest::new("explain loops", ModuleType::Python)
            .with_history(vec![HistoryTurn {
                role: stockflow_core::Role::User,
                text: "hi".into(),
            }]);
        let reply = backend.complete(request).await.unwrap();

        assert_eq!(reply.text, "Loops are feedback.");
        assert!(reply.used_rag);
        assert_eq!(reply.system_status.as_deref(), Some("HEALTHY"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/v1/chat"));
        assert!(raw.to_lowercase().contains("authorization: bearer token-123"));
        assert!(raw.contains(r#""module":"PYTHON""#));
        assert!(raw.contains(r#""history":[{"role":"user","text":"hi"}]"#));
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let (url, _server) = serve_once("503 Service Unavailable", "").await;
        let backend = RemoteTutorBackend::new(url, None).unwrap();

        let err = backend
            .complete(ChatRequest::new("hello", ModuleType::Python))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InferenceError::Api {
                status_code: 503,
                message: "Service Unavailable".into(),
            }
        );
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let (url, _server) = serve_once("200 OK", "not json").await;
        let backend = RemoteTutorBackend::new(url, None).unwrap();

        let err = backend
            .complete(ChatRequest::new("hello", ModuleType::Python))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = RemoteTutorBackend::new(format!("http://127.0.0.1:{port}/chat"), None).unwrap();

        let err = backend
            .complete(ChatRequest::new("hello", ModuleType::Python))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Network(_)));
    }

    #[test]
    fn empty_url_is_not_configured() {
        assert!(matches!(
            RemoteTutorBackend::new("  ", None),
            Err(InferenceError::NotConfigured(_))
        ));
    }
}
