//! HTTP client for the render service.

use std::time::Duration;

use meshforge_core::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Payload sent to the render service.
#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    model_code: &'a str,
}

/// Structured failure body the render service emits on rejection.
#[derive(Debug, Deserialize)]
struct RenderFailureBody {
    error: String,
    details: String,
    blender_log: String,
}

/// Client for the remote render service.
///
/// Submits model code to `{render_base_url}create_model` and classifies the
/// outcome. Blocks the caller until a response or transport failure; exactly
/// one request is in flight per call and no retry is attempted.
#[derive(Debug, Clone)]
pub struct RenderClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RenderClient {
    /// Creates a client for the given render service base URL.
    ///
    /// The base URL is expected to be trailing-slash-normalized (the
    /// configuration layer guarantees this).
    pub fn new(render_base_url: &str, timeout: Duration) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Network {
                message: format!("failed to build HTTP client: {}", e),
                details: String::new(),
            })?;
        Ok(Self {
            http,
            endpoint: format!("{}create_model", render_base_url),
        })
    }

    /// Creates a client from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, RenderError> {
        Self::new(&config.render_base_url, config.request_timeout)
    }

    /// Submits model code and returns the rendered mesh bytes.
    ///
    /// Classification, in priority order: transport failure, failure status
    /// with structured JSON body, failure status with arbitrary body,
    /// success bytes.
    pub async fn render(&self, model_code: &str) -> Result<Vec<u8>, RenderError> {
        tracing::debug!(endpoint = %self.endpoint, "requesting model render");

        let response = match self
            .http
            .post(&self.endpoint)
            .json(&RenderRequest { model_code })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "render request failed at transport level");
                return Err(RenderError::from_transport(&e));
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(failure) = serde_json::from_str::<RenderFailureBody>(&body) {
                tracing::warn!(status = status.as_u16(), error = %failure.error, "render service rejected the model code");
                return Err(RenderError::Server {
                    message: failure.error,
                    details: failure.details,
                    log: failure.blender_log,
                });
            }
            tracing::warn!(status = status.as_u16(), "render service returned an unstructured failure");
            return Err(RenderError::Server {
                message: format!("HTTP {}", status.as_u16()),
                details: body,
                log: String::new(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::MalformedResponse {
                message: format!("failed to read render response body: {}", e),
            })?;
        tracing::debug!(len = bytes.len(), "received rendered model");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Builds a raw HTTP/1.1 response.
    fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    /// Spawns a one-shot HTTP stub that reads a full request and writes the
    /// given response. Returns the stub's base URL.
    async fn spawn_stub(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                read_request(&mut stream).await;
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/", addr)
    }

    /// Reads headers plus a content-length body from the stream.
    async fn read_request(stream: &mut tokio::net::TcpStream) {
        let mut buf = vec![0u8; 65536];
        let mut total = 0;
        loop {
            let n = stream.read(&mut buf[total..]).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            total += n;
            if let Some(header_end) = find(&buf[..total], b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if total >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[tokio::test]
    async fn test_success_returns_bytes() {
        let body = b"\x00\x01\x02\x03hello mesh";
        let base = spawn_stub(http_response("200 OK", "application/octet-stream", body)).await;
        let client = RenderClient::new(&base, Duration::from_secs(5)).unwrap();

        let bytes = client.render("def model():\n    pass").await.unwrap();
        assert_eq!(bytes, body.to_vec());
    }

    #[tokio::test]
    async fn test_structured_server_failure() {
        let body = br#"{"error":"E","details":"D","blender_log":"L"}"#;
        let base = spawn_stub(http_response(
            "500 Internal Server Error",
            "application/json",
            body,
        ))
        .await;
        let client = RenderClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.render("def model():\n    pass").await.unwrap_err();
        assert_eq!(err.message(), "E");
        assert_eq!(err.details(), "D");
        assert_eq!(err.log(), "L");
    }

    #[tokio::test]
    async fn test_unstructured_server_failure() {
        let base = spawn_stub(http_response("404 Not Found", "text/plain", b"no such route")).await;
        let client = RenderClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.render("def model():\n    pass").await.unwrap_err();
        assert_eq!(err.message(), "HTTP 404");
        assert_eq!(err.details(), "no such route");
        assert_eq!(err.log(), "");
    }

    #[tokio::test]
    async fn test_failure_body_missing_fields_falls_back() {
        // A JSON failure body without the full structured shape is treated
        // as unstructured.
        let base = spawn_stub(http_response(
            "500 Internal Server Error",
            "application/json",
            br#"{"error":"E"}"#,
        ))
        .await;
        let client = RenderClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.render("def model():\n    pass").await.unwrap_err();
        assert_eq!(err.message(), "HTTP 500");
        assert_eq!(err.details(), r#"{"error":"E"}"#);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to obtain a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            RenderClient::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
        let err = client.render("def model():\n    pass").await.unwrap_err();

        assert!(matches!(err, RenderError::Network { .. }));
        assert_eq!(err.log(), "");
        assert!(!err.details().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        // Accept the connection but never respond.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(10)).await;
                drop(stream);
            }
        });

        let client =
            RenderClient::new(&format!("http://{}/", addr), Duration::from_millis(200)).unwrap();
        let err = client.render("def model():\n    pass").await.unwrap_err();

        assert!(matches!(err, RenderError::Network { .. }));
        assert!(err.message().contains("timed out"));
    }
}
