use crate::errors::LintFixError;
use crate::logging::append_run_log;
use crate::patch::{build_prompt, extract_code_block, PatchGenerator, PatchRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Patch generator backed by an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    language: String,
    stream: bool,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
        stream: bool,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            language: language.into(),
            stream,
            request_timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{GENERATE_PATH}", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, prompt: &str) -> Result<String, LintFixError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: self.stream,
        };
        let resp = self
            .http
            .post(self.endpoint())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LintFixError::Patch(format!("API request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LintFixError::Patch(format!("read response failed: {e}")))?;
        if status != reqwest::StatusCode::OK {
            return Err(LintFixError::Patch(format!(
                "API error {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }
        decode_generate_body(&text)
    }
}

#[async_trait]
impl PatchGenerator for OllamaClient {
    async fn generate(&self, request: &PatchRequest) -> Result<String, LintFixError> {
        let prompt = build_prompt(&self.language, request);
        append_run_log(
            "debug",
            "patch.request",
            json!({
                "path": request.path.display().to_string(),
                "model": self.model,
                "stream": self.stream,
                "prompt_bytes": prompt.len()
            }),
        );
        let raw = self.send(&prompt).await?;
        Ok(extract_code_block(&raw))
    }
}

/// Decodes a generate response. A streamed body is a run of JSON objects
/// whose `response` fragments are joined in arrival order; a plain body is
/// the one-object case.
pub fn decode_generate_body(body: &str) -> Result<String, LintFixError> {
    let mut text = String::new();
    let mut chunks = 0usize;
    for chunk in serde_json::Deserializer::from_str(body).into_iter::<GenerateChunk>() {
        let chunk =
            chunk.map_err(|e| LintFixError::Patch(format!("decode response failed: {e}")))?;
        if let Some(error) = chunk.error {
            return Err(LintFixError::Patch(format!("API error: {error}")));
        }
        text.push_str(&chunk.response);
        chunks += 1;
    }
    if chunks == 0 {
        return Err(LintFixError::Patch(
            "decode response failed: empty body".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::{decode_generate_body, OllamaClient};
    use crate::errors::LintFixError;
    use crate::patch::{PatchGenerator, PatchRequest};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> PatchRequest {
        PatchRequest {
            path: "x.go".into(),
            content: "package main".to_string(),
            lint_output: "bad".to_string(),
        }
    }

    /// Serves one connection with `response` once the full request is read.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if received.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.expect("shutdown");
        });
        format!("http://{addr}")
    }

    #[test]
    fn decodes_single_response_object() {
        let text = decode_generate_body(r#"{"model":"m","response":"hello","done":true}"#)
            .expect("decode");
        assert_eq!(text, "hello");
    }

    #[test]
    fn joins_streamed_fragments_in_order() {
        let body = "{\"response\":\"```go\\npack\"}\n{\"response\":\"age main\\n```\"}\n{\"response\":\"\",\"done\":true}\n";
        let text = decode_generate_body(body).expect("decode");
        assert_eq!(text, "```go\npackage main\n```");
    }

    #[test]
    fn back_to_back_objects_without_newlines_decode() {
        let text = decode_generate_body(r#"{"response":"a"}{"response":"b"}"#).expect("decode");
        assert_eq!(text, "ab");
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = decode_generate_body("not json").expect_err("must fail");
        assert!(matches!(err, LintFixError::Patch(msg) if msg.contains("decode response failed")));
    }

    #[test]
    fn empty_body_is_an_error() {
        assert!(decode_generate_body("  ").is_err());
    }

    #[test]
    fn error_object_is_surfaced() {
        let err = decode_generate_body(r#"{"error":"model not found"}"#).expect_err("must fail");
        assert!(format!("{err}").contains("model not found"));
    }

    #[test]
    fn endpoint_joins_base_url_once() {
        let client = OllamaClient::new(
            "http://localhost:11434/",
            "m",
            "Go",
            false,
            Duration::from_secs(1),
        );
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_patch_error() {
        let client = OllamaClient::new(
            "http://127.0.0.1:9",
            "m",
            "Go",
            false,
            Duration::from_secs(2),
        );
        let err = client.generate(&request()).await.expect_err("no server");
        assert!(matches!(err, LintFixError::Patch(msg) if msg.contains("API request failed")));
    }

    #[tokio::test]
    async fn non_200_status_is_an_api_error_with_body() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nboom\n",
        )
        .await;
        let client = OllamaClient::new(base, "m", "Go", false, Duration::from_secs(5));

        let err = client.generate(&request()).await.expect_err("server error");
        assert!(matches!(err, LintFixError::Patch(msg) if msg == "API error 500: boom"));
    }

    #[tokio::test]
    async fn ok_response_is_decoded_and_fence_extracted() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 52\r\nConnection: close\r\n\r\n{\"response\":\"```go\\npackage main\\n```\",\"done\":true}\n",
        )
        .await;
        let client = OllamaClient::new(base, "m", "Go", false, Duration::from_secs(5));

        let fixed = client.generate(&request()).await.expect("generate");
        assert_eq!(fixed, "package main");
    }
}
