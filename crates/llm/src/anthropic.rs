//! [`AnthropicProvider`]: the Messages API over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{Completion, CompletionRequest, LlmProvider, PitchError, RetryPolicy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use crate::wire::{error_message, MessagesRequest, MessagesResponse};
use crate::LlmError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Connection and retry settings for [`AnthropicProvider`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    /// Used when a request carries no `max_tokens`; the API requires one.
    pub default_max_tokens: u32,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// First back-off delay; doubled after every retry.
    pub initial_backoff: Duration,
    /// Bound on a single HTTP exchange.
    pub request_timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            default_max_tokens: 4096,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(180),
        }
    }
}

/// [`LlmProvider`] for Anthropic's Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Configuration("API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| LlmError::Configuration(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, body: &MessagesRequest) -> Result<Completion, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, retry_after, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;
        let content = parsed.text().ok_or(LlmError::EmptyResponse)?;
        Ok(Completion {
            content,
            usage: parsed.token_usage(),
        })
    }

    /// Sends `body`, retrying retryable failures with exponential back-off.
    async fn send(&self, body: &MessagesRequest) -> Result<Completion, LlmError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.send_once(body).await {
                Ok(completion) => return Ok(completion),
                Err(err) => err,
            };
            let RetryPolicy::Retryable { after } = err.retry_policy() else {
                return Err(err);
            };
            if attempt > self.config.max_retries {
                warn!(attempt, error = %err, "retries exhausted");
                return Err(err);
            }
            let delay = after.map_or(backoff, |after| after.max(backoff));
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying LLM call");
            tokio::time::sleep(delay).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

fn classify(status: StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
    let message = error_message(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited {
            retry_after,
            message,
        }
    } else {
        LlmError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError> {
        let body = MessagesRequest::from_completion(&request, self.config.default_max_tokens);
        let completion = self.send(&body).await?;
        debug!(
            input_tokens = completion.usage.input.as_u64(),
            output_tokens = completion.usage.output.as_u64(),
            "anthropic completion"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pipeline::{ChatMessage, ModelName};
    use reqwest::header::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves the scripted `(status line, extra headers, body)` responses in
    /// order, one per connection, and counts requests.
    async fn scripted_server(
        responses: Vec<(&'static str, &'static str, &'static str)>,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for (status, headers, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n{headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        (format!("http://{addr}"), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn provider(base_url: String, max_retries: u32) -> AnthropicProvider {
        let mut config = AnthropicConfig::new("test-key");
        config.base_url = base_url;
        config.max_retries = max_retries;
        config.initial_backoff = Duration::from_millis(1);
        config.request_timeout = Duration::from_secs(5);
        AnthropicProvider::new(config).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            model: ModelName::new("claude-test").unwrap(),
            temperature: None,
            max_tokens: Some(64),
        }
    }

    const OK_BODY: &str =
        r#"{"content":[{"type":"text","text":"hello"}],"usage":{"input_tokens":5,"output_tokens":1}}"#;

    #[test]
    fn retry_after_header_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn statuses_are_classified() {
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, None, "{}"),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, None, "nope"),
            LlmError::Status { status: 401, .. }
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            AnthropicProvider::new(AnthropicConfig::new(" ")),
            Err(LlmError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn overloaded_then_ok_is_retried() {
        let (url, hits) = scripted_server(vec![
            ("529 Overloaded", "", r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
            ("429 Too Many Requests", "retry-after: 0\r\n", "{}"),
            ("200 OK", "", OK_BODY),
        ])
        .await;
        let completion = provider(url, 3).complete(request()).await.unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.usage.total().as_u64(), 6);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, hits) = scripted_server(vec![(
            "400 Bad Request",
            "",
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#,
        )])
        .await;
        let err = provider(url, 3).complete(request()).await.unwrap_err();
        assert!(matches!(err, PitchError::ExternalCall { .. }));
        assert!(err.to_string().contains("max_tokens too large"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (url, hits) = scripted_server(vec![
            ("500 Internal Server Error", "", "{}"),
            ("500 Internal Server Error", "", "{}"),
        ])
        .await;
        let err = provider(url, 1).complete(request()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
