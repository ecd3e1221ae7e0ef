//! Text completion boundary.
//!
//! The coach only needs "prompt in, text out". `HttpCompletionClient` talks to
//! any endpoint that accepts a JSON completion request and answers with one of
//! the common response shapes; tests substitute their own `CompletionService`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("completion response had no text")]
    EmptyCompletion,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
            model: None,
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

pub struct HttpCompletionClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpCompletionClient {
    /// `url` is the full completion endpoint, e.g. `http://localhost:8080/v1/complete`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: None,
            model: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Model name sent when the request itself does not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut body = request.clone();
        if body.model.is_none() {
            body.model = self.model.clone();
        }

        info!(url = %self.url, prompt_len = body.prompt.len(), "requesting completion");
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let raw = resp.text().await?;
        let text = extract_completion_text(&raw).ok_or(LlmError::EmptyCompletion)?;
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// Pull the generated text out of a completion response body.
///
/// Accepts `{"text"}`, `{"completion"}`, `{"content": [{"text"}]}`,
/// `{"choices": [{"message": {"content"}}]}` and `{"choices": [{"text"}]}`.
/// A body that is not JSON is taken as the text itself.
pub fn extract_completion_text(body: &str) -> Option<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    };

    let text = match &value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => value
            .get("text")
            .and_then(Value::as_str)
            .or_else(|| value.get("completion").and_then(Value::as_str))
            .or_else(|| joined_content(&value))
            .or_else(|| {
                let choice = value.get("choices")?.get(0)?;
                choice
                    .pointer("/message/content")
                    .and_then(Value::as_str)
                    .or_else(|| choice.get("text").and_then(Value::as_str))
            }),
        _ => None,
    };
    text.filter(|t| !t.trim().is_empty()).map(str::to_string)
}

fn joined_content(value: &Value) -> Option<&str> {
    value
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|block| block.get("text").and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/complete")
    }

    #[test]
    fn extracts_known_shapes() {
        assert_eq!(extract_completion_text(r#"{"text":"a"}"#).as_deref(), Some("a"));
        assert_eq!(
            extract_completion_text(r#"{"completion":"b"}"#).as_deref(),
            Some("b")
        );
        assert_eq!(
            extract_completion_text(r#"{"content":[{"type":"text","text":"c"}]}"#).as_deref(),
            Some("c")
        );
        assert_eq!(
            extract_completion_text(r#"{"choices":[{"message":{"content":"d"}}]}"#).as_deref(),
            Some("d")
        );
        assert_eq!(
            extract_completion_text(r#"{"choices":[{"text":"e"}]}"#).as_deref(),
            Some("e")
        );
    }

    #[test]
    fn plain_body_is_the_text() {
        assert_eq!(
            extract_completion_text("  just words \n").as_deref(),
            Some("just words")
        );
        assert_eq!(extract_completion_text("   "), None);
    }

    #[test]
    fn json_without_text_is_none() {
        assert_eq!(extract_completion_text(r#"{"id":"x"}"#), None);
        assert_eq!(extract_completion_text(r#"{"text":""}"#), None);
        assert_eq!(extract_completion_text("[1,2]"), None);
    }

    #[test]
    fn request_omits_unset_options() {
        let json = serde_json::to_value(CompletionRequest::new("hi")).unwrap();
        assert_eq!(json["prompt"], "hi");
        assert!(json.get("system").is_none());
        assert!(json.get("model").is_none());
    }

    #[tokio::test]
    async fn client_sends_model_and_key() {
        let app = Router::new().route(
            "/complete",
            post(|headers: HeaderMap, body: String| async move {
                let req: Value = serde_json::from_str(&body).unwrap();
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                axum::Json(serde_json::json!({
                    "text": format!("{}|{}", req["model"].as_str().unwrap_or(""), auth)
                }))
            }),
        );
        let url = serve(app).await;
        let client = HttpCompletionClient::new(url)
            .with_api_key("secret")
            .with_model("coach-small");
        let text = client.complete(&CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "coach-small|Bearer secret");
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let app = Router::new().route(
            "/complete",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "overloaded") }),
        );
        let url = serve(app).await;
        let err = HttpCompletionClient::new(url)
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();
        match err {
            LlmError::Server { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
