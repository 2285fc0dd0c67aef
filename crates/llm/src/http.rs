//! HTTP-based LLM providers.
//!
//! Speaks the OpenAI-compatible chat completions API, which DeepSeek,
//! OpenAI and Google Gemini all expose.

use crate::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Inferred provider kind from model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Google,
    DeepSeek,
    /// Falls back to OpenAI defaults.
    Unknown,
}

impl ProviderKind {
    /// Infer provider from model name prefix.
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("gpt-")
            || m.starts_with("o1-")
            || m.starts_with("o3-")
            || m.starts_with("o4-")
        {
            Self::OpenAi
        } else if m.starts_with("gemini-") {
            Self::Google
        } else if m.starts_with("deepseek-") {
            Self::DeepSeek
        } else {
            Self::Unknown
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

// ── OpenAI-compatible request/response types ──

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct OaiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OaiResponse {
    #[serde(default)]
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Provider ──

/// HTTP chat completion provider for OpenAI-compatible APIs.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        Self {
            kind,
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    /// Replace the HTTP client with one that aborts requests after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(|m| OaiMessage {
                role: role_str(&m.role),
                content: m.content.clone(),
            }).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(model = %self.model, messages = body.messages.len(), "sending chat completion");

        let resp = self.client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: OaiResponse = resp.json().await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let choice = api.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default();
        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

        tracing::debug!(input_tokens, output_tokens, "chat completion received");
        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Parse error response, returning RateLimited for 429.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.complete_openai(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(question: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user(question)],
            max_tokens: 500,
            temperature: 0.1,
        }
    }

    #[test]
    fn infer_openai_models() {
        assert_eq!(ProviderKind::from_model("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_model("o3-mini"), ProviderKind::OpenAi);
    }

    #[test]
    fn infer_deepseek_models() {
        assert_eq!(ProviderKind::from_model("deepseek-chat"), ProviderKind::DeepSeek);
        assert_eq!(ProviderKind::from_model("DeepSeek-Reasoner"), ProviderKind::DeepSeek);
    }

    #[test]
    fn infer_unknown_falls_back() {
        assert_eq!(ProviderKind::from_model("qwen-72b"), ProviderKind::Unknown);
        assert_eq!(ProviderKind::from_model("gemini-pro"), ProviderKind::Google);
    }

    #[test]
    fn deepseek_endpoint() {
        let p = HttpProvider::new("deepseek-chat".into(), "sk-test".into(), None);
        assert_eq!(p.endpoint(), "https://api.deepseek.com/chat/completions");
        assert_eq!(p.name(), "deepseek");
    }

    #[test]
    fn custom_base_url_override() {
        let p = HttpProvider::new(
            "deepseek-chat".into(),
            "sk-test".into(),
            Some("https://my-proxy.com/v1/".into()),
        );
        assert_eq!(p.endpoint(), "https://my-proxy.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn completes_against_openai_compatible_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "max_tokens": 500,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "闫同学是谁？"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "一位技术博主"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = HttpProvider::new("deepseek-chat".into(), "sk-test".into(), Some(server.uri()));
        let resp = p.complete(request("闫同学是谁？")).await.unwrap();
        assert_eq!(resp.content, "一位技术博主");
        assert_eq!((resp.input_tokens, resp.output_tokens), (12, 7));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let p = HttpProvider::new("deepseek-chat".into(), "sk-test".into(), Some(server.uri()));
        let err = p.complete(request("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn status_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let p = HttpProvider::new("deepseek-chat".into(), "sk-test".into(), Some(server.uri()));
        let err = p.complete(request("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let p = HttpProvider::new("deepseek-chat".into(), "sk-bad".into(), Some(server.uri()))
            .with_timeout(Duration::from_secs(5))
            .unwrap();
        match p.complete(request("hi")).await.unwrap_err() {
            LlmError::RequestFailed(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
