use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

const HTTP_TIMEOUT_SECS: u64 = 300;

/// A single-shot text completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn send(&self, prompt: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct LlmService {
    inner: Arc<dyn LlmClient>,
}

impl LlmService {
    /// Fails before any request is made when no LLM key is configured.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let key = config.llm_key().cloned().ok_or_else(|| {
            AppError::Config("no LLM API key set (GEMINI_API_KEY or OPENAI_API_KEY)".into())
        })?;
        let client = HttpLlmClient::new(
            key,
            &config.resolved_llm_base_url(),
            config.resolved_llm_model(),
            config.llm_max_tokens,
        )?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    pub fn from_client(client: Arc<dyn LlmClient>) -> Self {
        Self { inner: client }
    }
}

#[async_trait]
impl LlmClient for LlmService {
    async fn send(&self, prompt: &str) -> AppResult<String> {
        self.inner.send(prompt).await
    }
}

/// Client for OpenAI-compatible `chat/completions` endpoints, Gemini included.
pub struct HttpLlmClient {
    http: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl HttpLlmClient {
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: String,
        max_tokens: u32,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("place-categorizer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn send(&self, prompt: &str) -> AppResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!(
                "{status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("response contained no choices".into()))?;
        let content = choice.message.content.unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "llm reply received");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, request};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;

    fn client_for(server: &Server) -> HttpLlmClient {
        HttpLlmClient::new(
            SecretString::from("llm-key".to_string()),
            &server.url("/v1beta/openai/").to_string(),
            "gemini-2.5-flash".into(),
            1024,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn returns_trimmed_message_content() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of!(
                request::method("POST"),
                request::path("/v1beta/openai/chat/completions"),
            ))
            .respond_with(json_encoded(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  {\"1\": \"Hotel\"}\n" } }]
            }))),
        );

        let reply = client_for(&server).send("classify").await.unwrap();
        assert_eq!(reply, "{\"1\": \"Hotel\"}");
    }

    #[tokio::test]
    async fn null_content_is_empty_reply() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path("/v1beta/openai/chat/completions"))
                .respond_with(json_encoded(json!({
                    "choices": [{ "message": { "content": null } }]
                }))),
        );

        assert_eq!(client_for(&server).send("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn auth_failures_are_errors() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path("/v1beta/openai/chat/completions"))
                .respond_with(status_code(401).body("invalid key")),
        );

        let err = client_for(&server).send("x").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(ref msg) if msg.contains("401")));
    }

    #[test]
    fn missing_key_is_fatal() {
        let config = AppConfig::default();
        assert!(matches!(
            LlmService::from_config(&config),
            Err(AppError::Config(_))
        ));
    }
}
