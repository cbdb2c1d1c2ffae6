use super::types::{ChatRequest, ChatResponse, Message};
use super::{Provider, build_provider_client};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

/// Default chat-completions host.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const MISSING_API_KEY_MESSAGE: &str =
    "OpenAI API key not set. Pass one to OpenAiCompatProvider::new.";
const MAX_API_ERROR_CHARS: usize = 200;

/// Chat-completions client for OpenAI and OpenAI-compatible hosts.
///
/// The API key is threaded in explicitly; this crate never reads the
/// process environment.
pub struct OpenAiCompatProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    base_url: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: Option<&str>) -> Self {
        Self::with_base_url(api_key, OPENAI_BASE_URL)
    }

    /// Point at any OpenAI-compatible host (proxies, local servers).
    pub fn with_base_url(api_key: Option<&str>, base_url: impl Into<String>) -> Self {
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_provider_client(),
        }
    }

    fn build_request(
        system_prompt: &str,
        prompt: &str,
        model: &str,
        temperature: f64,
    ) -> ChatRequest {
        let capacity = if system_prompt.is_empty() { 1 } else { 2 };
        let mut messages = Vec::with_capacity(capacity);

        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system",
                content: system_prompt.to_string(),
            });
        }

        messages.push(Message {
            role: "user",
            content: prompt.to_string(),
        });

        ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        }
    }

    async fn call_api(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let auth_header = self
            .cached_auth_header
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{MISSING_API_KEY_MESSAGE}"))?;

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth_header)
            .json(request)
            .send()
            .await
            .map_err(|error| anyhow::anyhow!("OpenAI request failed: {error}"))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|error| anyhow::anyhow!("OpenAI response JSON decode failed: {error}"))
    }
}

/// Surface a non-2xx response as an error with status and truncated body.
/// The truncation keeps oversized HTML error pages out of retry feedback.
async fn api_error(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let trimmed: String = body.chars().take(MAX_API_ERROR_CHARS).collect();
    anyhow::anyhow!("OpenAI API error ({status}): {trimmed}")
}

impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        prompt: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(system_prompt, prompt, model, temperature);
            let chat_response = self.call_api(&request).await?;
            chat_response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "prompt"},
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"answer\": \"Paris\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_base_url(Some("test-key"), server.uri());
        let text = provider
            .generate("sys", "prompt", "gpt-4o-mini", 0.7)
            .await
            .unwrap();
        assert_eq!(text, "{\"answer\": \"Paris\"}");
    }

    #[test]
    fn system_message_omitted_when_empty() {
        let request = OpenAiCompatProvider::build_request("", "prompt", "m", 0.0);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[tokio::test]
    async fn api_error_carries_status_and_truncated_body() {
        let server = MockServer::start().await;
        let long_body = "x".repeat(1000);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(long_body))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_base_url(Some("test-key"), server.uri());
        let err = provider
            .generate("", "prompt", "m", 0.0)
            .await
            .expect_err("429 should fail");
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.len() < 300);
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_a_request() {
        let provider = OpenAiCompatProvider::with_base_url(None, "http://127.0.0.1:9");
        let err = provider
            .generate("", "prompt", "m", 0.0)
            .await
            .expect_err("no key configured");
        assert!(err.to_string().contains("API key not set"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_base_url(Some("test-key"), server.uri());
        let err = provider
            .generate("", "prompt", "m", 0.0)
            .await
            .expect_err("no choices");
        assert!(err.to_string().contains("No response"));
    }
}
