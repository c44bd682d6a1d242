//! OpenAI Chat Completions API provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    providers::CompletionProvider,
    types::{Completion, CompletionRequest, Turn, Usage},
};

/// Default endpoint for the hosted OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Point the provider at an OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request<'a>(&self, request: &'a CompletionRequest) -> OpenAIRequest<'a> {
        OpenAIRequest {
            model: &request.model,
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(Error::RateLimited { retry_after });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidApiKey);
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }

        let parsed: OpenAIResponse = serde_json::from_str(&text)?;
        let completion = into_completion(parsed)?;
        tracing::debug!(
            model = %completion.model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            "completion received"
        );
        Ok(completion)
    }
}

fn parse_error_body(status: u16, body: &str) -> Error {
    match serde_json::from_str::<OpenAIErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.code.as_deref() == Some("context_length_exceeded") => {
            Error::ContextLengthExceeded(envelope.error.message)
        }
        Ok(envelope) => Error::api(
            envelope
                .error
                .error_type
                .unwrap_or_else(|| status.to_string()),
            envelope.error.message,
        ),
        Err(_) => {
            let error_type = if status >= 500 { "server_error" } else { "http_error" };
            Error::api(error_type, format!("HTTP {}: {}", status, body))
        }
    }
}

fn into_completion(response: OpenAIResponse) -> Result<Completion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedResponse("response contained no choices".into()))?;

    let usage = response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage,
    })
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Turn> for OpenAIMessage<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: &turn.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_build_request_maps_roles() {
        let provider = OpenAIProvider::new("sk-test");
        let request = CompletionRequest::new(
            "gpt-4",
            vec![
                Turn::system("be brief"),
                Turn::user("add stargate"),
                Turn::assistant("[CMDRET~movie_lookup~Stargate~id]"),
            ],
        );

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][2]["content"], "[CMDRET~movie_lookup~Stargate~id]");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_build_request_sends_max_tokens_when_set() {
        let provider = OpenAIProvider::new("sk-test");
        let request = CompletionRequest::new("gpt-4", vec![Turn::user("hi")]).with_max_tokens(5);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["max_tokens"], 5);
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let provider = OpenAIProvider::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_into_completion_takes_first_choice() {
        let raw = r#"{
            "model": "gpt-4-0613",
            "choices": [
                {"message": {"role": "assistant", "content": "Hello!"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let completion = into_completion(parsed).unwrap();
        assert_eq!(completion.text, "Hello!");
        assert_eq!(completion.model, "gpt-4-0613");
        assert_eq!(completion.usage.total(), 15);
    }

    #[test]
    fn test_into_completion_no_choices() {
        let parsed: OpenAIResponse =
            serde_json::from_str(r#"{"model": "gpt-4", "choices": []}"#).unwrap();
        let err = into_completion(parsed).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[test]
    fn test_parse_error_body_envelope() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "rate_limit_exceeded"}}"#;
        let err = parse_error_body(400, body);
        match &err {
            Error::Api { error_type, message } => {
                assert_eq!(error_type, "rate_limit_exceeded");
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_error_body_context_length() {
        let body = r#"{"error": {"message": "This model's maximum context length is 4097 tokens", "type": "invalid_request_error", "code": "context_length_exceeded"}}"#;
        let err = parse_error_body(400, body);
        assert!(matches!(err, Error::ContextLengthExceeded(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_error_body_plain_text_server_error() {
        let err = parse_error_body(503, "upstream unavailable");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
