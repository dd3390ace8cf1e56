//! A client for an OpenAI-compatible chat completion API.
//!
//! Classification and recommendations both send a single user prompt and read
//! back the text of the first choice.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The chat completion endpoint used when none is configured.
pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// The model used when none is configured.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
/// How long to wait for the language model before giving up.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// A bearer-token authenticated chat completion client.
#[derive(Debug, Clone)]
pub struct LanguageModelClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

/// A prompt and the sampling settings to send it with.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The system message that sets the model's role.
    pub system: String,
    /// The user message.
    pub prompt: String,
    /// Sampling temperature, lower values give more deterministic output.
    pub temperature: f32,
    /// The maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Ask the API to constrain the output to a single JSON object.
    pub json_output: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LanguageModelClient {
    /// Create a client that posts to `api_url` with `api_key` as the bearer token.
    ///
    /// # Errors
    /// Returns [Error::LanguageModel] if the HTTP client cannot be built.
    pub fn new(api_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::LanguageModel(format!("could not build HTTP client: {error}")))?;

        Ok(Self {
            http,
            api_url: api_url.to_owned(),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }

    /// Send `request` and return the text of the first choice.
    ///
    /// Each call is attempted exactly once.
    ///
    /// # Errors
    /// Returns [Error::LanguageModel] if the request fails, times out, the API
    /// responds with an error status, or the response has no message content.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, Error> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| Error::LanguageModel(error.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::LanguageModel(format!(
                "API responded with status {status}: {text}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| Error::LanguageModel(format!("invalid response body: {error}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::LanguageModel("response did not contain a message".to_owned()))
    }
}
