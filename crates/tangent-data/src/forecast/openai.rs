//! OpenAI-compatible chat-completions forecaster.

use super::Forecaster;
use crate::error::{DataError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const SYSTEM_PROMPT: &str = "You are a financial analyst. Given a stock ticker, estimate its \
expected annualized return over the next year as a decimal fraction (0.07 means 7%) and a \
confidence level between 0 and 100. Respond with a single JSON object and nothing else, \
exactly of the form {\"expected_return\": 0.07, \"confidence\": 82}.";

/// Forecaster backed by an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiForecaster {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl std::fmt::Debug for OpenAiForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiForecaster")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiForecaster {
    /// Create a forecaster with the given API key and default endpoint/model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
        })
    }

    /// Use a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn user_prompt(ticker: &str) -> String {
        format!("Forecast the outlook for {ticker} over the next year.")
    }

    fn extract_content(response: ChatResponse) -> Result<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| DataError::Forecaster("Empty completion".to_string()))
    }
}

#[async_trait]
impl Forecaster for OpenAiForecaster {
    fn name(&self) -> &str {
        &self.model
    }

    async fn forecast(&self, ticker: &str) -> Result<String> {
        let user_prompt = Self::user_prompt(ticker);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Http(format!("{status}: {body}")));
        }

        let body: ChatResponse = response.json().await?;
        let content = Self::extract_content(body)?;
        tracing::debug!(ticker, model = %self.model, "received forecast completion");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"expected_return\":0.08,\"confidence\":70}"}}]}"#,
        )
        .unwrap();
        let content = OpenAiForecaster::extract_content(body).unwrap();
        assert_eq!(content, r#"{"expected_return":0.08,"confidence":70}"#);
    }

    #[test]
    fn test_empty_completion_is_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            OpenAiForecaster::extract_content(body),
            Err(DataError::Forecaster(_))
        ));

        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(OpenAiForecaster::extract_content(body).is_err());
    }

    #[test]
    fn test_request_shape() {
        let prompt = OpenAiForecaster::user_prompt("AAPL");
        let request = ChatRequest {
            model: "gpt-test",
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][1]["content"], "Forecast the outlook for AAPL over the next year.");
    }

    #[test]
    fn test_builder() {
        let forecaster = OpenAiForecaster::new("key")
            .unwrap()
            .with_base_url("http://localhost:8080/")
            .with_model("local");
        assert_eq!(forecaster.base_url, "http://localhost:8080");
        assert_eq!(forecaster.name(), "local");
    }
}
