// file: src/report/summarizer.rs
// description: Anthropic messages API client for strategy report synthesis
// reference: https://docs.anthropic.com/en/api/messages

use crate::config::ServiceConfig;
use crate::error::{PipelineError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct SummaryClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_url: String,
}

impl SummaryClient {
    pub fn new(config: &ServiceConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_url: config.api_url.clone(),
        }
    }

    pub async fn summarize(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(
            "Requesting synthesis from {} for {} prompt chars",
            self.api_url,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PipelineError::ServiceUnavailable(format!("failed to send request: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PipelineError::ServiceUnavailable(format!(
                "request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            PipelineError::ServiceUnavailable(format!("failed to parse response: {}", e))
        })?;

        let text = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(PipelineError::ServiceUnavailable(
                "no text content returned".to_string(),
            ));
        }

        debug!("Received synthesis of {} chars", text.len());
        Ok(text)
    }
}

/// Replacement body used when synthesis cannot run. The report is still
/// produced; only its fidelity is reduced.
pub fn degraded_notice(reason: &str) -> String {
    format!(
        "AI synthesis unavailable: {}. The data sections above were still \
         collected; configure an API credential and rerun the report stage \
         for a full strategic assessment.",
        reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_degraded_notice_names_reason() {
        let notice = degraded_notice("no API credential configured");
        assert!(notice.contains("AI synthesis unavailable"));
        assert!(notice.contains("no API credential configured"));
    }

    #[test]
    fn test_client_uses_configured_endpoint() {
        let mut config = Config::default_config();
        config.service.api_url = "http://localhost:9/v1/messages".to_string();
        let client = SummaryClient::new(&config.service, "test-key".to_string());
        assert_eq!(client.api_url, "http://localhost:9/v1/messages");
        assert_eq!(client.max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_service_unavailable() {
        let mut config = Config::default_config();
        // Port 9 (discard) is not listening; the send itself fails.
        config.service.api_url = "http://127.0.0.1:9/v1/messages".to_string();
        let client = SummaryClient::new(&config.service, "test-key".to_string());

        let result = client.summarize("prompt").await;
        assert!(matches!(
            result,
            Err(PipelineError::ServiceUnavailable(_))
        ));
    }
}
