//! 本地模型服务器 Provider
//!
//! 对接 Ollama 风格的 `/api/chat` 非流式接口。

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LocalProviderConfig;

use super::{snip_error_body, ProviderError, ProviderReply, MAX_REPLY_TOKENS, TEMPERATURE};

/// 本地模型的合成置信度（链内最低）
pub const LOCAL_CONFIDENCE: f64 = 0.75;

pub struct LocalModelProvider {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl LocalModelProvider {
    pub fn new(config: &LocalProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<ProviderReply, ProviderError> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_REPLY_TOKENS,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: snip_error_body(&body),
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if parsed.message.content.is_empty() {
            return Err(ProviderError::Malformed(
                "local model returned empty content".to_string(),
            ));
        }

        Ok(ProviderReply {
            content: parsed.message.content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            confidence: LOCAL_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = OllamaChatRequest {
            model: "llama3".to_string(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_REPLY_TOKENS,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 1000);
    }

    #[test]
    fn test_response_parse() {
        let parsed: OllamaChatResponse = serde_json::from_value(serde_json::json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "hello"},
            "done": true
        }))
        .unwrap();
        assert_eq!(parsed.message.content, "hello");
        assert_eq!(parsed.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = LocalProviderConfig {
            base_url: "http://127.0.0.1:11434/".to_string(),
            ..Default::default()
        };
        let provider = LocalModelProvider::new(&config);
        assert_eq!(provider.base_url, "http://127.0.0.1:11434");
    }
}
