//! 通用云端 API Provider
//!
//! OpenAI 兼容的 `/v1/chat/completions` 接口，Bearer 密钥认证。

use std::time::Duration;

use reqwest::Client;

use crate::config::CloudProviderConfig;

use super::{
    completion_messages, first_choice_content, snip_error_body, CompletionRequest,
    CompletionResponse, ProviderError, ProviderReply, MAX_REPLY_TOKENS, TEMPERATURE,
};

/// 云端 API 的合成置信度
pub const CLOUD_CONFIDENCE: f64 = 0.85;

pub struct CloudProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl CloudProvider {
    pub fn new(config: &CloudProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<ProviderReply, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("cloud"));
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: completion_messages(system, user),
            temperature: TEMPERATURE,
            max_tokens: MAX_REPLY_TOKENS,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let (content, model) = first_choice_content(parsed)?;
        Ok(ProviderReply {
            content,
            model: model.unwrap_or_else(|| self.model.clone()),
            confidence: CLOUD_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let provider = CloudProvider::new(&CloudProviderConfig::default());
        let err = provider.chat("sys", "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured("cloud")));
    }
}
