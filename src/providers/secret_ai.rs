//! 机密计算端点 Provider（Secret AI）
//!
//! 接口与 OpenAI chat-completion 兼容，运行在机密计算环境中，
//! 因此在链内赋予最高的合成置信度。

use std::time::Duration;

use reqwest::Client;

use crate::config::SecretAiProviderConfig;

use super::{
    completion_messages, first_choice_content, snip_error_body, CompletionRequest,
    CompletionResponse, ProviderError, ProviderReply, MAX_REPLY_TOKENS, TEMPERATURE,
};

/// 机密计算端点的合成置信度（链内最高）
pub const SECRET_AI_CONFIDENCE: f64 = 0.92;

pub struct SecretAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl SecretAiProvider {
    pub fn new(config: &SecretAiProviderConfig) -> Self {
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
            return Err(ProviderError::NotConfigured("secret-ai"));
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
            confidence: SECRET_AI_CONFIDENCE,
        })
    }
}
