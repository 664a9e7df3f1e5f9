//! Provider 模块
//!
//! 每个 provider 一个适配器，负责把各自的原始响应归一化为 [`ProviderReply`]。
//! Provider 集合封闭（local / cloud / secret_ai），通过 [`ProviderHandle`]
//! 枚举分发，不使用开放式 trait 对象。

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cloud;
pub mod local;
pub mod secret_ai;

pub use cloud::CloudProvider;
pub use local::LocalModelProvider;
pub use secret_ai::SecretAiProvider;

/// 固定采样温度
pub const TEMPERATURE: f32 = 0.7;

/// 回复长度上限（token）
pub const MAX_REPLY_TOKENS: u32 = 1000;

/// 上游错误正文在日志和错误信息中保留的最大字符数
const ERROR_BODY_MAX_CHARS: usize = 300;

/// 安全截断字符串到指定字符数，避免 UTF-8 边界问题
pub(crate) fn safe_truncate(s: &str, max_chars: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_chars {
        s.to_string()
    } else {
        chars[..max_chars].iter().collect()
    }
}

/// 截断上游错误正文
pub(crate) fn snip_error_body(body: &str) -> String {
    safe_truncate(body, ERROR_BODY_MAX_CHARS)
}

/// Provider 调用错误
///
/// 任何失败（网络、非 2xx、畸形响应、缺少密钥）在 Dispatcher 层都等价于
/// "尝试下一个 provider"。
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("provider {0} is not configured")]
    NotConfigured(&'static str),
}

/// 单次 provider 调用的归一化结果
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub content: String,
    pub model: String,
    /// 各 provider 的固定置信度常量，上游并不提供该字段
    pub confidence: f64,
}

/// 封闭的 provider 集合
pub enum ProviderHandle {
    Local(LocalModelProvider),
    Cloud(CloudProvider),
    SecretAi(SecretAiProvider),
}

impl ProviderHandle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Cloud(_) => "cloud",
            Self::SecretAi(_) => "secret-ai",
        }
    }

    /// 发送一次 system + user 消息，返回归一化结果
    pub async fn chat(&self, system: &str, user: &str) -> Result<ProviderReply, ProviderError> {
        match self {
            Self::Local(p) => p.chat(system, user).await,
            Self::Cloud(p) => p.chat(system, user).await,
            Self::SecretAi(p) => p.chat(system, user).await,
        }
    }
}

// ============================================================================
// OpenAI 兼容的 chat-completion 数据模型（cloud 与 secret_ai 共用）
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionRequest {
    pub model: String,
    pub messages: Vec<CompletionMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

pub(crate) fn completion_messages(system: &str, user: &str) -> Vec<CompletionMessage> {
    vec![
        CompletionMessage {
            role: "system".to_string(),
            content: system.to_string(),
        },
        CompletionMessage {
            role: "user".to_string(),
            content: user.to_string(),
        },
    ]
}

/// 从 OpenAI 兼容响应中取出首条回复文本
pub(crate) fn first_choice_content(response: CompletionResponse) -> Result<(String, Option<String>), ProviderError> {
    let model = response.model.clone();
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("response contained no choices".to_string()))?;
    Ok((content, model))
}
