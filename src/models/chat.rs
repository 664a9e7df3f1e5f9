//! 聊天 API 数据模型
//!
//! HTTP 层的请求/响应结构，线上格式统一为 camelCase。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// 会话记录中的单条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TranscriptMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            agent_type: None,
            model_used: None,
            metadata: None,
        }
    }
}

/// 聊天请求
///
/// 字段全部可选，由路由层做缺失检查并返回 400 和缺失字段列表。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub agent: Option<String>,
    pub session: Option<String>,
    #[serde(default)]
    pub multi_agent: bool,
}

/// 聊天响应信封
///
/// Dispatcher 的结果加上请求元数据（时间戳、回显的 agent/session 标签）。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub agent: String,
    pub session: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub sources: u32,
    pub processing_time: u64,
    pub llm_used: bool,
    pub model: String,
    pub multi_agent: bool,
}

/// 保存会话记录请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub messages: Option<Vec<TranscriptMessage>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
