//! 会话记录存储类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TranscriptMessage;

/// 存储格式版本号，写入每个记录文件
pub const FORMAT_VERSION: &str = "1.0";

/// 持久化的会话记录
///
/// 文件一经写入不再修改；同一 (project, session) 的每次保存都生成新文件。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    pub project_id: String,
    pub session_id: String,
    pub messages: Vec<TranscriptMessage>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// 保存时间（ISO 8601）
    pub saved_at: DateTime<Utc>,
    pub version: String,
}

/// 保存操作的返回信息
#[derive(Debug, Clone)]
pub struct SavedTranscript {
    pub filename: String,
    pub message_count: usize,
}

/// 读取最新记录的结果
///
/// 没有匹配文件时返回空消息列表，不视为错误。
#[derive(Debug, Clone)]
pub struct LoadedTranscript {
    pub messages: Vec<TranscriptMessage>,
    pub metadata: serde_json::Value,
    pub saved_at: Option<DateTime<Utc>>,
    pub filename: Option<String>,
}

impl LoadedTranscript {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            saved_at: None,
            filename: None,
        }
    }
}

/// 列表项（用于枚举全部记录文件）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummary {
    pub filename: String,
    pub project_id: String,
    pub session_id: String,
    pub message_count: usize,
    pub saved_at: DateTime<Utc>,
    /// 文件系统修改时间（Unix 毫秒）
    pub modified_at: i64,
}
