//! 会话记录存储服务
//!
//! 一个目录的追加式 JSON 文件，文件名 `{projectId}_{sessionId}_{epochMillis}.json`
//! 同时充当索引：按 (project, session) 取最新记录时解析文件名内嵌的
//! 毫秒时间戳做数值比较。文件写入后不再修改，删除只能按文件名显式进行。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::models::TranscriptMessage;

use super::types::{
    LoadedTranscript, SavedTranscript, TranscriptRecord, TranscriptSummary, FORMAT_VERSION,
};

/// 存储层错误
///
/// 文件系统和解析错误原样向上传播，不重试、不吞掉。
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("transcript file not found: {0}")]
    NotFound(String),
    #[error("invalid transcript filename: {0}")]
    InvalidFilename(String),
    #[error("transcript storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transcript parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 构造记录文件名
pub(crate) fn transcript_file_name(project_id: &str, session_id: &str, epoch_millis: i64) -> String {
    format!("{}_{}_{}.json", project_id, session_id, epoch_millis)
}

/// 从文件名解析内嵌的毫秒时间戳
pub(crate) fn embedded_timestamp(file_name: &str) -> Option<i64> {
    file_name
        .strip_suffix(".json")?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

/// 会话记录存储服务
pub struct TranscriptStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl TranscriptStore {
    /// 使用指定目录创建存储服务，目录不存在时创建
    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self, TranscriptError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 保存一份会话快照
    ///
    /// 同一毫秒内对同一 (project, session) 的两次保存会命中同一文件名，
    /// 后写者静默覆盖前者。
    pub fn save(
        &self,
        project_id: &str,
        session_id: &str,
        messages: Vec<TranscriptMessage>,
        metadata: Option<serde_json::Value>,
    ) -> Result<SavedTranscript, TranscriptError> {
        if project_id.trim().is_empty() {
            return Err(TranscriptError::MissingField("projectId"));
        }
        if session_id.trim().is_empty() {
            return Err(TranscriptError::MissingField("sessionId"));
        }

        let saved_at = Utc::now();
        let message_count = messages.len();
        let record = TranscriptRecord {
            project_id: project_id.to_string(),
            session_id: session_id.to_string(),
            messages,
            metadata: metadata
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            saved_at,
            version: FORMAT_VERSION.to_string(),
        };

        let filename =
            transcript_file_name(project_id, session_id, saved_at.timestamp_millis());
        let content = serde_json::to_string_pretty(&record)?;
        fs::write(self.base_dir.join(&filename), content)?;

        tracing::info!(
            "[TranscriptStore] 保存会话记录: {} ({} 条消息)",
            filename,
            message_count
        );
        Ok(SavedTranscript {
            filename,
            message_count,
        })
    }

    /// 读取某个 (project, session) 的最新记录
    ///
    /// 在前缀匹配的文件里按文件名内嵌时间戳做数值比较取最新；
    /// 没有匹配文件时返回空结果而非错误。
    pub fn load_latest(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<LoadedTranscript, TranscriptError> {
        let prefix = format!("{}_{}_", project_id, session_id);
        let mut newest: Option<(i64, String)> = None;

        if self.base_dir.exists() {
            for entry in fs::read_dir(&self.base_dir)?.flatten() {
                let name = match entry.file_name().to_str() {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                if !name.starts_with(&prefix) || !name.ends_with(".json") {
                    continue;
                }
                let ts = match embedded_timestamp(&name) {
                    Some(ts) => ts,
                    None => continue,
                };
                let candidate = (ts, name);
                newest = match newest {
                    Some(current) if current >= candidate => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        match newest {
            None => Ok(LoadedTranscript::empty()),
            Some((_, name)) => {
                let content = fs::read_to_string(self.base_dir.join(&name))?;
                let record: TranscriptRecord = serde_json::from_str(&content)?;
                Ok(LoadedTranscript {
                    messages: record.messages,
                    metadata: record.metadata,
                    saved_at: Some(record.saved_at),
                    filename: Some(name),
                })
            }
        }
    }

    /// 枚举目录中的所有记录文件
    ///
    /// 逐个解析文件内容取出 project/session/消息数，按文件系统修改时间
    /// 倒序排列（与文件名内嵌时间戳无关）。
    pub fn list_all(&self) -> Result<Vec<TranscriptSummary>, TranscriptError> {
        let mut chats = Vec::new();

        if !self.base_dir.exists() {
            return Ok(chats);
        }

        for entry in fs::read_dir(&self.base_dir)?.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match entry.file_name().to_str() {
                Some(n) => n.to_string(),
                None => continue,
            };
            // 跳过隐藏文件
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            let record: TranscriptRecord = serde_json::from_str(&content)?;

            let modified_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|t| {
                    t.duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0)
                })
                .unwrap_or(0);

            chats.push(TranscriptSummary {
                filename: name,
                project_id: record.project_id,
                session_id: record.session_id,
                message_count: record.messages.len(),
                saved_at: record.saved_at,
                modified_at,
            });
        }

        chats.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(chats)
    }

    /// 按文件名删除一个记录文件
    ///
    /// 文件不存在时返回 NotFound；不做软删除。
    pub fn delete_by_filename(&self, filename: &str) -> Result<(), TranscriptError> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(TranscriptError::InvalidFilename(filename.to_string()));
        }

        let path = self.base_dir.join(filename);
        if !path.exists() {
            return Err(TranscriptError::NotFound(filename.to_string()));
        }

        fs::remove_file(&path)?;
        tracing::info!("[TranscriptStore] 删除会话记录: {}", filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRole, TranscriptMessage};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TranscriptStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = TranscriptStore::with_base_dir(temp_dir.path().to_path_buf()).unwrap();
        (store, temp_dir)
    }

    fn user_message(content: &str) -> TranscriptMessage {
        TranscriptMessage::new(MessageRole::User, content)
    }

    fn json_file_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .count()
    }

    #[test]
    fn test_save_then_load_latest_roundtrip() {
        let (store, _temp) = create_test_store();
        let messages = vec![
            user_message("hi"),
            TranscriptMessage {
                role: MessageRole::Assistant,
                content: "hello!".to_string(),
                agent_type: Some("archive".to_string()),
                model_used: Some("llama3".to_string()),
                metadata: None,
            },
        ];

        let saved = store
            .save("p1", "s1", messages.clone(), Some(serde_json::json!({"k": "v"})))
            .unwrap();
        assert_eq!(saved.message_count, 2);
        assert!(saved.filename.starts_with("p1_s1_"));
        assert!(saved.filename.ends_with(".json"));

        let loaded = store.load_latest("p1", "s1").unwrap();
        assert_eq!(loaded.messages, messages);
        assert_eq!(loaded.metadata["k"], "v");
        assert_eq!(loaded.filename.as_deref(), Some(saved.filename.as_str()));
        assert!(loaded.saved_at.is_some());
    }

    #[test]
    fn test_second_save_wins() {
        let (store, _temp) = create_test_store();
        store.save("p1", "s1", vec![user_message("first")], None).unwrap();
        // 确保两次保存落在不同毫秒
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("p1", "s1", vec![user_message("second")], None).unwrap();

        let loaded = store.load_latest("p1", "s1").unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "second");
    }

    #[test]
    fn test_load_latest_no_match_is_empty_not_error() {
        let (store, _temp) = create_test_store();
        let loaded = store.load_latest("absent", "none").unwrap();
        assert!(loaded.messages.is_empty());
        assert!(loaded.filename.is_none());
        assert!(loaded.saved_at.is_none());
    }

    #[test]
    fn test_load_latest_only_matches_pair_prefix() {
        let (store, _temp) = create_test_store();
        store.save("p1", "s1", vec![user_message("mine")], None).unwrap();
        store.save("p2", "s1", vec![user_message("other")], None).unwrap();

        let loaded = store.load_latest("p1", "s1").unwrap();
        assert_eq!(loaded.messages[0].content, "mine");
    }

    #[test]
    fn test_list_all_counts_every_json_file() {
        let (store, temp) = create_test_store();
        store.save("p1", "s1", vec![user_message("a")], None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("p1", "s1", vec![user_message("b")], None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("p2", "other", vec![user_message("c")], None).unwrap();

        let chats = store.list_all().unwrap();
        assert_eq!(chats.len(), json_file_count(temp.path()));
        assert_eq!(chats.len(), 3);
        // 按修改时间倒序
        assert!(chats[0].modified_at >= chats[1].modified_at);
        assert!(chats[1].modified_at >= chats[2].modified_at);
    }

    #[test]
    fn test_delete_unknown_is_not_found_and_mutates_nothing() {
        let (store, temp) = create_test_store();
        store.save("p1", "s1", vec![user_message("keep")], None).unwrap();
        let before = json_file_count(temp.path());

        let err = store.delete_by_filename("p9_s9_123456.json").unwrap_err();
        assert!(matches!(err, TranscriptError::NotFound(_)));
        assert_eq!(json_file_count(temp.path()), before);
    }

    #[test]
    fn test_delete_by_filename() {
        let (store, temp) = create_test_store();
        let saved = store.save("p1", "s1", vec![user_message("gone")], None).unwrap();
        assert_eq!(json_file_count(temp.path()), 1);

        store.delete_by_filename(&saved.filename).unwrap();
        assert_eq!(json_file_count(temp.path()), 0);
    }

    #[test]
    fn test_delete_rejects_path_traversal() {
        let (store, _temp) = create_test_store();
        for bad in ["../../etc/passwd", "a/b.json", "a\\b.json"] {
            let err = store.delete_by_filename(bad).unwrap_err();
            assert!(matches!(err, TranscriptError::InvalidFilename(_)));
        }
    }

    #[test]
    fn test_save_requires_identifiers() {
        let (store, _temp) = create_test_store();
        let err = store.save("", "s1", vec![], None).unwrap_err();
        assert!(matches!(err, TranscriptError::MissingField("projectId")));
        let err = store.save("p1", "  ", vec![], None).unwrap_err();
        assert!(matches!(err, TranscriptError::MissingField("sessionId")));
    }

    #[test]
    fn test_embedded_timestamp_parse() {
        assert_eq!(embedded_timestamp("p1_s1_1700000000000.json"), Some(1700000000000));
        assert_eq!(embedded_timestamp("p1_s1_notanumber.json"), None);
        assert_eq!(embedded_timestamp("p1_s1_1700000000000.txt"), None);
    }

    proptest! {
        #[test]
        fn prop_filename_roundtrip(
            project in "[a-z0-9-]{1,12}",
            session in "[a-z0-9-]{1,12}",
            ts in 0i64..=4_102_444_800_000i64,
        ) {
            let name = transcript_file_name(&project, &session, ts);
            prop_assert_eq!(embedded_timestamp(&name), Some(ts));
            prop_assert!(name.starts_with(&format!("{}_{}_", project, session)), "filename prefix mismatch");
        }
    }
}
