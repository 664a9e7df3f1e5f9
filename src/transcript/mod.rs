//! 会话记录持久化
//!
//! 追加式的本地 JSON 文件存储，一次保存一个文件，文件名即索引。

mod store;
mod types;

pub use store::{TranscriptError, TranscriptStore};
pub use types::{
    LoadedTranscript, SavedTranscript, TranscriptRecord, TranscriptSummary, FORMAT_VERSION,
};
