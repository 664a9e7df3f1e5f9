pub mod chat;

pub use chat::{
    ChatReply, ChatRequest, MessageRole, SaveChatRequest, TranscriptMessage,
};
