//! BGIN Multi-Agent Chat Backend
//!
//! 会议助手后端：把聊天消息按固定优先级代理给若干 LLM 后端
//! （本地模型 / 云端 API / 机密计算端点），全部失败时返回固定兜底文案；
//! 会话记录以追加式 JSON 文件持久化在本地目录。

pub mod agents;
pub mod config;
pub mod dispatch;
pub mod forum;
pub mod models;
pub mod providers;
pub mod registry;
pub mod server;
pub mod transcript;
