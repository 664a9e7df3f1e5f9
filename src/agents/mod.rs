//! Agent 标签注册表
//!
//! agent 标签只是 prompt 模板和兜底回复的选择器，不对应独立进程。
//! 标签集合封闭：archive / codex / discourse，外加多 agent 通用变体。

use serde::{Deserialize, Serialize};

/// 兜底回复的固定置信度
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// 兜底回复的模型标识
pub const FALLBACK_MODEL: &str = "fallback";

/// Agent 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Archive,
    Codex,
    Discourse,
    Multi,
}

impl AgentKind {
    /// 从请求标签解析 agent 类别
    ///
    /// `multi_agent` 为 true 时强制使用通用多 agent 变体，忽略标签。
    /// 未知标签同样落到多 agent 变体。
    pub fn resolve(label: &str, multi_agent: bool) -> Self {
        if multi_agent {
            return Self::Multi;
        }
        match label.trim().to_lowercase().as_str() {
            "archive" => Self::Archive,
            "codex" => Self::Codex,
            "discourse" => Self::Discourse,
            _ => Self::Multi,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Codex => "codex",
            Self::Discourse => "discourse",
            Self::Multi => "multi",
        }
    }

    /// 构建系统提示词
    ///
    /// 纯函数：固定模板拼接会话标签，不依赖任何外部状态。
    pub fn system_prompt(&self, session: &str) -> String {
        let template = match self {
            Self::Archive => {
                "You are the BGIN Archive agent. You help conference participants find, \
                 summarise and cross-reference BGIN working group documents, meeting notes \
                 and published reports. Answer concisely and cite document titles when you \
                 can."
            }
            Self::Codex => {
                "You are the BGIN Codex agent. You answer questions about blockchain \
                 governance standards, terminology and the BGIN governance codex. Prefer \
                 precise definitions over speculation."
            }
            Self::Discourse => {
                "You are the BGIN Discourse agent. You summarise and continue discussions \
                 from the BGIN community forum, and help participants draft posts and \
                 replies in a constructive tone."
            }
            Self::Multi => {
                "You are the BGIN multi-agent assistant. Coordinate the perspectives of the \
                 archive, codex and discourse agents to give a balanced answer for \
                 conference participants."
            }
        };
        format!("{} Current session: {}.", template, session)
    }

    /// 兜底回复
    ///
    /// Provider 链全部失败时返回的固定文案，按 agent 类别区分。
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            Self::Archive => {
                "[Archive Agent - Fallback Mode] The archive backends are currently \
                 unreachable. You can browse BGIN working group documents directly in the \
                 document archive, or retry in a moment once a model server is available."
            }
            Self::Codex => {
                "[Codex Agent - Fallback Mode] The codex backends are currently \
                 unreachable. Governance codex entries and standard definitions are still \
                 available in the published BGIN reports; please retry shortly."
            }
            Self::Discourse => {
                "[Discourse Agent - Fallback Mode] The discourse backends are currently \
                 unreachable. Recent forum threads can be read directly on the BGIN forum; \
                 drafting assistance will resume once a model server is available."
            }
            Self::Multi => {
                "[Multi-Agent - Fallback Mode] No model backend is currently reachable, so \
                 agent coordination is paused. Please retry in a moment; single-agent \
                 answers will resume as soon as one backend recovers."
            }
        }
    }
}
