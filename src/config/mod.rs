//! 配置管理模块
//!
//! 提供 YAML 配置文件加载和环境变量覆盖。
//! 配置在进程启动时构建一次，之后通过 `Arc` 共享，不再修改。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("解析配置文件失败: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
    pub forum: ForumConfig,
}

/// HTTP 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Provider 配置集合
///
/// 调度顺序固定：local -> cloud -> secret_ai，配置只决定各自是否参与。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub local: LocalProviderConfig,
    pub cloud: CloudProviderConfig,
    pub secret_ai: SecretAiProviderConfig,
}

/// 本地模型服务器配置（Ollama 风格接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalProviderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 120,
        }
    }
}

/// 通用云端 API 配置（OpenAI 兼容接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudProviderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for CloudProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
        }
    }
}

/// 机密计算端点配置（Secret AI，OpenAI 兼容接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretAiProviderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for SecretAiProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://secretai.scrtlabs.com".to_string(),
            api_key: String::new(),
            model: "deepseek-r1:70b".to_string(),
            timeout_secs: 120,
        }
    }
}

/// 会话记录存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 存储目录；未设置时使用 ~/.bgin-hub/transcripts
    pub dir: Option<PathBuf>,
}

/// 论坛发布配置（Discourse 接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub api_username: String,
    /// 发帖时的默认分类 ID
    pub default_category: Option<u32>,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            api_key: String::new(),
            api_username: "system".to_string(),
            default_category: None,
        }
    }
}

impl Config {
    /// 从 YAML 文件加载配置
    ///
    /// 文件不存在时返回默认配置（便于零配置启动）。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from("bgin-hub.yaml"),
        };

        if !path.exists() {
            tracing::info!("[CONFIG] 配置文件 {} 不存在，使用默认配置", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        tracing::info!("[CONFIG] 已加载配置文件: {}", path.display());
        Ok(config)
    }

    /// 应用环境变量覆盖
    ///
    /// 只覆盖密钥和地址类字段，优先级高于配置文件。
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BGIN_LOCAL_URL") {
            if !url.is_empty() {
                self.providers.local.base_url = url;
            }
        }
        if let Ok(key) = std::env::var("BGIN_CLOUD_API_KEY") {
            if !key.is_empty() {
                self.providers.cloud.api_key = key;
            }
        }
        if let Ok(key) = std::env::var("BGIN_SECRET_AI_API_KEY") {
            if !key.is_empty() {
                self.providers.secret_ai.api_key = key;
            }
        }
        if let Ok(key) = std::env::var("BGIN_FORUM_API_KEY") {
            if !key.is_empty() {
                self.forum.api_key = key;
            }
        }
    }

    /// 解析会话记录存储目录
    pub fn storage_dir(&self) -> PathBuf {
        match &self.storage.dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".bgin-hub")
                .join("transcripts"),
        }
    }
}
