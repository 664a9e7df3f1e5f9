//! 论坛发布客户端
//!
//! 对接 Discourse 风格的 API：建主题、回帖、列分类。
//! 论坛是外部协作方，这里没有降级链路：任何失败都带着底层错误信息
//! 原样上抛，由路由层转成 500。

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ForumConfig;

const FORUM_TIMEOUT_SECS: u64 = 30;

/// 论坛调用错误
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("forum network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("forum returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("forum payload malformed: {0}")]
    Malformed(String),
}

/// 发帖结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    pub id: u64,
    pub topic_id: u64,
    #[serde(default)]
    pub topic_slug: Option<String>,
}

/// 论坛分类
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumCategory {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTopicRequest<'a> {
    title: &'a str,
    raw: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    topic_id: u64,
    raw: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: u64,
    topic_id: u64,
    #[serde(default)]
    topic_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    category_list: CategoryList,
}

#[derive(Debug, Deserialize)]
struct CategoryList {
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    id: u64,
    name: String,
    #[serde(default)]
    slug: Option<String>,
}

pub struct ForumClient {
    base_url: String,
    api_key: String,
    api_username: String,
    default_category: Option<u32>,
    client: Client,
}

impl ForumClient {
    pub fn new(config: &ForumConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_username: config.api_username.clone(),
            default_category: config.default_category,
            client: Client::builder()
                .timeout(Duration::from_secs(FORUM_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .header("Api-Username", &self.api_username)
    }

    /// 创建新主题
    pub async fn create_topic(
        &self,
        title: &str,
        raw: &str,
        category: Option<u32>,
    ) -> Result<ForumPost, ForumError> {
        let payload = CreateTopicRequest {
            title,
            raw,
            category: category.or(self.default_category),
        };
        let response = self
            .request(reqwest::Method::POST, "/posts.json")
            .json(&payload)
            .send()
            .await?;
        let post: RawPost = Self::parse(response).await?;
        tracing::info!(
            "[FORUM] 创建主题成功: topic_id={} post_id={}",
            post.topic_id,
            post.id
        );
        Ok(ForumPost {
            id: post.id,
            topic_id: post.topic_id,
            topic_slug: post.topic_slug,
        })
    }

    /// 在已有主题下回帖
    pub async fn reply_to_topic(&self, topic_id: u64, raw: &str) -> Result<ForumPost, ForumError> {
        let payload = ReplyRequest { topic_id, raw };
        let response = self
            .request(reqwest::Method::POST, "/posts.json")
            .json(&payload)
            .send()
            .await?;
        let post: RawPost = Self::parse(response).await?;
        Ok(ForumPost {
            id: post.id,
            topic_id: post.topic_id,
            topic_slug: post.topic_slug,
        })
    }

    /// 列出论坛分类
    pub async fn list_categories(&self) -> Result<Vec<ForumCategory>, ForumError> {
        let response = self
            .request(reqwest::Method::GET, "/categories.json")
            .send()
            .await?;
        let envelope: CategoriesEnvelope = Self::parse(response).await?;
        Ok(envelope
            .category_list
            .categories
            .into_iter()
            .map(|c| ForumCategory {
                id: c.id,
                name: c.name,
                slug: c.slug,
            })
            .collect())
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ForumError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForumError::Status {
                status: status.as_u16(),
                body: crate::providers::safe_truncate(&body, 300),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ForumError::Malformed(e.to_string()))
    }
}
