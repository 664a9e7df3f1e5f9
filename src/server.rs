//! HTTP API 服务器
//!
//! 路由层只做三件事：请求字段缺失检查（400 + 缺失字段列表）、调用对应
//! 组件、把组件错误映射到状态码。组件全部通过 `Arc` 共享且不可变，
//! 请求之间没有共享可变状态，无需加锁。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::agents::AgentKind;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::forum::ForumClient;
use crate::models::{ChatReply, ChatRequest, SaveChatRequest};
use crate::registry;
use crate::transcript::{TranscriptError, TranscriptStore};

/// 请求体大小上限，保存较长会话快照时也够用
const BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<TranscriptStore>,
    pub forum: Option<Arc<ForumClient>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, TranscriptError> {
        let store = TranscriptStore::with_base_dir(config.storage_dir())?;
        let dispatcher = Dispatcher::from_config(&config.providers);
        let forum = if config.forum.enabled {
            Some(Arc::new(ForumClient::new(&config.forum)))
        } else {
            None
        };
        Ok(Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            store: Arc::new(store),
            forum,
            start_time: std::time::Instant::now(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/status", get(status))
        .route("/api/chat/save", post(save_chat))
        .route("/api/chat/load/:project_id/:session_id", get(load_chat))
        .route("/api/chat/list", get(list_chats))
        .route("/api/chat/delete/:filename", delete(delete_chat))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/tracks", get(list_tracks))
        .route("/api/forum/publish", post(forum_publish))
        .route("/api/forum/reply", post(forum_reply))
        .route("/api/forum/categories", get(forum_categories))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// 启动服务器，ctrl-c 优雅退出
pub async fn run(config: Config) -> anyhow::Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(config)?;

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

/// 把存储层错误映射到 HTTP 状态码
fn storage_error_response(e: TranscriptError) -> Response {
    let status = match &e {
        TranscriptError::NotFound(_) => StatusCode::NOT_FOUND,
        TranscriptError::MissingField(_) | TranscriptError::InvalidFilename(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": e.to_string()}))).into_response()
}

fn missing_fields_response(missing: Vec<&'static str>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "missing required fields", "missing": missing})),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
    }))
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    // 空字符串按缺失处理
    let mut missing = Vec::new();
    if request.message.as_deref().map_or(true, str::is_empty) {
        missing.push("message");
    }
    if request.agent.as_deref().map_or(true, str::is_empty) {
        missing.push("agent");
    }
    if request.session.as_deref().map_or(true, str::is_empty) {
        missing.push("session");
    }
    if !missing.is_empty() {
        return missing_fields_response(missing);
    }

    let message = request.message.unwrap_or_default();
    let agent_label = request.agent.unwrap_or_default();
    let session = request.session.unwrap_or_default();

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        "[CHAT] request_id={} agent={} session={} multi_agent={}",
        request_id,
        agent_label,
        session,
        request.multi_agent
    );

    let agent = AgentKind::resolve(&agent_label, request.multi_agent);
    let reply = state.dispatcher.dispatch(&message, agent, &session).await;

    Json(ChatReply {
        content: reply.content,
        agent: agent_label,
        session,
        timestamp: Utc::now(),
        confidence: reply.confidence,
        sources: reply.sources,
        processing_time: reply.processing_time_ms,
        llm_used: reply.llm_used,
        model: reply.model,
        multi_agent: request.multi_agent,
    })
    .into_response()
}

/// 静态能力标志，不做存活探测
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let providers = &state.config.providers;
    Json(json!({
        "success": true,
        "providers": {
            "local": {
                "enabled": providers.local.enabled,
                "configured": true,
                "model": providers.local.model,
                "baseUrl": providers.local.base_url,
            },
            "cloud": {
                "enabled": providers.cloud.enabled,
                "configured": !providers.cloud.api_key.is_empty(),
                "model": providers.cloud.model,
            },
            "secretAi": {
                "enabled": providers.secret_ai.enabled,
                "configured": !providers.secret_ai.api_key.is_empty(),
                "model": providers.secret_ai.model,
            },
        },
        "chain": state.dispatcher.chain_names(),
        "fallback": {"enabled": true},
        "forum": {"enabled": state.forum.is_some()},
    }))
}

async fn save_chat(
    State(state): State<AppState>,
    Json(request): Json<SaveChatRequest>,
) -> Response {
    let mut missing = Vec::new();
    if request.project_id.as_deref().map_or(true, str::is_empty) {
        missing.push("projectId");
    }
    if request.session_id.as_deref().map_or(true, str::is_empty) {
        missing.push("sessionId");
    }
    if request.messages.is_none() {
        missing.push("messages");
    }
    if !missing.is_empty() {
        return missing_fields_response(missing);
    }

    let project_id = request.project_id.unwrap_or_default();
    let session_id = request.session_id.unwrap_or_default();
    let messages = request.messages.unwrap_or_default();

    match state
        .store
        .save(&project_id, &session_id, messages, request.metadata)
    {
        Ok(saved) => Json(json!({
            "success": true,
            "filename": saved.filename,
            "messageCount": saved.message_count,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("[CHAT] 保存会话记录失败: {}", e);
            storage_error_response(e)
        }
    }
}

async fn load_chat(
    State(state): State<AppState>,
    Path((project_id, session_id)): Path<(String, String)>,
) -> Response {
    match state.store.load_latest(&project_id, &session_id) {
        Ok(loaded) => Json(json!({
            "success": true,
            "messages": loaded.messages,
            "metadata": loaded.metadata,
            "savedAt": loaded.saved_at,
            "filename": loaded.filename,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("[CHAT] 读取会话记录失败: {}", e);
            storage_error_response(e)
        }
    }
}

async fn list_chats(State(state): State<AppState>) -> Response {
    match state.store.list_all() {
        Ok(chats) => {
            let total = chats.len();
            Json(json!({"success": true, "chats": chats, "total": total})).into_response()
        }
        Err(e) => {
            tracing::error!("[CHAT] 枚举会话记录失败: {}", e);
            storage_error_response(e)
        }
    }
}

async fn delete_chat(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    match state.store.delete_by_filename(&filename) {
        Ok(()) => Json(json!({
            "success": true,
            "message": "chat file deleted",
            "filename": filename,
        }))
        .into_response(),
        Err(e) => storage_error_response(e),
    }
}

async fn list_sessions() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "sessions": registry::SESSIONS,
        "total": registry::SESSIONS.len(),
    }))
}

async fn get_session(Path(id): Path<String>) -> Response {
    match registry::find_session(&id) {
        Some(session) => Json(json!({"success": true, "session": session})).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("session '{}' not found", id)})),
        )
            .into_response(),
    }
}

async fn list_tracks() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "tracks": registry::TRACKS,
        "total": registry::TRACKS.len(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForumPublishRequest {
    title: Option<String>,
    content: Option<String>,
    category: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForumReplyRequest {
    topic_id: Option<u64>,
    content: Option<String>,
}

fn forum_unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "forum publishing is not configured"})),
    )
        .into_response()
}

fn forum_error_response(e: crate::forum::ForumError) -> Response {
    tracing::error!("[FORUM] 调用失败: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
        .into_response()
}

async fn forum_publish(
    State(state): State<AppState>,
    Json(request): Json<ForumPublishRequest>,
) -> Response {
    let mut missing = Vec::new();
    if request.title.as_deref().map_or(true, str::is_empty) {
        missing.push("title");
    }
    if request.content.as_deref().map_or(true, str::is_empty) {
        missing.push("content");
    }
    if !missing.is_empty() {
        return missing_fields_response(missing);
    }

    let Some(forum) = state.forum.as_ref() else {
        return forum_unavailable();
    };

    let title = request.title.unwrap_or_default();
    let content = request.content.unwrap_or_default();
    match forum.create_topic(&title, &content, request.category).await {
        Ok(post) => Json(json!({"success": true, "post": post})).into_response(),
        Err(e) => forum_error_response(e),
    }
}

async fn forum_reply(
    State(state): State<AppState>,
    Json(request): Json<ForumReplyRequest>,
) -> Response {
    let mut missing = Vec::new();
    if request.topic_id.is_none() {
        missing.push("topicId");
    }
    if request.content.as_deref().map_or(true, str::is_empty) {
        missing.push("content");
    }
    if !missing.is_empty() {
        return missing_fields_response(missing);
    }

    let Some(forum) = state.forum.as_ref() else {
        return forum_unavailable();
    };

    let topic_id = request.topic_id.unwrap_or_default();
    let content = request.content.unwrap_or_default();
    match forum.reply_to_topic(topic_id, &content).await {
        Ok(post) => Json(json!({"success": true, "post": post})).into_response(),
        Err(e) => forum_error_response(e),
    }
}

async fn forum_categories(State(state): State<AppState>) -> Response {
    let Some(forum) = state.forum.as_ref() else {
        return forum_unavailable();
    };
    match forum.list_categories().await {
        Ok(categories) => {
            Json(json!({"success": true, "categories": categories})).into_response()
        }
        Err(e) => forum_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LocalProviderConfig};
    use crate::providers::{LocalModelProvider, ProviderHandle};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// 构建测试状态：临时存储目录 + 禁用全部 provider（空链，立即兜底）
    fn test_state(temp: &TempDir) -> AppState {
        let mut config = Config::default();
        config.storage.dir = Some(temp.path().to_path_buf());
        config.providers.local.enabled = false;
        config.providers.cloud.enabled = false;
        config.providers.secret_ai.enabled = false;
        AppState::new(config).unwrap()
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_chat_missing_fields_is_400_with_list() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) =
            send(app, Method::POST, "/api/chat", Some(serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let missing: Vec<&str> = body["missing"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(missing, vec!["message", "agent", "session"]);
    }

    #[tokio::test]
    async fn test_chat_degrades_to_fallback_when_no_provider_reachable() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(
            app,
            Method::POST,
            "/api/chat",
            Some(serde_json::json!({
                "message": "test",
                "agent": "archive",
                "session": "general",
                "multiAgent": false
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["content"].as_str().unwrap().contains("Fallback Mode"));
        assert_eq!(body["llmUsed"], false);
        assert_eq!(body["model"], "fallback");
        assert_eq!(body["agent"], "archive");
        assert_eq!(body["session"], "general");
        assert_eq!(body["sources"], 0);
    }

    #[tokio::test]
    async fn test_chat_fallback_with_failing_provider() {
        // provider 桩返回 500：扫描一遍后落到兜底文案
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = Router::new().fallback(|| async {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom")
        });
        tokio::spawn(async move {
            axum::serve(listener, stub).await.unwrap();
        });

        let temp = TempDir::new().unwrap();
        let mut state = test_state(&temp);
        state.dispatcher = Arc::new(Dispatcher::new(vec![ProviderHandle::Local(
            LocalModelProvider::new(&LocalProviderConfig {
                base_url: format!("http://{}", addr),
                timeout_secs: 5,
                ..Default::default()
            }),
        )]));

        let (status, body) = send(
            router(state),
            Method::POST,
            "/api/chat",
            Some(serde_json::json!({
                "message": "test",
                "agent": "codex",
                "session": "general"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["content"].as_str().unwrap().contains("Fallback Mode"));
        assert_eq!(body["llmUsed"], false);
    }

    #[tokio::test]
    async fn test_chat_multi_agent_fallback_variant() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (_, body) = send(
            app,
            Method::POST,
            "/api/chat",
            Some(serde_json::json!({
                "message": "test",
                "agent": "archive",
                "session": "general",
                "multiAgent": true
            })),
        )
        .await;
        assert_eq!(
            body["content"],
            crate::agents::AgentKind::Multi.fallback_reply()
        );
        assert_eq!(body["multiAgent"], true);
    }

    #[tokio::test]
    async fn test_save_then_load_end_to_end() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);

        let (status, body) = send(
            router(state.clone()),
            Method::POST,
            "/api/chat/save",
            Some(serde_json::json!({
                "projectId": "p1",
                "sessionId": "s1",
                "messages": [{"role": "user", "content": "hi"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["messageCount"], 1);
        let filename = body["filename"].as_str().unwrap();
        assert!(filename.starts_with("p1_s1_"));
        assert!(filename.ends_with(".json"));

        let (status, body) = send(
            router(state),
            Method::GET,
            "/api/chat/load/p1/s1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["filename"], filename);
    }

    #[tokio::test]
    async fn test_save_missing_fields_is_400_with_list() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(
            app,
            Method::POST,
            "/api/chat/save",
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let missing: Vec<&str> = body["missing"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(missing, vec!["projectId", "sessionId", "messages"]);
    }

    #[tokio::test]
    async fn test_load_without_saves_is_empty_success() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(app, Method::GET, "/api/chat/load/none/none", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);
        assert_eq!(body["filename"], Value::Null);
    }

    #[tokio::test]
    async fn test_list_reports_total() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        for (project, content) in [("p1", "a"), ("p2", "b")] {
            let (status, _) = send(
                router(state.clone()),
                Method::POST,
                "/api/chat/save",
                Some(serde_json::json!({
                    "projectId": project,
                    "sessionId": "s",
                    "messages": [{"role": "user", "content": content}]
                })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(router(state), Method::GET, "/api/chat/list", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["chats"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_404() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(
            app,
            Method::DELETE,
            "/api/chat/delete/p9_s9_123.json",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_then_gone() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (_, body) = send(
            router(state.clone()),
            Method::POST,
            "/api/chat/save",
            Some(serde_json::json!({
                "projectId": "p1",
                "sessionId": "s1",
                "messages": []
            })),
        )
        .await;
        let filename = body["filename"].as_str().unwrap().to_string();

        let (status, body) = send(
            router(state.clone()),
            Method::DELETE,
            &format!("/api/chat/delete/{}", filename),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["filename"], filename.as_str());

        let (status, _) = send(
            router(state),
            Method::DELETE,
            &format!("/api/chat/delete/{}", filename),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_reports_static_flags() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["providers"]["local"]["enabled"], false);
        assert_eq!(body["providers"]["cloud"]["configured"], false);
        assert_eq!(body["fallback"]["enabled"], true);
        assert_eq!(body["chain"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_session_registry_routes() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);

        let (status, body) = send(router(state.clone()), Method::GET, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["total"].as_u64().unwrap() as usize,
            registry::SESSIONS.len()
        );

        let (status, body) = send(
            router(state.clone()),
            Method::GET,
            "/api/sessions/opening-plenary",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["track"], "general");

        let (status, _) = send(
            router(state),
            Method::GET,
            "/api/sessions/no-such-session",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_forum_unconfigured_is_500() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(
            app,
            Method::POST,
            "/api/forum/publish",
            Some(serde_json::json!({"title": "t", "content": "c"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDir::new().unwrap();
        let app = router(test_state(&temp));
        let (status, body) = send(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
