//! Provider 链调度器
//!
//! 按固定优先级（local -> cloud -> secret_ai）线性扫描 provider 列表，
//! 第一个成功的结果直接返回；全部失败时落到按 agent 区分的兜底文案。
//! 每个 provider 只尝试一次，不重试、不并发竞速、不做结果聚合。
//!
//! 调度器自身不持有可变状态，可以放在 `Arc` 里被并发请求共享。

use std::time::Instant;

use rand::Rng;

use crate::agents::{AgentKind, FALLBACK_CONFIDENCE, FALLBACK_MODEL};
use crate::config::ProvidersConfig;
use crate::providers::{
    CloudProvider, LocalModelProvider, ProviderHandle, SecretAiProvider,
};

/// 一次调度的最终结果
///
/// provider 成功时原样转发其归一化结果；兜底路径完全确定（固定文案、
/// 固定置信度、sources 为 0）。
#[derive(Debug, Clone)]
pub struct DispatchReply {
    pub content: String,
    pub confidence: f64,
    /// 装饰性字段：成功路径上取 2..=6 的伪随机数，并非真实引用计数
    pub sources: u32,
    pub processing_time_ms: u64,
    pub llm_used: bool,
    pub model: String,
}

pub struct Dispatcher {
    chain: Vec<ProviderHandle>,
}

impl Dispatcher {
    /// 用显式的 provider 列表构建调度器（顺序即优先级）
    pub fn new(chain: Vec<ProviderHandle>) -> Self {
        Self { chain }
    }

    /// 从配置构建调度器，只纳入启用的 provider
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut chain = Vec::new();
        if config.local.enabled {
            chain.push(ProviderHandle::Local(LocalModelProvider::new(&config.local)));
        }
        if config.cloud.enabled {
            chain.push(ProviderHandle::Cloud(CloudProvider::new(&config.cloud)));
        }
        if config.secret_ai.enabled {
            chain.push(ProviderHandle::SecretAi(SecretAiProvider::new(
                &config.secret_ai,
            )));
        }

        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        tracing::info!("[DISPATCH] provider 链: {:?}", names);
        Self { chain }
    }

    pub fn chain_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    /// 调度一条用户消息
    ///
    /// 对链做一次线性扫描；单个 provider 的任何错误都只记日志并继续。
    /// 链耗尽后返回 agent 对应的兜底回复，该路径不会失败。
    pub async fn dispatch(&self, message: &str, agent: AgentKind, session: &str) -> DispatchReply {
        let started = Instant::now();
        let system_prompt = agent.system_prompt(session);

        for provider in &self.chain {
            match provider.chat(&system_prompt, message).await {
                Ok(reply) => {
                    let elapsed = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        "[DISPATCH] provider={} model={} agent={} elapsed_ms={}",
                        provider.name(),
                        reply.model,
                        agent.label(),
                        elapsed
                    );
                    return DispatchReply {
                        content: reply.content,
                        confidence: reply.confidence,
                        sources: rand::thread_rng().gen_range(2..=6),
                        processing_time_ms: elapsed,
                        llm_used: true,
                        model: reply.model,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "[DISPATCH] provider={} 调用失败，尝试下一个: {}",
                        provider.name(),
                        e
                    );
                }
            }
        }

        let elapsed = started.elapsed().as_millis() as u64;
        tracing::info!(
            "[DISPATCH] provider 链耗尽，agent={} 使用兜底回复",
            agent.label()
        );
        DispatchReply {
            content: agent.fallback_reply().to_string(),
            confidence: FALLBACK_CONFIDENCE,
            sources: 0,
            processing_time_ms: elapsed,
            llm_used: false,
            model: FALLBACK_MODEL.to_string(),
        }
    }
}
