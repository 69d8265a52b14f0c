//! Ollama 推理客户端模块
//! 封装对本地生成服务的调用：流式/整包响应拼装、超时、重试与降级模型

use crate::config::{ModelConfig, RetryPolicy};
use crate::services::extractor::preview;
use futures::StreamExt;
use log::{debug, error, warn};
use serde_json::{json, Value};
use std::future::Future;

/// 模型调用抽象，测试里用脚本化假实现替换
pub trait ModelRunner: Send + Sync {
    /// 跑一次提示词，拿不到文本返回 None，从不向调用方抛错
    fn run(&self, model: &str, prompt: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Ollama HTTP 客户端
pub struct OllamaClient {
    http: reqwest::Client,
    api_url: String,
    policy: RetryPolicy,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            policy: RetryPolicy::default().with_fallback(&config.fallback_model),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 按策略调用：同模型最多 max_attempts 次，之后对降级模型再试一次
    pub async fn run_with(
        &self,
        model: &str,
        prompt: &str,
        policy: &RetryPolicy,
    ) -> Option<String> {
        debug!(
            "Calling Ollama model={}, prompt length={}",
            model,
            prompt.len()
        );
        for attempt in 1..=policy.max_attempts {
            match self.request_once(model, prompt, policy).await {
                Ok(text) => {
                    debug!("Ollama raw output preview: {}...", preview(&text, 200));
                    return Some(text);
                }
                Err(e) => error!(
                    "Ollama API call failed for model {} (attempt {}): {}",
                    model, attempt, e
                ),
            }
        }

        if let Some(fallback) = policy.fallback_model.as_deref() {
            if fallback != model {
                warn!("Falling back to {}", fallback);
                match self.request_once(fallback, prompt, policy).await {
                    Ok(text) => return Some(text),
                    Err(e) => error!("Ollama API call failed for fallback model {}: {}", fallback, e),
                }
            }
        }
        None
    }

    async fn request_once(
        &self,
        model: &str,
        prompt: &str,
        policy: &RetryPolicy,
    ) -> anyhow::Result<String> {
        let body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .http
            .post(&self.api_url)
            .timeout(policy.timeout)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut raw = String::new();
        while let Some(chunk) = stream.next().await {
            raw.push_str(&String::from_utf8_lossy(&chunk?));
        }

        let text = assemble_response_text(&raw);
        if text.trim().is_empty() {
            anyhow::bail!("empty response body");
        }
        Ok(text)
    }
}

impl ModelRunner for OllamaClient {
    fn run(&self, model: &str, prompt: &str) -> impl Future<Output = Option<String>> + Send {
        async move { self.run_with(model, prompt, &self.policy).await }
    }
}

/// 响应体拼装：整包 JSON 直接取 response 字段；按行流式响应把各行的
/// response 片段按序连接；两者都不成立时原样返回，交给上游提取器处理
pub fn assemble_response_text(body: &str) -> String {
    let trimmed = body.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(text) = value.get("response").and_then(Value::as_str) {
            return text.to_string();
        }
    }

    let mut full = String::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                if let Some(fragment) = value.get("response").and_then(Value::as_str) {
                    full.push_str(fragment);
                }
            }
            Err(e) => {
                warn!("Skipping bad line: {}... ({})", preview(line, 100), e);
            }
        }
    }

    if full.is_empty() {
        trimmed.to_string()
    } else {
        full
    }
}

/// 脚本化假客户端：按顺序吐出预置响应，只剩一条时反复返回
#[cfg(test)]
pub struct FakeRunner {
    responses: std::sync::Mutex<std::collections::VecDeque<Option<String>>>,
    call_count: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakeRunner {
    pub fn new(responses: Vec<Option<String>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Some(text.to_string())])
    }

    pub fn never_responds() -> Self {
        Self::new(vec![None])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ModelRunner for FakeRunner {
    fn run(&self, _model: &str, _prompt: &str) -> impl Future<Output = Option<String>> + Send {
        self.call_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let response = {
            let mut queue = self.responses.lock().unwrap();
            if queue.len() == 1 {
                queue.front().cloned().unwrap()
            } else {
                queue.pop_front().flatten()
            }
        };
        async move { response }
    }
}
