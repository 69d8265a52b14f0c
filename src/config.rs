//! 配置模块
//! 进程启动时构造一次，按引用传入各组件，不做全局查找

use log::error;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_url: String,
    pub generator_model: String,
    pub critic_model: String,
    pub fallback_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/generate".to_string(),
            generator_model: "gpt-oss:20b".to_string(),
            critic_model: "deepseek-r1:14b".to_string(),
            fallback_model: "gpt-oss:20b".to_string(),
        }
    }
}

impl ModelConfig {
    /// 从 config.json 加载，读取或解析失败时回落到内置默认值
    pub fn load(path: &Path) -> Self {
        match crate::utils::load_json::<ModelConfig>(path) {
            Ok(config) => config,
            Err(e) => {
                let defaults = ModelConfig::default();
                error!(
                    "Failed to load {}, using defaults: generator={}, critic={} ({})",
                    path.display(),
                    defaults.generator_model,
                    defaults.critic_model,
                    e
                );
                defaults
            }
        }
    }
}

/// 重试策略，推理客户端与各评审/修复循环共用
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub fallback_model: Option<String>,
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            timeout: Duration::from_secs(180),
            fallback_model: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, model: &str) -> Self {
        self.fallback_model = Some(model.to_string());
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::attempts(2)
    }
}
