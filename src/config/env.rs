use crate::error::{OrchestrateError, Result};
use crate::utils::logging::DEBUG_ENV;
use crate::utils::ConfigValidator;
use anyhow::anyhow;
use std::env;

pub const URL_ENV: &str = "ORCHESTRATE_URL";
pub const API_KEY_ENV: &str = "ORCHESTRATE_API_KEY";

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 解析 API Key
    ///
    /// 优先级：
    /// 1. `${VAR_NAME}` 形式时读取对应环境变量
    /// 2. 为空或是占位符时读取 `default_env_var`
    /// 3. 否则直接使用传入值
    pub fn get_api_key(api_key: &str, default_env_var: &str) -> Result<String> {
        if let Some(var) = api_key.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Self::get_env(var)
        } else if ConfigValidator::validate_api_key(api_key).is_err() {
            Self::get_env(default_env_var)
        } else {
            Ok(api_key.to_string())
        }
    }

    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            OrchestrateError::Other(anyhow!("environment variable `{}` is not set", key))
        })
    }

    /// 获取可选的环境变量
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.is_empty())
    }

    /// Base URL of the execution engine.
    pub fn engine_url() -> Result<String> {
        let url = Self::get_env(URL_ENV)?;
        ConfigValidator::validate_url(&url)?;
        Ok(url)
    }

    /// `ORCHESTRATE_API_KEY`, following `${VAR}` indirection. Unset means
    /// the engine is called without credentials.
    pub fn api_key() -> Result<Option<String>> {
        match Self::get_env_optional(API_KEY_ENV) {
            Some(raw) => Self::get_api_key(&raw, API_KEY_ENV).map(Some),
            None => Ok(None),
        }
    }

    /// 检查是否启用调试模式
    pub fn is_debug_mode() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }

    /// 获取日志级别
    pub fn get_log_level() -> Option<String> {
        Self::get_env_optional("RUST_LOG")
    }
}

/// 宏：简化环境变量获取
#[macro_export]
macro_rules! env_var {
    ($key:expr) => {
        $crate::config::EnvConfig::get_env($key)
    };
}
