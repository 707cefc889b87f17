use crate::error::{OrchestrateError, Result};
use anyhow::anyhow;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证 API Key 格式
    pub fn validate_api_key(api_key: &str) -> Result<()> {
        if api_key.is_empty() {
            return Err(OrchestrateError::Other(anyhow!("API key must not be empty")));
        }

        if api_key.starts_with("your_") || api_key == "changeme" {
            return Err(OrchestrateError::Other(anyhow!(
                "API key looks like a placeholder"
            )));
        }

        Ok(())
    }

    /// 验证 URL 格式
    pub fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(OrchestrateError::Other(anyhow!("URL must not be empty")));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(OrchestrateError::Other(anyhow!(
                "URL `{}` must start with http:// or https://",
                url
            )));
        }

        Ok(())
    }

    /// 验证节点名称
    pub fn validate_node_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(OrchestrateError::Other(anyhow!("node name must not be empty")));
        }

        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(OrchestrateError::Other(anyhow!(
                "node name `{}` may only contain letters, digits and underscores",
                name
            )));
        }

        Ok(())
    }

    /// 验证工作流名称
    pub fn validate_flow_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(OrchestrateError::Other(anyhow!("flow name must not be empty")));
        }

        if name.len() > 100 {
            return Err(OrchestrateError::Other(anyhow!(
                "flow name is longer than 100 characters"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key() {
        assert!(ConfigValidator::validate_api_key("").is_err());
        assert!(ConfigValidator::validate_api_key("your_api_key_here").is_err());
        assert!(ConfigValidator::validate_api_key("k-1234567890abcdef").is_ok());
    }

    #[test]
    fn test_validate_url() {
        assert!(ConfigValidator::validate_url("").is_err());
        assert!(ConfigValidator::validate_url("example.com").is_err());
        assert!(ConfigValidator::validate_url("http://localhost:4321").is_ok());
        assert!(ConfigValidator::validate_url("https://example.com").is_ok());
    }

    #[test]
    fn test_validate_node_name() {
        assert!(ConfigValidator::validate_node_name("").is_err());
        assert!(ConfigValidator::validate_node_name("node_1").is_ok());
        assert!(ConfigValidator::validate_node_name("node-1").is_err());
        assert!(ConfigValidator::validate_node_name("node@1").is_err());
    }

    #[test]
    fn test_validate_flow_name() {
        assert!(ConfigValidator::validate_flow_name("").is_err());
        assert!(ConfigValidator::validate_flow_name("hello_flow").is_ok());
        assert!(ConfigValidator::validate_flow_name(&"x".repeat(101)).is_err());
    }
}
