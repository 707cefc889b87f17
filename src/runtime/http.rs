use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::EnvConfig;
use crate::error::{OrchestrateError, Result};
use crate::utils::ConfigValidator;

use super::client::FlowEngine;

/// 远程执行引擎客户端
///
/// `PUT {base}/v1/flows/{id}/model` deploys a model and
/// `POST {base}/v1/flows/{id}/runs` starts a run.
#[derive(Clone)]
pub struct HttpFlowEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFlowEngine {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ConfigValidator::validate_url(&base_url)?;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        ConfigValidator::validate_api_key(&api_key)?;
        self.api_key = Some(api_key);
        Ok(self)
    }

    /// Builds a client from `ORCHESTRATE_URL` and `ORCHESTRATE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let engine = Self::new(EnvConfig::engine_url()?)?;
        match EnvConfig::api_key()? {
            Some(api_key) => engine.with_api_key(api_key),
            None => Ok(engine),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }
}

#[async_trait]
impl FlowEngine for HttpFlowEngine {
    #[instrument(skip(self, model))]
    async fn create_update_flow_model(&self, flow_id: &str, model: &Value) -> Result<Value> {
        let url = format!("{}/v1/flows/{}/model", self.base_url, flow_id);
        let response = self
            .authorize(self.client.put(&url).json(model))
            .send()
            .await?
            .error_for_status()?;
        let openapi: Value = response.json().await?;
        debug!(%url, "flow model deployed");
        Ok(openapi)
    }

    #[instrument(skip(self, input))]
    async fn start_flow(&self, flow_id: &str, input: &Value) -> Result<String> {
        let url = format!("{}/v1/flows/{}/runs", self.base_url, flow_id);
        let response = self
            .authorize(self.client.post(&url).json(input))
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        body.get("instance_id")
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| OrchestrateError::EmptyResponse(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_urls_and_placeholder_keys() {
        assert!(HttpFlowEngine::new("localhost:4321").is_err());
        let engine = HttpFlowEngine::new("http://localhost:4321/").unwrap();
        assert_eq!(engine.base_url(), "http://localhost:4321");
        assert!(engine.with_api_key("your_api_key").is_err());
    }
}
