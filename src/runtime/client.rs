use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::Result;

/// 执行引擎客户端
#[async_trait]
pub trait FlowEngine: Send + Sync {
    /// Creates or replaces the flow model and returns an OpenAPI-like
    /// description of the flow's callable surface.
    async fn create_update_flow_model(&self, flow_id: &str, model: &Value) -> Result<Value>;

    /// Starts a run and returns its instance id.
    async fn start_flow(&self, flow_id: &str, input: &Value) -> Result<String>;
}

/// 事件通道
///
/// Yields serialized event records for one run instance, in engine order.
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn subscribe(&self, instance_id: &str) -> Result<BoxStream<'static, Result<String>>>;
}
