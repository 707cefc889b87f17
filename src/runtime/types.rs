use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// 运行时事件类型定义

/// Kind of an event emitted by the execution engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventKind {
    #[serde(alias = "ON_FLOW_START")]
    OnFlowStart,
    #[serde(alias = "ON_FLOW_END")]
    OnFlowEnd,
    #[serde(alias = "ON_FLOW_ERROR")]
    OnFlowError,
    #[serde(alias = "ON_TASK_START")]
    OnTaskStart,
    #[serde(alias = "ON_TASK_END")]
    OnTaskEnd,
    #[serde(alias = "ON_TASK_ERROR")]
    OnTaskError,
    #[serde(alias = "ON_TASK_WAIT")]
    OnTaskWait,
    #[serde(alias = "ON_TASK_STREAM")]
    OnTaskStream,
    #[serde(other)]
    Unknown,
}

impl FlowEventKind {
    /// Events that put a running flow into the interrupted state.
    pub fn is_interrupting(&self) -> bool {
        matches!(
            self,
            FlowEventKind::OnTaskWait | FlowEventKind::OnTaskStream | FlowEventKind::OnFlowError
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowEventKind::OnFlowEnd | FlowEventKind::OnFlowError)
    }
}

/// Engine-side context attached to every event.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_context: Option<Box<FlowContext>>,
}

impl FlowContext {
    pub fn for_instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// 执行引擎事件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FlowEvent {
    pub kind: FlowEventKind,
    #[serde(default)]
    pub context: FlowContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl FlowEvent {
    pub fn new(kind: FlowEventKind, context: FlowContext) -> Self {
        Self {
            kind,
            context,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    /// Parses one serialized record from the event channel.
    pub fn parse(record: &str) -> Result<Self> {
        Ok(serde_json::from_str(record)?)
    }
}
