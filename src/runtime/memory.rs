use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{OrchestrateError, Result};

use super::client::{EventChannel, FlowEngine};
use super::types::FlowEvent;

/// A run started on [`MemoryFlowEngine`].
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryRun {
    pub flow_id: String,
    pub instance_id: String,
    pub input: Value,
}

/// 内存执行引擎
///
/// Records deployed models and started runs without executing anything.
/// Used by tests and local dry runs.
#[derive(Default)]
pub struct MemoryFlowEngine {
    models: RwLock<HashMap<String, Value>>,
    runs: RwLock<Vec<MemoryRun>>,
}

impl MemoryFlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self, flow_id: &str) -> Option<Value> {
        self.models.read().get(flow_id).cloned()
    }

    pub fn runs(&self) -> Vec<MemoryRun> {
        self.runs.read().clone()
    }
}

#[async_trait]
impl FlowEngine for MemoryFlowEngine {
    async fn create_update_flow_model(&self, flow_id: &str, model: &Value) -> Result<Value> {
        self.models
            .write()
            .insert(flow_id.to_string(), model.clone());
        debug!(flow = %flow_id, "flow model stored");

        let request_schema = model.get("input_schema").cloned().unwrap_or_else(|| json!({}));
        let response_schema = model.get("output_schema").cloned().unwrap_or_else(|| json!({}));
        let schemas = model.get("schemas").cloned().unwrap_or_else(|| json!({}));
        let run_path = format!("/v1/flows/{flow_id}/runs");
        Ok(json!({
            "openapi": "3.0.3",
            "info": { "title": flow_id, "version": "1.0.0" },
            "paths": {
                run_path: {
                    "post": {
                        "operationId": format!("run_{flow_id}"),
                        "requestBody": {
                            "content": { "application/json": { "schema": request_schema } }
                        },
                        "responses": {
                            "200": {
                                "content": { "application/json": { "schema": response_schema } }
                            }
                        }
                    }
                }
            },
            "components": { "schemas": schemas }
        }))
    }

    async fn start_flow(&self, flow_id: &str, input: &Value) -> Result<String> {
        if !self.models.read().contains_key(flow_id) {
            return Err(OrchestrateError::NotDeployed(flow_id.to_string()));
        }
        let instance_id = Uuid::new_v4().to_string();
        self.runs.write().push(MemoryRun {
            flow_id: flow_id.to_string(),
            instance_id: instance_id.clone(),
            input: input.clone(),
        });
        Ok(instance_id)
    }
}

type Record = Result<String>;

#[derive(Default)]
struct Channel {
    sender: Option<mpsc::UnboundedSender<Record>>,
    receiver: Option<mpsc::UnboundedReceiver<Record>>,
}

impl Channel {
    fn open() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
        }
    }
}

/// 内存事件通道
///
/// One unbounded queue per instance. Records published before the
/// subscription are buffered. A channel built with [`MemoryEventChannel::scripted`]
/// replays the same records to every instance nobody published to.
#[derive(Default)]
pub struct MemoryEventChannel {
    channels: Mutex<HashMap<String, Channel>>,
    script: Vec<String>,
}

impl MemoryEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(events: &[FlowEvent]) -> Result<Self> {
        let script = events
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            channels: Mutex::new(HashMap::new()),
            script,
        })
    }

    pub fn publish(&self, instance_id: &str, event: &FlowEvent) -> Result<()> {
        self.publish_raw(instance_id, serde_json::to_string(event)?)
    }

    pub fn publish_raw(&self, instance_id: &str, record: impl Into<String>) -> Result<()> {
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(instance_id.to_string())
            .or_insert_with(Channel::open);
        let sender = channel
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("event channel for `{instance_id}` is closed"))?;
        sender
            .send(Ok(record.into()))
            .map_err(|_| anyhow!("event channel for `{instance_id}` has no subscriber"))?;
        Ok(())
    }

    /// Ends the record stream of `instance_id` once buffered records drain.
    pub fn close(&self, instance_id: &str) {
        if let Some(channel) = self.channels.lock().get_mut(instance_id) {
            channel.sender = None;
        }
    }
}

#[async_trait]
impl EventChannel for MemoryEventChannel {
    async fn subscribe(&self, instance_id: &str) -> Result<BoxStream<'static, Result<String>>> {
        let mut channels = self.channels.lock();
        if !channels.contains_key(instance_id) && !self.script.is_empty() {
            let records: Vec<Record> = self.script.iter().cloned().map(Ok).collect();
            return Ok(stream::iter(records).boxed());
        }

        let channel = channels
            .entry(instance_id.to_string())
            .or_insert_with(Channel::open);
        let receiver = channel.receiver.take().ok_or_else(|| {
            OrchestrateError::Other(anyhow!("instance `{instance_id}` already has a subscriber"))
        })?;
        debug!(instance = %instance_id, "subscribed to memory event channel");
        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|record| (record, receiver))
        })
        .boxed())
    }
}
