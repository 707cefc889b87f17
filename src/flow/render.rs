use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::flow::constants::fields;
use crate::flow::nodes::{FlowNode, FlowNodeKind, NodeSpec};
use crate::flow::types::Flow;
use crate::schema::render_slot;

/// 线格式渲染
///
/// The root document carries the flow's own spec fields at the top level.
/// Every node, nested flows included, renders as `{"spec": {...}}` with
/// `input_map`, `nodes` and `edges` beside it when present.
impl Flow {
    pub fn to_json(&self) -> Result<Value> {
        let mut document = spec_fields("flow", &self.spec, false)?;
        document.insert(fields::NODES.to_string(), self.render_nodes()?);
        document.insert(fields::EDGES.to_string(), serde_json::to_value(&self.edges)?);

        let schemas = self.with_table(|table| table.render())??;
        document.insert(fields::SCHEMAS.to_string(), Value::Object(schemas));

        let mut metadata: Map<String, Value> = self
            .spec
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &self.metadata {
            metadata.insert(key.clone(), Value::String(value.clone()));
        }
        document.insert(fields::METADATA.to_string(), Value::Object(metadata));

        Ok(Value::Object(document))
    }

    pub(crate) fn render_nodes(&self) -> Result<Value> {
        let mut nodes = Map::new();
        for (name, node) in &self.nodes {
            nodes.insert(name.clone(), render_node(node)?);
        }
        Ok(Value::Object(nodes))
    }
}

fn render_node(node: &FlowNode) -> Result<Value> {
    let mut spec = spec_fields(node.kind_name(), &node.spec, true)?;
    match &node.kind {
        FlowNodeKind::Start | FlowNodeKind::End | FlowNodeKind::Flow(_) => {}
        FlowNodeKind::Tool(tool) => {
            spec.insert(fields::TOOL.to_string(), serde_json::to_value(&tool.tool)?);
        }
        FlowNodeKind::Agent(agent) => merge(&mut spec, agent)?,
        FlowNodeKind::Prompt(prompt) => merge(&mut spec, prompt)?,
        FlowNodeKind::User(user) => merge(&mut spec, user)?,
        FlowNodeKind::Branch(branch) => {
            spec.insert(
                fields::EVALUATOR.to_string(),
                serde_json::to_value(&branch.evaluator)?,
            );
            spec.insert(fields::CASES.to_string(), serde_json::to_value(&branch.cases)?);
            spec.insert(
                fields::MATCH_POLICY.to_string(),
                serde_json::to_value(branch.match_policy)?,
            );
        }
        FlowNodeKind::Wait(wait) => {
            spec.insert(fields::WAIT_FOR.to_string(), serde_json::to_value(&wait.wait_for)?);
        }
        FlowNodeKind::Loop(node) => {
            spec.insert(
                fields::EVALUATOR.to_string(),
                serde_json::to_value(&node.evaluator)?,
            );
        }
        FlowNodeKind::Foreach(node) => {
            spec.insert(fields::ITEM_SCHEMA.to_string(), render_slot(&node.item_schema)?);
            spec.insert(
                fields::FOREACH_POLICY.to_string(),
                serde_json::to_value(node.policy)?,
            );
        }
        FlowNodeKind::UserFlow(node) => {
            spec.insert(fields::OWNERS.to_string(), serde_json::to_value(&node.body.owners)?);
        }
    }

    let mut document = Map::new();
    document.insert(fields::SPEC.to_string(), Value::Object(spec));
    if let Some(input_map) = &node.input_map {
        document.insert(fields::INPUT_MAP.to_string(), serde_json::to_value(input_map)?);
    }
    if let Some(body) = node.body() {
        document.insert(fields::NODES.to_string(), body.render_nodes()?);
        document.insert(fields::EDGES.to_string(), serde_json::to_value(&body.edges)?);
    }
    Ok(Value::Object(document))
}

fn spec_fields(kind: &str, spec: &NodeSpec, with_metadata: bool) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    map.insert(fields::KIND.to_string(), Value::from(kind));
    map.insert(fields::NAME.to_string(), Value::from(spec.name.as_str()));
    map.insert(
        fields::DISPLAY_NAME.to_string(),
        Value::from(spec.display_name.as_str()),
    );
    if let Some(description) = &spec.description {
        map.insert(fields::DESCRIPTION.to_string(), Value::from(description.as_str()));
    }
    if let Some(schema) = &spec.input_schema {
        map.insert(fields::INPUT_SCHEMA.to_string(), render_slot(schema)?);
    }
    if let Some(schema) = &spec.output_schema {
        map.insert(fields::OUTPUT_SCHEMA.to_string(), render_slot(schema)?);
    }
    if with_metadata && !spec.metadata.is_empty() {
        map.insert(fields::METADATA.to_string(), serde_json::to_value(&spec.metadata)?);
    }
    Ok(map)
}

/// Appends the serialized fields of a node variant to its spec.
fn merge<T: Serialize>(spec: &mut Map<String, Value>, variant: &T) -> Result<()> {
    if let Value::Object(extra) = serde_json::to_value(variant)? {
        spec.extend(extra);
    }
    Ok(())
}
