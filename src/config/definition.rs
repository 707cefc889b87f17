use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{OrchestrateError, Result};
use crate::flow::constants::{metadata, END, START};
use crate::flow::{
    AgentNode, DataMap, Expression, Flow, FlowFactory, MatchPolicy, NodeHandle, NodeOptions,
    PromptNode, UserNode,
};
use crate::schema::JsonSchemaObject;
use crate::tools::{ToolRegistry, ToolSpec};

/// 工作流定义文件
///
/// A flow described as data, in JSON or YAML. Nodes share one shape and are
/// told apart by `type`; the type-specific settings live under `config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<JsonSchemaObject>,
    #[serde(default)]
    pub output_schema: Option<JsonSchemaObject>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

/// 节点定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// 节点唯一标识
    pub id: String,

    /// 节点类型: tool, agent, prompt, branch, user
    #[serde(rename = "type")]
    pub node_type: String,

    /// 节点配置，根据类型不同而不同
    #[serde(default)]
    pub config: Value,

    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<JsonSchemaObject>,
    #[serde(default)]
    pub output_schema: Option<JsonSchemaObject>,
    #[serde(default)]
    pub input_map: Option<DataMap>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// 边定义，`START` / `END` 指向保留节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
struct ToolNodeConfig {
    #[serde(default)]
    tool: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchNodeConfig {
    evaluator: String,
    #[serde(default)]
    cases: BTreeMap<String, String>,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    policy: MatchPolicy,
}

#[derive(Debug, Deserialize)]
struct UserNodeConfig {
    #[serde(default)]
    owners: Vec<String>,
    #[serde(flatten)]
    user: UserNode,
}

impl NodeDefinition {
    fn options(&self) -> NodeOptions {
        NodeOptions {
            name: Some(self.id.clone()),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            input_map: self.input_map.clone(),
            metadata: self.metadata.clone(),
        }
    }

    fn config<T: DeserializeOwned>(&self) -> Result<T> {
        let config = if self.config.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            self.config.clone()
        };
        serde_json::from_value(config).map_err(|err| {
            OrchestrateError::Definition(format!("node `{}`: invalid {} config: {err}", self.id, self.node_type))
        })
    }
}

fn endpoint(name: &str) -> &str {
    match name {
        "START" => START,
        "END" => END,
        other => other,
    }
}

impl FlowDefinition {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reads a definition, choosing YAML for `.yaml`/`.yml` and JSON otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        debug!(path = %path.display(), yaml = is_yaml, "loading flow definition");
        if is_yaml {
            Self::from_yaml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    /// Tool registry for this import session, holding the declared tools.
    pub fn tool_registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in &self.tools {
            registry.register(tool.clone());
        }
        registry
    }

    /// 构建工作流
    ///
    /// Nodes are registered in file order, then branch cases, then edges.
    pub fn build(&self) -> Result<Flow> {
        let options = NodeOptions {
            name: Some(self.name.clone()),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            input_map: None,
            metadata: BTreeMap::new(),
        };
        let mut flow = FlowFactory::create_flow(options)?
            .with_source_kind(metadata::SOURCE_DEFINITION)
            .with_tool_directory(Arc::new(self.tool_registry()));

        let mut branches = Vec::new();
        for node in &self.nodes {
            match node.node_type.as_str() {
                "tool" => {
                    let config: ToolNodeConfig = node.config()?;
                    let tool = config.tool.unwrap_or_else(|| node.id.clone());
                    flow.tool(tool, node.options())?;
                }
                "agent" => {
                    let agent: AgentNode = node.config()?;
                    flow.agent(agent, node.options())?;
                }
                "prompt" => {
                    let prompt: PromptNode = node.config()?;
                    flow.prompt(prompt, node.options())?;
                }
                "branch" => {
                    let config: BranchNodeConfig = node.config()?;
                    let handle = flow.branch(Expression::new(config.evaluator.clone()), node.options())?;
                    branches.push((handle, config));
                }
                "user" => {
                    let config: UserNodeConfig = node.config()?;
                    Self::add_user(&mut flow, node, config)?;
                }
                other => {
                    return Err(OrchestrateError::Definition(format!(
                        "node `{}` has unsupported type `{}`",
                        node.id, other
                    )));
                }
            }
        }

        for (handle, config) in branches {
            let mut editor = flow.branch_mut(&handle)?;
            editor.policy(config.policy)?;
            for (label, target) in &config.cases {
                editor.case(label, endpoint(target))?;
            }
            if let Some(target) = &config.default {
                editor.default(endpoint(target))?;
            }
        }

        for edge in &self.edges {
            flow.edge(endpoint(&edge.from), endpoint(&edge.to))?;
        }
        Ok(flow)
    }

    /// A `user` entry becomes a user flow holding a single user node.
    fn add_user(flow: &mut Flow, node: &NodeDefinition, config: UserNodeConfig) -> Result<NodeHandle> {
        let mut options = node.options();
        let user_options = NodeOptions {
            name: Some(node.id.clone()),
            display_name: node.display_name.clone(),
            output_schema: options.output_schema.take(),
            ..NodeOptions::default()
        };

        let handle = flow.userflow(config.owners, options)?;
        let body = flow.body_mut(&handle)?;
        let user = body.user(config.user, user_options)?;
        body.starts_and_ends_with(&user)?;
        Ok(handle)
    }
}
