use tracing::debug;

use crate::error::{OrchestrateError, Result};
use crate::flow::constants::{DEFAULT_CASE, END, START};
use crate::flow::nodes::{
    AgentNode, BranchNode, Expression, FlowNode, FlowNodeKind, ForeachNode, ForeachPolicy,
    LoopNode, MatchPolicy, NodeOptions, NodeSpec, PromptNode, ToolBinding, ToolNode, UserField,
    UserFlowNode, UserNode,
};
use crate::flow::types::{Flow, FlowBodyKind, FlowEdge, NodeHandle};
use crate::schema::{JsonSchemaObject, SchemaSlot};
use crate::tools::ToolSpec;
use crate::utils::{sanitize_identifier, ConfigValidator};

/// Flow 构建 API
///
/// Every call registers a value copy of the node in the graph and returns its
/// handle. Further configuration goes through the flow with that handle.
impl Flow {
    /// 添加工具节点
    ///
    /// A tool given by name with no explicit schemas is looked up in the
    /// flow's tool directory and its published schemas are used.
    pub fn tool(&mut self, tool: impl Into<ToolBinding>, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let binding = tool.into();
        let name = self.resolve_name(&options, Some(binding.tool_name()), "tool")?;

        let mut options = options;
        let published = match &binding {
            ToolBinding::Spec(spec) => Some(spec.clone()),
            ToolBinding::Name(tool_name)
                if options.input_schema.is_none() && options.output_schema.is_none() =>
            {
                Some(self.lookup_tool(tool_name)?)
            }
            ToolBinding::Name(_) => None,
        };
        if let Some(published) = published {
            apply_tool_spec(&mut options, published);
        }

        let spec = self.node_spec(name, &options)?;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Tool(ToolNode { tool: binding }),
        })
    }

    /// 添加 Agent 节点
    pub fn agent(&mut self, agent: AgentNode, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, Some(&agent.agent), "agent")?;
        let spec = self.node_spec(name, &options)?;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Agent(agent),
        })
    }

    pub fn prompt(&mut self, prompt: PromptNode, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, None, "prompt")?;
        let spec = self.node_spec(name, &options)?;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Prompt(prompt),
        })
    }

    /// 添加分支节点，通过 [`Flow::branch_mut`] 配置分支
    pub fn branch(&mut self, evaluator: Expression, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, None, "branch")?;
        let spec = self.node_spec(name, &options)?;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Branch(BranchNode::new(evaluator)),
        })
    }

    pub fn branch_mut(&mut self, handle: &NodeHandle) -> Result<BranchEditor<'_>> {
        self.check_compiled()?;
        match self.nodes.get(handle.as_str()).map(|node| &node.kind) {
            Some(FlowNodeKind::Branch(_)) => Ok(BranchEditor {
                flow: self,
                name: handle.as_str().to_string(),
            }),
            Some(_) => Err(OrchestrateError::NodeKindMismatch {
                name: handle.as_str().to_string(),
                expected: "branch",
            }),
            None => Err(OrchestrateError::UnknownNode(handle.as_str().to_string())),
        }
    }

    /// Wait nodes are not supported by the builder.
    pub fn wait(&mut self, _wait_for: &[NodeHandle], _options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        Err(OrchestrateError::UnsupportedPolicy {
            kind: "node",
            value: "wait".to_string(),
        })
    }

    /// 添加 foreach 节点，循环体通过 [`Flow::body_mut`] 构建
    pub fn foreach(
        &mut self,
        item_schema: JsonSchemaObject,
        policy: ForeachPolicy,
        options: NodeOptions,
    ) -> Result<NodeHandle> {
        self.check_compiled()?;
        if policy != ForeachPolicy::Sequential {
            return Err(OrchestrateError::UnsupportedPolicy {
                kind: "foreach",
                value: format!("{policy:?}"),
            });
        }
        let name = self.resolve_name(&options, None, "foreach")?;
        let item_schema = self.table_schema(&item_schema, &format!("{name}_item"))?;
        let spec = self.node_spec(name, &options)?;
        let body = self.nested(spec.clone(), FlowBodyKind::Foreach);
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Foreach(ForeachNode {
                item_schema,
                policy,
                body: Box::new(body),
            }),
        })
    }

    /// 添加循环节点，`evaluator` 为真时继续执行循环体
    pub fn loop_node(&mut self, evaluator: Expression, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, None, "loop")?;
        let spec = self.node_spec(name, &options)?;
        let body = self.nested(spec.clone(), FlowBodyKind::Loop);
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Loop(LoopNode {
                evaluator,
                body: Box::new(body),
            }),
        })
    }

    /// 添加用户交互子流程
    pub fn userflow(&mut self, owners: Vec<String>, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, None, "userflow")?;
        let spec = self.node_spec(name, &options)?;
        let mut body = self.nested(spec.clone(), FlowBodyKind::UserFlow);
        body.owners = owners;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::UserFlow(UserFlowNode {
                body: Box::new(body),
            }),
        })
    }

    /// Nested flow used as a single node of this flow.
    pub fn subflow(&mut self, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        let name = self.resolve_name(&options, None, "flow")?;
        let spec = self.node_spec(name, &options)?;
        let body = self.nested(spec.clone(), FlowBodyKind::Flow);
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::Flow(Box::new(body)),
        })
    }

    /// Body of a loop, foreach, user-flow or nested flow node.
    pub fn body_mut(&mut self, handle: &NodeHandle) -> Result<&mut Flow> {
        self.check_compiled()?;
        let node = self
            .nodes
            .get_mut(handle.as_str())
            .ok_or_else(|| OrchestrateError::UnknownNode(handle.as_str().to_string()))?;
        node.body_mut()
            .ok_or_else(|| OrchestrateError::NodeKindMismatch {
                name: handle.as_str().to_string(),
                expected: "flow",
            })
    }

    /// 添加用户节点，仅用于用户交互子流程
    ///
    /// Owners default to the user flow's owners and the output schema is
    /// derived from the fields unless given explicitly.
    pub fn user(&mut self, user: UserNode, options: NodeOptions) -> Result<NodeHandle> {
        self.check_compiled()?;
        self.check_user_flow()?;
        let name = self.resolve_name(&options, None, "user")?;

        let mut user = user;
        if user.owners.is_empty() {
            user.owners = self.owners.clone();
        }
        let mut options = options;
        if options.output_schema.is_none() {
            options.output_schema = user.output_schema();
        }

        let spec = self.node_spec(name, &options)?;
        self.register(FlowNode {
            spec,
            input_map: options.input_map,
            kind: FlowNodeKind::User(user),
        })
    }

    /// Appends a field to a user node and re-derives its output schema.
    pub fn field(&mut self, handle: &NodeHandle, field: UserField) -> Result<&mut Self> {
        self.check_compiled()?;
        self.check_user_flow()?;
        let name = handle.as_str().to_string();
        let output = {
            let node = self
                .nodes
                .get_mut(&name)
                .ok_or_else(|| OrchestrateError::UnknownNode(name.clone()))?;
            let FlowNodeKind::User(user) = &mut node.kind else {
                return Err(OrchestrateError::NodeKindMismatch {
                    name,
                    expected: "user",
                });
            };
            user.fields.push(field);
            user.output_schema()
        };

        let slot = match output {
            Some(schema) => Some(self.table_schema(&schema, &format!("{name}_output"))?),
            None => None,
        };
        if let Some(node) = self.nodes.get_mut(&name) {
            node.spec.output_schema = slot;
        }
        self.validated = false;
        Ok(self)
    }

    pub fn set_input_schema(&mut self, schema: JsonSchemaObject) -> Result<&mut Self> {
        self.check_compiled()?;
        let fallback = format!("{}_input", self.spec.name);
        self.spec.input_schema = Some(self.table_schema(&schema, &fallback)?);
        Ok(self)
    }

    pub fn set_output_schema(&mut self, schema: JsonSchemaObject) -> Result<&mut Self> {
        self.check_compiled()?;
        let fallback = format!("{}_output", self.spec.name);
        self.spec.output_schema = Some(self.table_schema(&schema, &fallback)?);
        Ok(self)
    }

    /// 添加边
    ///
    /// START and END are created on first use. END can never start an edge
    /// and START can never end one.
    pub fn edge(&mut self, start: impl AsRef<str>, end: impl AsRef<str>) -> Result<&mut Self> {
        self.check_compiled()?;
        let start = start.as_ref().to_string();
        let end = end.as_ref().to_string();

        if start == END {
            return Err(OrchestrateError::InvalidEdge {
                start,
                end,
                reason: "the end node has no outgoing edges",
            });
        }
        if end == START {
            return Err(OrchestrateError::InvalidEdge {
                start,
                end,
                reason: "the start node has no incoming edges",
            });
        }
        for name in [&start, &end] {
            if name != START && name != END && !self.nodes.contains_key(name) {
                return Err(OrchestrateError::UnknownNode(name.clone()));
            }
        }

        self.materialize(&start);
        self.materialize(&end);
        debug!(flow = %self.spec.name, %start, %end, "edge added");
        self.edges.push(FlowEdge { start, end });
        self.validated = false;
        Ok(self)
    }

    /// Chains consecutive nodes with edges.
    pub fn sequence<I, S>(&mut self, nodes: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = nodes.into_iter().map(|n| n.as_ref().to_string()).collect();
        for pair in names.windows(2) {
            self.edge(&pair[0], &pair[1])?;
        }
        Ok(self)
    }

    pub fn starts_with(&mut self, node: impl AsRef<str>) -> Result<&mut Self> {
        self.edge(START, node)
    }

    pub fn ends_with(&mut self, node: impl AsRef<str>) -> Result<&mut Self> {
        self.edge(node, END)
    }

    pub fn starts_and_ends_with(&mut self, node: impl AsRef<str>) -> Result<&mut Self> {
        let node = node.as_ref();
        self.edge(START, node)?;
        self.edge(node, END)
    }

    fn lookup_tool(&self, tool_name: &str) -> Result<ToolSpec> {
        let directory = self
            .tools
            .as_ref()
            .ok_or_else(|| OrchestrateError::NoToolDirectory(tool_name.to_string()))?;
        let mut drafts = directory.get_draft_by_name(tool_name)?;
        if drafts.is_empty() {
            return Err(OrchestrateError::ToolNotFound(tool_name.to_string()));
        }
        Ok(drafts.remove(0))
    }

    fn check_user_flow(&self) -> Result<()> {
        if self.body_kind != FlowBodyKind::UserFlow {
            return Err(OrchestrateError::NodeKindMismatch {
                name: self.spec.name.clone(),
                expected: "userflow",
            });
        }
        Ok(())
    }

    /// Explicit name, else the sanitized display name, else `fallback`, else
    /// a generated `<prefix>_<n>`.
    fn resolve_name(&self, options: &NodeOptions, fallback: Option<&str>, prefix: &str) -> Result<String> {
        let name = match &options.name {
            Some(name) => {
                ConfigValidator::validate_node_name(name)?;
                name.clone()
            }
            None => match options.display_name.as_deref().or(fallback) {
                Some(label) => sanitize_identifier(label),
                None => self.generate_name(prefix),
            },
        };
        if name == START || name == END {
            return Err(OrchestrateError::ReservedLabel(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(OrchestrateError::DuplicateNode(name));
        }
        Ok(name)
    }

    fn generate_name(&self, prefix: &str) -> String {
        let mut n = self.nodes.len() + 1;
        loop {
            let candidate = format!("{prefix}_{n}");
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn node_spec(&self, name: String, options: &NodeOptions) -> Result<NodeSpec> {
        let input_schema = match &options.input_schema {
            Some(schema) => Some(self.table_schema(schema, &format!("{name}_input"))?),
            None => None,
        };
        let output_schema = match &options.output_schema {
            Some(schema) => Some(self.table_schema(schema, &format!("{name}_output"))?),
            None => None,
        };
        Ok(NodeSpec {
            display_name: options.display_name.clone().unwrap_or_else(|| name.clone()),
            name,
            description: options.description.clone(),
            input_schema,
            output_schema,
            metadata: options.metadata.clone(),
        })
    }

    /// Complex schemas become references into the shared table, titled by
    /// their own title or alias and `fallback` otherwise. Primitive schemas
    /// stay inline.
    fn table_schema(&self, schema: &JsonSchemaObject, fallback: &str) -> Result<SchemaSlot> {
        let normalized = schema.normalized();
        if !normalized.is_complex() {
            return Ok(SchemaSlot::from(normalized));
        }
        let title = if schema.title.is_some() || schema.alias_name.is_some() {
            None
        } else {
            Some(fallback)
        };
        let reference = self.with_table(|table| table.add_ref(&normalized, title))??;
        Ok(SchemaSlot::from(reference))
    }

    fn register(&mut self, node: FlowNode) -> Result<NodeHandle> {
        let name = node.spec.name.clone();
        if self.nodes.contains_key(&name) {
            return Err(OrchestrateError::DuplicateNode(name));
        }
        debug!(flow = %self.spec.name, node = %name, kind = node.kind_name(), "node registered");
        self.nodes.insert(name.clone(), node);
        self.validated = false;
        Ok(NodeHandle(name))
    }

    fn materialize(&mut self, name: &str) {
        let kind = match name {
            START => FlowNodeKind::Start,
            END => FlowNodeKind::End,
            _ => return,
        };
        self.nodes.entry(name.to_string()).or_insert_with(|| FlowNode {
            spec: NodeSpec::new(name),
            input_map: None,
            kind,
        });
    }
}

fn apply_tool_spec(options: &mut NodeOptions, spec: ToolSpec) {
    if options.input_schema.is_none() {
        options.input_schema = spec.input_schema;
    }
    if options.output_schema.is_none() {
        options.output_schema = spec.output_schema;
    }
    if options.description.is_none() {
        options.description = spec.description;
    }
    if options.display_name.is_none() {
        options.display_name = spec.display_name;
    }
}

/// 分支编辑器
///
/// Borrowed from the flow by [`Flow::branch_mut`]; every case also adds the
/// branch -> target edge.
#[derive(Debug)]
pub struct BranchEditor<'a> {
    flow: &'a mut Flow,
    name: String,
}

impl BranchEditor<'_> {
    pub fn handle(&self) -> NodeHandle {
        NodeHandle(self.name.clone())
    }

    pub fn case(&mut self, label: &str, target: impl AsRef<str>) -> Result<&mut Self> {
        if label == DEFAULT_CASE {
            return Err(OrchestrateError::ReservedLabel(label.to_string()));
        }
        self.add_case(label, target.as_ref())
    }

    pub fn default(&mut self, target: impl AsRef<str>) -> Result<&mut Self> {
        self.add_case(DEFAULT_CASE, target.as_ref())
    }

    /// Only [`MatchPolicy::FirstMatch`] is supported.
    pub fn policy(&mut self, policy: MatchPolicy) -> Result<&mut Self> {
        if policy != MatchPolicy::FirstMatch {
            return Err(OrchestrateError::UnsupportedPolicy {
                kind: "branch",
                value: format!("{policy:?}"),
            });
        }
        self.branch()?.match_policy = policy;
        Ok(self)
    }

    /// Re-pointing an existing label replaces the edge it added.
    fn add_case(&mut self, label: &str, target: &str) -> Result<&mut Self> {
        let previous = self.branch()?.cases.get(label).cloned();
        if previous.as_deref() == Some(target) {
            return Ok(self);
        }
        self.flow.edge(&self.name, target)?;
        if let Some(previous) = previous {
            let stale = self
                .flow
                .edges
                .iter()
                .position(|edge| edge.start == self.name && edge.end == previous);
            if let Some(index) = stale {
                self.flow.edges.remove(index);
            }
            debug!(branch = %self.name, %label, from = %previous, to = %target, "branch case re-pointed");
        }
        self.branch()?
            .cases
            .insert(label.to_string(), target.to_string());
        Ok(self)
    }

    fn branch(&mut self) -> Result<&mut BranchNode> {
        match self.flow.nodes.get_mut(&self.name).map(|node| &mut node.kind) {
            Some(FlowNodeKind::Branch(branch)) => Ok(branch),
            _ => Err(OrchestrateError::NodeKindMismatch {
                name: self.name.clone(),
                expected: "branch",
            }),
        }
    }
}
