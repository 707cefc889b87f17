use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flow::data_map::DataMap;
use crate::flow::types::Flow;
use crate::schema::{JsonSchemaObject, JsonSchemaType, SchemaSlot};
use crate::tools::ToolSpec;

/// Flow 节点类型定义

/// Fields shared by every node variant.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub input_schema: Option<SchemaSlot>,
    pub output_schema: Option<SchemaSlot>,
    pub metadata: BTreeMap<String, Value>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: None,
            input_schema: None,
            output_schema: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Flow 节点
#[derive(Clone, Debug)]
pub struct FlowNode {
    pub spec: NodeSpec,
    pub input_map: Option<DataMap>,
    pub kind: FlowNodeKind,
}

impl FlowNode {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }

    /// Body of a flow-shaped node (loop, foreach, user flow, nested flow).
    pub fn body(&self) -> Option<&Flow> {
        match &self.kind {
            FlowNodeKind::Loop(node) => Some(&node.body),
            FlowNodeKind::Foreach(node) => Some(&node.body),
            FlowNodeKind::UserFlow(node) => Some(&node.body),
            FlowNodeKind::Flow(body) => Some(body),
            _ => None,
        }
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut Flow> {
        match &mut self.kind {
            FlowNodeKind::Loop(node) => Some(&mut node.body),
            FlowNodeKind::Foreach(node) => Some(&mut node.body),
            FlowNodeKind::UserFlow(node) => Some(&mut node.body),
            FlowNodeKind::Flow(body) => Some(body),
            _ => None,
        }
    }
}

/// Flow 节点类型
#[derive(Clone, Debug)]
pub enum FlowNodeKind {
    Start,
    End,
    Tool(ToolNode),
    Agent(AgentNode),
    Prompt(PromptNode),
    User(UserNode),
    Branch(BranchNode),
    Wait(WaitNode),
    Loop(LoopNode),
    Foreach(ForeachNode),
    UserFlow(UserFlowNode),
    Flow(Box<Flow>),
}

impl FlowNodeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FlowNodeKind::Start => "start",
            FlowNodeKind::End => "end",
            FlowNodeKind::Tool(_) => "tool",
            FlowNodeKind::Agent(_) => "agent",
            FlowNodeKind::Prompt(_) => "prompt",
            FlowNodeKind::User(_) => "user",
            FlowNodeKind::Branch(_) => "branch",
            FlowNodeKind::Wait(_) => "wait",
            FlowNodeKind::Loop(_) => "loop",
            FlowNodeKind::Foreach(_) => "foreach",
            FlowNodeKind::UserFlow(_) => "userflow",
            FlowNodeKind::Flow(_) => "flow",
        }
    }
}

/// Which tool a tool node calls: a registry name or an inline spec.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolBinding {
    Name(String),
    Spec(ToolSpec),
}

impl ToolBinding {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolBinding::Name(name) => name,
            ToolBinding::Spec(spec) => &spec.name,
        }
    }
}

impl From<&str> for ToolBinding {
    fn from(name: &str) -> Self {
        ToolBinding::Name(name.to_string())
    }
}

impl From<String> for ToolBinding {
    fn from(name: String) -> Self {
        ToolBinding::Name(name)
    }
}

impl From<ToolSpec> for ToolBinding {
    fn from(spec: ToolSpec) -> Self {
        ToolBinding::Spec(spec)
    }
}

/// 工具节点
#[derive(Clone, Debug, PartialEq)]
pub struct ToolNode {
    pub tool: ToolBinding,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentGuideline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub condition: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// Agent 节点
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentNode {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<AgentGuideline>,
}

impl AgentNode {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            message: None,
            guidelines: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_guideline(mut self, guideline: AgentGuideline) -> Self {
        self.guidelines.push(guideline);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LlmParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// Prompt 节点
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptNode {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_prompt: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_prompt: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_parameters: Option<LlmParameters>,
}

impl PromptNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt.push(prompt.into());
        self
    }

    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt.push(prompt.into());
        self
    }

    pub fn with_llm(mut self, llm: impl Into<String>) -> Self {
        self.llm = Some(llm.into());
        self
    }

    pub fn with_llm_parameters(mut self, parameters: LlmParameters) -> Self {
        self.llm_parameters = Some(parameters);
        self
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserFieldKind {
    Text,
    Date,
    DateTime,
    Time,
    Number,
    Document,
    Boolean,
    Object,
}

impl UserFieldKind {
    /// Schema of the value a user submits for a field of this kind.
    pub fn value_schema(&self) -> JsonSchemaObject {
        match self {
            UserFieldKind::Text => JsonSchemaObject::string(),
            UserFieldKind::Date => JsonSchemaObject::string().with_format("date"),
            UserFieldKind::DateTime => JsonSchemaObject::string().with_format("date-time"),
            UserFieldKind::Time => JsonSchemaObject::string().with_format("time"),
            UserFieldKind::Number => JsonSchemaObject::number(),
            UserFieldKind::Document => JsonSchemaObject::string().with_format("uri"),
            UserFieldKind::Boolean => JsonSchemaObject::boolean(),
            UserFieldKind::Object => JsonSchemaObject::new(JsonSchemaType::Object),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserField {
    pub name: String,
    pub kind: UserFieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_list: bool,
}

impl UserField {
    pub fn new(name: impl Into<String>, kind: UserFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            display_name: None,
            description: None,
            default: None,
            text: None,
            is_list: false,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn as_list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub fn value_schema(&self) -> JsonSchemaObject {
        let schema = self.kind.value_schema();
        if self.is_list {
            JsonSchemaObject::array(schema)
        } else {
            schema
        }
    }
}

/// 用户交互节点
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserNode {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<UserField>,
}

impl UserNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owners.push(owner.into());
        self
    }

    pub fn with_field(mut self, field: UserField) -> Self {
        self.fields.push(field);
        self
    }

    /// Object schema with one property per field.
    pub fn output_schema(&self) -> Option<JsonSchemaObject> {
        if self.fields.is_empty() {
            return None;
        }
        let mut schema = JsonSchemaObject::object();
        for field in &self.fields {
            let mut value = field.value_schema();
            value.description = field.description.clone();
            value.default = field.default.clone();
            schema = schema.with_property(field.name.clone(), value);
        }
        Some(schema)
    }
}

/// Expression evaluated by the engine at run time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Expression {
    pub expression: String,
}

impl Expression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

/// 分支策略
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPolicy {
    #[default]
    FirstMatch,
    AnyMatch,
}

/// 分支节点
#[derive(Clone, Debug, PartialEq)]
pub struct BranchNode {
    pub evaluator: Expression,
    /// label -> target node name
    pub cases: BTreeMap<String, String>,
    pub match_policy: MatchPolicy,
}

impl BranchNode {
    pub fn new(evaluator: Expression) -> Self {
        Self {
            evaluator,
            cases: BTreeMap::new(),
            match_policy: MatchPolicy::FirstMatch,
        }
    }
}

/// Synchronization point. Modelled for documents coming from the engine; the
/// builder does not create it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaitNode {
    pub wait_for: Vec<String>,
}

/// 循环节点
#[derive(Clone, Debug)]
pub struct LoopNode {
    pub evaluator: Expression,
    pub body: Box<Flow>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeachPolicy {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Clone, Debug)]
pub struct ForeachNode {
    pub item_schema: SchemaSlot,
    pub policy: ForeachPolicy,
    pub body: Box<Flow>,
}

/// Owners live on the body so that user nodes added to it inherit them.
#[derive(Clone, Debug)]
pub struct UserFlowNode {
    pub body: Box<Flow>,
}

/// Common construction inputs for builder calls.
#[derive(Clone, Debug, Default)]
pub struct NodeOptions {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub input_schema: Option<JsonSchemaObject>,
    pub output_schema: Option<JsonSchemaObject>,
    pub input_map: Option<DataMap>,
    pub metadata: BTreeMap<String, Value>,
}

impl NodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::default().with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: JsonSchemaObject) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: JsonSchemaObject) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_input_map(mut self, input_map: DataMap) -> Self {
        self.input_map = Some(input_map);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
