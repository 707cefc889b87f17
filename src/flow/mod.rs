// Flow 模块 - 工作流图定义、构建与编译

pub mod builder;
pub mod compile;
pub mod constants;
pub mod data_map;
pub mod factory;
pub mod nodes;
pub mod render;
pub mod types;
pub mod validator;

// 重新导出核心类型
pub use builder::BranchEditor;
pub use compile::CompiledFlow;
pub use constants::{DEFAULT_CASE, END, START};
pub use data_map::{Assignment, DataMap};
pub use factory::FlowFactory;
pub use nodes::{
    AgentGuideline, AgentNode, BranchNode, Expression, FlowNode, FlowNodeKind, ForeachNode,
    ForeachPolicy, LlmParameters, LoopNode, MatchPolicy, NodeOptions, NodeSpec, PromptNode,
    ToolBinding, ToolNode, UserField, UserFieldKind, UserFlowNode, UserNode, WaitNode,
};
pub use types::{Flow, FlowBodyKind, FlowEdge, NodeHandle};
pub use validator::{FindingKind, FlowValidator, ValidationFinding, ValidationRule};
