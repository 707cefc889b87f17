pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod runtime;
pub mod schema;
pub mod tools;
pub mod utils;

pub use config::{EnvConfig, FlowDefinition};
pub use error::{OrchestrateError, Result};
pub use flow::{
    AgentNode, Assignment, BranchEditor, CompiledFlow, DataMap, Expression, FindingKind, Flow,
    FlowBodyKind, FlowEdge, FlowFactory, FlowNode, FlowNodeKind, FlowValidator, ForeachPolicy,
    MatchPolicy, NodeHandle, NodeOptions, NodeSpec, PromptNode, ToolBinding, UserField,
    UserFieldKind, UserNode, ValidationFinding, ValidationRule, DEFAULT_CASE, END, START,
};
#[cfg(feature = "http-client")]
pub use runtime::HttpFlowEngine;
pub use runtime::{
    EventChannel, FlowContext, FlowEngine, FlowEvent, FlowEventKind, FlowRun, FlowRunHandlers,
    FlowRunSnapshot, FlowRunStatus, MemoryEventChannel, MemoryFlowEngine,
};
pub use schema::{JsonSchemaObject, JsonSchemaType, SchemaError, SchemaRef, SchemaSlot, SchemaTable};
pub use tools::{ToolDirectory, ToolRegistry, ToolSpec};
pub use utils::{logging, validation, LoggingConfig};
