// 运行时模块 - 执行引擎协作与运行状态

mod client;
#[cfg(feature = "http-client")]
mod http;
mod memory;
mod run;
mod state;
mod types;

pub use client::{EventChannel, FlowEngine};
#[cfg(feature = "http-client")]
pub use http::HttpFlowEngine;
pub use memory::{MemoryEventChannel, MemoryFlowEngine, MemoryRun};
pub use run::{FlowRun, FlowRunHandlers, FlowRunSnapshot, RunCallback};
pub use state::FlowRunStatus;
pub use types::{FlowContext, FlowEvent, FlowEventKind};
