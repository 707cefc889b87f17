// 工具模块 - 工具描述与导入会话注册表

pub mod registry;
pub mod spec;

pub use registry::{ToolDirectory, ToolRegistry};
pub use spec::{ToolSpec, ToolSpecBuilder};
