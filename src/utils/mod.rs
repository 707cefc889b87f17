/// 工具模块 - 提供通用工具函数
pub mod logging;
pub mod naming;
pub mod validation;

pub use logging::LoggingConfig;
pub use naming::sanitize_identifier;
pub use validation::ConfigValidator;
