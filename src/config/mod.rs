pub mod definition;
pub mod env;

pub use definition::{EdgeDefinition, FlowDefinition, NodeDefinition};
pub use env::EnvConfig;
