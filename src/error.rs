use thiserror::Error;

use crate::flow::ValidationFinding;
use crate::schema::SchemaError;

pub type Result<T> = std::result::Result<T, OrchestrateError>;

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("node `{0}` already exists in flow")]
    DuplicateNode(String),
    #[error("unknown node `{0}` in flow")]
    UnknownNode(String),
    #[error("invalid edge from `{start}` to `{end}`: {reason}")]
    InvalidEdge {
        start: String,
        end: String,
        reason: &'static str,
    },
    #[error("flow `{0}` is already compiled")]
    AlreadyCompiled(String),
    #[error("label `{0}` is reserved")]
    ReservedLabel(String),
    #[error("unsupported {kind}: {value}")]
    UnsupportedPolicy { kind: &'static str, value: String },
    #[error("node `{name}` is not a {expected} node")]
    NodeKindMismatch { name: String, expected: &'static str },
    #[error("tool `{0}` not found")]
    ToolNotFound(String),
    #[error("no tool directory attached to flow `{0}`")]
    NoToolDirectory(String),
    #[error("empty response from {0}")]
    EmptyResponse(String),
    #[error("flow validation failed with {} error(s)", .findings.len())]
    ValidationFailed { findings: Vec<ValidationFinding> },
    #[error("flow run `{0}` has already been started")]
    RunAlreadyStarted(String),
    #[error("flow `{0}` must be deployed before it can be invoked")]
    NotDeployed(String),
    #[error("schema scope of flow `{0}` outlived its owning flow")]
    SchemaScopeDetached(String),
    #[error("definition error: {0}")]
    Definition(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "http-client")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
