use thiserror::Error;

/// Schema 错误类型
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema reference `{0}` does not resolve")]
    Unresolved(String),
    #[error("cannot reference a non-complex schema `{0}`")]
    NonComplex(String),
    #[error("schema validation failed: {message}")]
    Validation { message: String, path: Vec<String> },
}

impl SchemaError {
    pub(crate) fn validation(message: impl Into<String>, path: &[String]) -> Self {
        SchemaError::Validation {
            message: message.into(),
            path: path.to_vec(),
        }
    }

    /// Dotted location of a validation failure, empty for the document root.
    pub fn path(&self) -> Option<String> {
        match self {
            SchemaError::Validation { path, .. } => Some(path.join(".")),
            _ => None,
        }
    }
}
