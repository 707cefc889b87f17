use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::JsonSchemaObject;

/// Published description of a tool: its identity plus request/response shapes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<JsonSchemaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonSchemaObject>,
    /// How the engine reaches the tool (python entry point, openapi operation, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Value>,
}

impl ToolSpec {
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder::new(name)
    }
}

#[derive(Clone, Debug)]
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: ToolSpec {
                name: name.into(),
                display_name: None,
                description: None,
                input_schema: None,
                output_schema: None,
                binding: None,
            },
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.spec.display_name = Some(display_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }

    pub fn input_schema(mut self, schema: JsonSchemaObject) -> Self {
        self.spec.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: JsonSchemaObject) -> Self {
        self.spec.output_schema = Some(schema);
        self
    }

    pub fn binding(mut self, binding: Value) -> Self {
        self.spec.binding = Some(binding);
        self
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }
}
