use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::FlowDefinition;
use crate::error::Result;
use crate::flow::ValidationFinding;

/// One row of `tools list`.
#[derive(Clone, Debug, Serialize)]
pub struct ToolListEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

/// Loads a definition file and compiles it into its wire document.
pub fn compile_definition(path: &Path) -> Result<Value> {
    let mut flow = FlowDefinition::from_path(path)?.build()?;
    let compiled = flow.compile()?;
    Ok(compiled.to_json())
}

/// Loads a definition file and runs the flow validator without compiling.
pub fn validate_definition(path: &Path) -> Result<Vec<ValidationFinding>> {
    let mut flow = FlowDefinition::from_path(path)?.build()?;
    Ok(flow.validate_model().to_vec())
}

/// Tools declared by a definition file, in declaration order.
pub fn list_tools(path: &Path) -> Result<Vec<ToolListEntry>> {
    let registry = FlowDefinition::from_path(path)?.tool_registry();
    Ok(registry
        .list()
        .map(|spec| ToolListEntry {
            name: spec.name.clone(),
            display_name: spec.display_name.clone().unwrap_or_else(|| spec.name.clone()),
            description: spec.description.clone().unwrap_or_default(),
        })
        .collect())
}

pub fn render_document(document: &Value, pretty: bool) -> Result<String> {
    let content = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    Ok(content)
}
