use crate::error::{OrchestrateError, Result};
use crate::flow::nodes::{NodeOptions, NodeSpec};
use crate::flow::types::Flow;
use crate::utils::{sanitize_identifier, ConfigValidator};

/// Flow 工厂
pub struct FlowFactory;

impl FlowFactory {
    /// Creates an outermost flow, which owns a fresh schema table.
    ///
    /// The name comes from `options.name`, else the sanitized display name.
    pub fn create_flow(options: NodeOptions) -> Result<Flow> {
        let name = options
            .name
            .clone()
            .or_else(|| options.display_name.as_deref().map(sanitize_identifier))
            .ok_or_else(|| OrchestrateError::Definition("a flow needs a name".to_string()))?;
        ConfigValidator::validate_flow_name(&name)?;

        let spec = NodeSpec {
            display_name: options.display_name.clone().unwrap_or_else(|| name.clone()),
            name,
            description: options.description.clone(),
            input_schema: None,
            output_schema: None,
            metadata: options.metadata.clone(),
        };
        let mut flow = Flow::root(spec);
        if let Some(schema) = options.input_schema {
            flow.set_input_schema(schema)?;
        }
        if let Some(schema) = options.output_schema {
            flow.set_output_schema(schema)?;
        }
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::constants::metadata;
    use crate::schema::JsonSchemaObject;

    #[test]
    fn creates_root_flows() {
        let flow = FlowFactory::create_flow(
            NodeOptions::new()
                .with_display_name("Order intake")
                .with_output_schema(JsonSchemaObject::object().with_property("id", JsonSchemaObject::string())),
        )
        .unwrap();
        assert_eq!(flow.name(), "Order_intake");
        assert!(flow.owns_schemas());
        assert_eq!(
            flow.metadata().get(metadata::SOURCE_KIND).map(String::as_str),
            Some(metadata::SOURCE_SDK)
        );
        assert!(flow.schemas().unwrap().contains("Order_intake_output"));
    }

    #[test]
    fn rejects_missing_or_long_names() {
        assert!(FlowFactory::create_flow(NodeOptions::new()).is_err());
        assert!(FlowFactory::create_flow(NodeOptions::named("x".repeat(101))).is_err());
    }
}
