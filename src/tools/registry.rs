use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::tools::spec::ToolSpec;

/// Lookup of published tool specifications by name.
///
/// A successful lookup may return zero specs; callers decide whether that is an error.
pub trait ToolDirectory: Send + Sync {
    fn get_draft_by_name(&self, name: &str) -> Result<Vec<ToolSpec>>;
}

/// Tools discovered during one import session.
///
/// Created when a session starts, filled as tool definitions are read, handed
/// to the flows that need it and dropped with the session.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolSpec>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers `spec`, replacing an earlier spec with the same name.
    pub fn register(&mut self, spec: ToolSpec) {
        let name = spec.name.clone();
        if self.tools.insert(name.clone(), Arc::new(spec)).is_some() {
            warn!(tool = %name, "tool registered twice, keeping the latest spec");
        } else {
            debug!(tool = %name, "tool registered");
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs in registration order.
    pub fn list(&self) -> impl Iterator<Item = &ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|spec| spec.as_ref()))
    }

    /// Consumes the session, yielding its specs in registration order.
    pub fn into_specs(self) -> Vec<ToolSpec> {
        let mut tools = self.tools;
        self.order
            .into_iter()
            .filter_map(|name| tools.remove(&name))
            .map(|spec| Arc::try_unwrap(spec).unwrap_or_else(|shared| (*shared).clone()))
            .collect()
    }
}

impl ToolDirectory for ToolRegistry {
    fn get_draft_by_name(&self, name: &str) -> Result<Vec<ToolSpec>> {
        Ok(self
            .tools
            .get(name)
            .map(|spec| vec![spec.as_ref().clone()])
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JsonSchemaObject;

    fn lookup_spec() -> ToolSpec {
        ToolSpec::builder("lookup_customer")
            .description("Find a customer by id")
            .input_schema(JsonSchemaObject::object().with_property("id", JsonSchemaObject::string()))
            .build()
    }

    #[test]
    fn lookup_returns_registered_spec() {
        let mut registry = ToolRegistry::new();
        registry.register(lookup_spec());
        let found = registry.get_draft_by_name("lookup_customer").unwrap();
        assert_eq!(found, vec![lookup_spec()]);
        assert!(registry.get_draft_by_name("missing").unwrap().is_empty());
    }

    #[test]
    fn re_registration_keeps_order_and_latest_spec() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::builder("a").build());
        registry.register(ToolSpec::builder("b").build());
        registry.register(ToolSpec::builder("a").description("second").build());

        let names: Vec<_> = registry.list().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let specs = registry.into_specs();
        assert_eq!(specs[0].description.as_deref(), Some("second"));
    }
}
