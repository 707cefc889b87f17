use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestrateError, Result};
use crate::flow::constants::metadata;
use crate::flow::nodes::{FlowNode, NodeSpec};
use crate::flow::validator::{FlowValidator, ValidationFinding};
use crate::schema::{SchemaScope, SchemaTable};
use crate::tools::ToolDirectory;

/// Flow 核心类型定义

/// Directed edge between two registered nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowEdge {
    pub start: String,
    pub end: String,
}

/// Name of a node registered in a flow, returned by every builder call.
///
/// The graph stores its own copy of the node; configure it through the flow
/// using this handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub(crate) String);

impl NodeHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a flow is the body of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowBodyKind {
    Flow,
    Loop,
    Foreach,
    UserFlow,
}

/// Flow 工作流
///
/// A graph of nodes plus edges. A flow is itself usable as a node, and loop,
/// foreach and user-flow nodes carry a nested flow as their body. Only the
/// outermost flow owns a schema table; bodies write into it. Cloning an
/// outermost flow copies its table, and the clone's bodies write into the copy.
pub struct Flow {
    pub(crate) spec: NodeSpec,
    pub(crate) body_kind: FlowBodyKind,
    pub(crate) owners: Vec<String>,
    pub(crate) nodes: HashMap<String, FlowNode>,
    pub(crate) edges: Vec<FlowEdge>,
    pub(crate) scope: SchemaScope,
    pub(crate) tools: Option<Arc<dyn ToolDirectory>>,
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) validator: FlowValidator,
    pub(crate) findings: Vec<ValidationFinding>,
    pub(crate) compiled: bool,
    pub(crate) validated: bool,
}

impl Flow {
    pub(crate) fn root(spec: NodeSpec) -> Self {
        let mut flow_metadata = BTreeMap::new();
        flow_metadata.insert(
            metadata::SOURCE_KIND.to_string(),
            metadata::SOURCE_SDK.to_string(),
        );
        Self {
            spec,
            body_kind: FlowBodyKind::Flow,
            owners: Vec::new(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            scope: SchemaScope::root(),
            tools: None,
            metadata: flow_metadata,
            validator: FlowValidator::default(),
            findings: Vec::new(),
            compiled: false,
            validated: false,
        }
    }

    /// Body flow sharing this flow's schema table and tool directory.
    pub(crate) fn nested(&self, spec: NodeSpec, body_kind: FlowBodyKind) -> Self {
        Self {
            spec,
            body_kind,
            owners: Vec::new(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            scope: self.scope.child(),
            tools: self.tools.clone(),
            metadata: BTreeMap::new(),
            validator: FlowValidator::default(),
            findings: Vec::new(),
            compiled: false,
            validated: false,
        }
    }

    pub fn with_tool_directory(mut self, tools: Arc<dyn ToolDirectory>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_validator(mut self, validator: FlowValidator) -> Self {
        self.validator = validator;
        self.validated = false;
        self
    }

    pub fn with_source_kind(mut self, source_kind: impl Into<String>) -> Self {
        self.metadata
            .insert(metadata::SOURCE_KIND.to_string(), source_kind.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn body_kind(&self) -> FlowBodyKind {
        self.body_kind
    }

    /// Owners of a user-flow body; empty for every other flow.
    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    pub fn node(&self, name: &str) -> Option<&FlowNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Whether this flow owns the schema table (true only for the outermost flow).
    pub fn owns_schemas(&self) -> bool {
        self.scope.is_owner()
    }

    /// Snapshot of the shared schema table.
    pub fn schemas(&self) -> Result<SchemaTable> {
        let table = self
            .scope
            .table()
            .ok_or_else(|| OrchestrateError::SchemaScopeDetached(self.spec.name.clone()))?;
        let snapshot = table.read().clone();
        Ok(snapshot)
    }

    pub(crate) fn with_table<R>(&self, f: impl FnOnce(&mut SchemaTable) -> R) -> Result<R> {
        let table = self
            .scope
            .table()
            .ok_or_else(|| OrchestrateError::SchemaScopeDetached(self.spec.name.clone()))?;
        let mut guard = table.write();
        Ok(f(&mut guard))
    }

    /// Points every nested body, at any depth, at `scope`.
    fn rebind_bodies(&mut self, scope: &SchemaScope) {
        for node in self.nodes.values_mut() {
            if let Some(body) = node.body_mut() {
                body.scope = scope.clone();
                body.rebind_bodies(scope);
            }
        }
    }

    pub(crate) fn check_compiled(&self) -> Result<()> {
        if self.compiled {
            return Err(OrchestrateError::AlreadyCompiled(self.spec.name.clone()));
        }
        Ok(())
    }
}

impl Clone for Flow {
    fn clone(&self) -> Self {
        let mut flow = Self {
            spec: self.spec.clone(),
            body_kind: self.body_kind,
            owners: self.owners.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            scope: self.scope.detached(),
            tools: self.tools.clone(),
            metadata: self.metadata.clone(),
            validator: self.validator.clone(),
            findings: self.findings.clone(),
            compiled: self.compiled,
            validated: self.validated,
        };
        if flow.scope.is_owner() {
            let child = flow.scope.child();
            flow.rebind_bodies(&child);
        }
        flow
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.spec.name)
            .field("body_kind", &self.body_kind)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("owns_schemas", &self.scope.is_owner())
            .field("has_tool_directory", &self.tools.as_ref().map(|_| true))
            .field("compiled", &self.compiled)
            .finish()
    }
}
