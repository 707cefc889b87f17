use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{OrchestrateError, Result};
use crate::flow::constants::metadata;
use crate::flow::types::Flow;
use crate::flow::validator::ValidationFinding;
use crate::runtime::{EventChannel, FlowEngine, FlowEvent, FlowRun, FlowRunHandlers, FlowRunSnapshot};
use crate::schema::{validate_value, JsonSchemaObject};

impl Flow {
    /// Runs the configured validation rules and stores their findings.
    pub fn validate_model(&mut self) -> &[ValidationFinding] {
        let findings = self.validator.validate_model(self);
        self.findings = findings;
        self.validated = true;
        &self.findings
    }

    /// Findings of the last validation pass.
    pub fn findings(&self) -> &[ValidationFinding] {
        &self.findings
    }

    /// 编译工作流
    ///
    /// One-way: a compiled flow rejects further mutation and a second
    /// compile. Any `Error` finding aborts compilation and leaves the flow
    /// untouched.
    pub fn compile(&mut self) -> Result<CompiledFlow> {
        self.check_compiled()?;
        if !self.validated {
            self.validate_model();
        }
        let errors: Vec<ValidationFinding> = self
            .findings
            .iter()
            .filter(|finding| finding.is_error())
            .cloned()
            .collect();
        if !errors.is_empty() {
            return Err(OrchestrateError::ValidationFailed { findings: errors });
        }

        let input_schema = match &self.spec.input_schema {
            Some(slot) => Some(self.with_table(|table| table.expand(slot))??),
            None => None,
        };

        let compiled_on = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.metadata
            .insert(metadata::COMPILED_ON.to_string(), compiled_on);
        let document = match self.to_json() {
            Ok(document) => document,
            Err(err) => {
                self.metadata.remove(metadata::COMPILED_ON);
                return Err(err);
            }
        };
        self.compiled = true;
        info!(flow = %self.spec.name, nodes = self.nodes.len(), edges = self.edges.len(), "flow compiled");

        Ok(CompiledFlow {
            name: self.spec.name.clone(),
            input_schema,
            document,
            deployment: None,
        })
    }

    /// `compile` followed by `deploy`.
    pub async fn compile_deploy(&mut self, engine: Arc<dyn FlowEngine>) -> Result<CompiledFlow> {
        let mut compiled = self.compile()?;
        compiled.deploy(engine).await?;
        Ok(compiled)
    }
}

#[derive(Clone)]
struct Deployment {
    flow_id: String,
    openapi: Value,
    engine: Arc<dyn FlowEngine>,
}

/// 已编译的工作流
///
/// Holds the frozen wire document. Invocation requires a prior `deploy`.
#[derive(Clone)]
pub struct CompiledFlow {
    name: String,
    input_schema: Option<JsonSchemaObject>,
    document: Value,
    deployment: Option<Deployment>,
}

impl CompiledFlow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn to_json(&self) -> Value {
        self.document.clone()
    }

    /// Input schema with every reference inlined.
    pub fn input_schema(&self) -> Option<&JsonSchemaObject> {
        self.input_schema.as_ref()
    }

    pub fn is_deployed(&self) -> bool {
        self.deployment.is_some()
    }

    /// OpenAPI-like description returned by the engine on deploy.
    pub fn openapi(&self) -> Option<&Value> {
        self.deployment.as_ref().map(|deployment| &deployment.openapi)
    }

    /// 部署到执行引擎
    pub async fn deploy(&mut self, engine: Arc<dyn FlowEngine>) -> Result<&Value> {
        let flow_id = self.name.clone();
        info!(flow = %flow_id, "deploying flow");
        let openapi = engine
            .create_update_flow_model(&flow_id, &self.document)
            .await?;
        let deployment = self.deployment.insert(Deployment {
            flow_id,
            openapi,
            engine,
        });
        Ok(&deployment.openapi)
    }

    pub fn validate_input(&self, input: &Value) -> Result<()> {
        if let Some(schema) = &self.input_schema {
            validate_value(schema, input, &mut Vec::new())?;
        }
        Ok(())
    }

    /// 启动一次运行
    ///
    /// Starts the run on the engine and consumes its events on a background
    /// task. The returned handle reflects the run state as events arrive.
    pub async fn invoke(
        &self,
        input: Value,
        events: Arc<dyn EventChannel>,
        handlers: FlowRunHandlers,
    ) -> Result<FlowRun> {
        let (run, records) = self.start_run(input, events, handlers).await?;
        let driver = run.clone();
        let task = tokio::spawn(async move { driver.consume(records).await });
        run.attach(task);
        Ok(run)
    }

    /// Like [`CompiledFlow::invoke`] but hands the event sequence to the
    /// caller. The stream ends after the terminal event.
    pub async fn invoke_events(
        &self,
        input: Value,
        events: Arc<dyn EventChannel>,
    ) -> Result<impl Stream<Item = (FlowEvent, FlowRunSnapshot)> + Send + 'static> {
        let (run, records) = self
            .start_run(input, events, FlowRunHandlers::default())
            .await?;
        Ok(run.events(records))
    }

    async fn start_run(
        &self,
        input: Value,
        events: Arc<dyn EventChannel>,
        handlers: FlowRunHandlers,
    ) -> Result<(FlowRun, futures::stream::BoxStream<'static, Result<String>>)> {
        let deployment = self
            .deployment
            .as_ref()
            .ok_or_else(|| OrchestrateError::NotDeployed(self.name.clone()))?;
        self.validate_input(&input)?;

        let instance_id = deployment
            .engine
            .start_flow(&deployment.flow_id, &input)
            .await?;
        if instance_id.is_empty() {
            return Err(OrchestrateError::EmptyResponse(format!(
                "start of flow `{}`",
                deployment.flow_id
            )));
        }
        debug!(flow = %deployment.flow_id, instance = %instance_id, "subscribing to run events");
        let records = events.subscribe(&instance_id).await?;

        let run = FlowRun::new(handlers);
        run.start(&instance_id)?;
        Ok((run, records))
    }
}

impl fmt::Debug for CompiledFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFlow")
            .field("name", &self.name)
            .field("deployed", &self.is_deployed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::flow::constants::{END, START};
    use crate::flow::factory::FlowFactory;
    use crate::flow::nodes::{NodeOptions, PromptNode};
    use crate::flow::validator::{FlowValidator, ValidationRule};

    struct RequireNodes;

    impl ValidationRule for RequireNodes {
        fn name(&self) -> &str {
            "require_nodes"
        }

        fn check(&self, flow: &Flow) -> Vec<ValidationFinding> {
            if flow.node_count() == 0 {
                vec![ValidationFinding::error("flow has no nodes")]
            } else {
                vec![ValidationFinding::warning("looks fine").on_node(START)]
            }
        }
    }

    fn flow() -> Flow {
        let mut flow = FlowFactory::create_flow(NodeOptions::named("summary")).unwrap();
        let node = flow
            .prompt(PromptNode::new().with_user_prompt("Summarize"), NodeOptions::named("summarize"))
            .unwrap();
        flow.sequence([START, node.as_str(), END]).unwrap();
        flow
    }

    #[test]
    fn compile_twice_fails_without_restamping() {
        let mut flow = flow();
        flow.compile().unwrap();
        let stamp = flow.metadata().get(metadata::COMPILED_ON).cloned();
        assert!(stamp.is_some());

        let err = flow.compile().unwrap_err();
        assert!(matches!(err, OrchestrateError::AlreadyCompiled(_)));
        assert!(flow.is_compiled());
        assert_eq!(flow.metadata().get(metadata::COMPILED_ON).cloned(), stamp);
    }

    #[test]
    fn error_findings_block_compile() {
        let validator = FlowValidator::new().with_rule(Arc::new(RequireNodes));
        let mut empty = FlowFactory::create_flow(NodeOptions::named("empty"))
            .unwrap()
            .with_validator(validator.clone());
        let err = empty.compile().unwrap_err();
        assert!(matches!(err, OrchestrateError::ValidationFailed { ref findings } if findings.len() == 1));
        assert!(!empty.is_compiled());
        assert!(empty.metadata().get(metadata::COMPILED_ON).is_none());

        let mut ok = flow().with_validator(validator);
        ok.compile().unwrap();
        assert_eq!(ok.findings().len(), 1);
    }

    #[test]
    fn input_is_checked_against_expanded_schema() {
        let mut flow = flow();
        flow.set_input_schema(
            JsonSchemaObject::object()
                .with_property("text", JsonSchemaObject::string())
                .with_required("text"),
        )
        .unwrap();
        let compiled = flow.compile().unwrap();
        assert_eq!(compiled.document()["input_schema"], json!({"$ref": "#/schemas/summary_input"}));
        compiled.validate_input(&json!({"text": "hello"})).unwrap();
        assert!(compiled.validate_input(&json!({})).is_err());
    }
}
