use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use orchestrate::{
    CompiledFlow, FlowContext, FlowEvent, FlowEventKind, FlowFactory, FlowRun, FlowRunHandlers,
    FlowRunStatus, JsonSchemaObject, MemoryEventChannel, MemoryFlowEngine, NodeOptions,
    OrchestrateError, PromptNode,
};
use serde_json::json;

fn summarize_flow() -> CompiledFlow {
    let mut flow = FlowFactory::create_flow(NodeOptions::named("summarize").with_input_schema(
        JsonSchemaObject::object()
            .with_property("text", JsonSchemaObject::string())
            .with_required("text"),
    ))
    .unwrap();
    let node = flow
        .prompt(
            PromptNode::new().with_user_prompt("Summarize {text}"),
            NodeOptions::named("summary"),
        )
        .unwrap();
    flow.starts_and_ends_with(&node).unwrap();
    flow.compile().unwrap()
}

fn event(kind: FlowEventKind) -> FlowEvent {
    FlowEvent::new(kind, FlowContext::default())
}

#[test]
fn a_run_starts_once() {
    let run = FlowRun::new(FlowRunHandlers::default());
    assert_eq!(run.status(), FlowRunStatus::NotStarted);
    run.start("instance-1").unwrap();
    assert_eq!(run.id().as_deref(), Some("instance-1"));

    let err = run.start("instance-2").unwrap_err();
    assert!(matches!(err, OrchestrateError::RunAlreadyStarted(id) if id == "instance-1"));
    assert_eq!(run.id().as_deref(), Some("instance-1"));
}

#[test]
fn interruptions_resume_and_terminal_states_stick() {
    let run = FlowRun::new(FlowRunHandlers::default());
    run.start("instance").unwrap();

    assert_eq!(run.apply(&event(FlowEventKind::OnTaskWait)).status, FlowRunStatus::Interrupted);
    assert_eq!(run.apply(&event(FlowEventKind::OnTaskEnd)).status, FlowRunStatus::InProgress);
    assert_eq!(run.apply(&event(FlowEventKind::Unknown)).status, FlowRunStatus::InProgress);

    let failed = run.apply(&event(FlowEventKind::OnFlowError).with_error(json!({"code": 500})));
    assert_eq!(failed.status, FlowRunStatus::Failed);
    assert_eq!(failed.error, Some(json!({"code": 500})));

    let after = run.apply(&event(FlowEventKind::OnFlowEnd));
    assert_eq!(after.status, FlowRunStatus::Failed);
    assert_eq!(after.events, failed.events);
}

#[tokio::test]
async fn undeployed_flows_cannot_be_invoked() {
    let compiled = summarize_flow();
    let err = compiled
        .invoke(
            json!({"text": "hello"}),
            Arc::new(MemoryEventChannel::new()),
            FlowRunHandlers::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrateError::NotDeployed(name) if name == "summarize"));
}

#[tokio::test]
async fn deploy_stores_model_and_description() {
    let engine = Arc::new(MemoryFlowEngine::new());
    let mut compiled = summarize_flow();
    assert!(compiled.openapi().is_none());

    let openapi = compiled.deploy(engine.clone()).await.unwrap().clone();
    assert!(openapi["paths"].get("/v1/flows/summarize/runs").is_some());
    assert!(compiled.is_deployed());
    assert_eq!(compiled.openapi(), Some(&openapi));
    assert_eq!(engine.model("summarize").as_ref(), Some(compiled.document()));
}

#[tokio::test]
async fn invalid_input_never_reaches_the_engine() {
    let engine = Arc::new(MemoryFlowEngine::new());
    let mut compiled = summarize_flow();
    compiled.deploy(engine.clone()).await.unwrap();

    let result = compiled
        .invoke(
            json!({"text": 42}),
            Arc::new(MemoryEventChannel::new()),
            FlowRunHandlers::default(),
        )
        .await;
    assert!(result.is_err());
    assert!(engine.runs().is_empty());
}

#[tokio::test]
async fn invoke_tracks_published_events_until_done() {
    let engine = Arc::new(MemoryFlowEngine::new());
    let channel = Arc::new(MemoryEventChannel::new());
    let mut compiled = summarize_flow();
    compiled.deploy(engine.clone()).await.unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let handlers = {
        let done = done.clone();
        let failed = failed.clone();
        FlowRunHandlers::new()
            .on_done(move |_| {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                failed.fetch_add(1, Ordering::SeqCst);
            })
    };

    let run = compiled
        .invoke(json!({"text": "a long story"}), channel.clone(), handlers)
        .await
        .unwrap();
    let instance = run.id().unwrap();
    assert_eq!(engine.runs()[0].instance_id, instance);
    assert_eq!(engine.runs()[0].input, json!({"text": "a long story"}));

    let context = FlowContext::for_instance(instance.as_str());
    channel
        .publish(&instance, &FlowEvent::new(FlowEventKind::OnFlowStart, context.clone()))
        .unwrap();
    channel
        .publish(
            &instance,
            &FlowEvent::new(FlowEventKind::OnTaskStart, context.clone().with_node("summary")),
        )
        .unwrap();
    channel.publish_raw(&instance, "not an event").unwrap();
    channel
        .publish(
            &instance,
            &FlowEvent::new(
                FlowEventKind::OnFlowEnd,
                context.with_data(json!({"summary": "short"})),
            ),
        )
        .unwrap();
    channel.close(&instance);

    let snapshot = run.wait().await.unwrap();
    assert_eq!(snapshot.status, FlowRunStatus::Completed);
    assert_eq!(snapshot.output, Some(json!({"summary": "short"})));
    assert_eq!(snapshot.events, 3);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(failed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invoke_events_streams_until_the_terminal_event() {
    let engine = Arc::new(MemoryFlowEngine::new());
    let channel = Arc::new(
        MemoryEventChannel::scripted(&[
            event(FlowEventKind::OnFlowStart),
            event(FlowEventKind::OnTaskStream),
            event(FlowEventKind::OnFlowError).with_error(json!("model unavailable")),
            event(FlowEventKind::OnFlowEnd),
        ])
        .unwrap(),
    );
    let mut compiled = summarize_flow();
    compiled.deploy(engine).await.unwrap();

    let seen: Vec<_> = compiled
        .invoke_events(json!({"text": "hi"}), channel)
        .await
        .unwrap()
        .collect()
        .await;

    let statuses: Vec<_> = seen.iter().map(|(_, snapshot)| snapshot.status).collect();
    assert_eq!(
        statuses,
        vec![
            FlowRunStatus::InProgress,
            FlowRunStatus::Interrupted,
            FlowRunStatus::Failed,
        ]
    );
    let (last, snapshot) = seen.last().unwrap();
    assert_eq!(last.kind, FlowEventKind::OnFlowError);
    assert_eq!(snapshot.error, Some(json!("model unavailable")));
}

#[test]
fn engine_records_parse_in_either_case() {
    let lower = FlowEvent::parse(r#"{"kind": "on_task_wait"}"#).unwrap();
    let upper = FlowEvent::parse(r#"{"kind": "ON_TASK_WAIT"}"#).unwrap();
    assert_eq!(lower.kind, upper.kind);
    assert!(lower.kind.is_interrupting());

    let unknown = FlowEvent::parse(r#"{"kind": "on_agent_thought"}"#).unwrap();
    assert_eq!(unknown.kind, FlowEventKind::Unknown);
}
