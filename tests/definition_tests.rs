use std::fs;
use std::path::PathBuf;

use orchestrate::cli::{compile_definition, list_tools, render_document, validate_definition};
use orchestrate::flow::constants::metadata;
use orchestrate::{FlowDefinition, OrchestrateError, END, START};
use serde_json::{json, Value};
use tempfile::TempDir;

const TRIAGE_YAML: &str = r#"
name: ticket_triage
display_name: Ticket triage
input_schema:
  type: object
  properties:
    text: { type: string }
  required: [text]
tools:
  - name: classify
    display_name: Classify ticket
    description: Labels a support ticket
    input_schema:
      type: object
      properties:
        text: { type: string }
    output_schema:
      type: object
      title: Classification
      properties:
        label: { type: string }
  - name: refund
    input_schema:
      type: object
      properties:
        order_id: { type: string }
nodes:
  - id: classify
    type: tool
    input_map:
      maps:
        - { target: text, source: flow.input.text }
  - id: route
    type: branch
    config:
      evaluator: classify.output.label
      cases:
        billing: issue_refund
        other: reply
      default: END
  - id: issue_refund
    type: tool
    config:
      tool: refund
  - id: reply
    type: prompt
    config:
      user_prompt: ["Answer the ticket"]
edges:
  - { from: START, to: classify }
  - { from: classify, to: route }
  - { from: issue_refund, to: END }
  - { from: reply, to: END }
"#;

fn write(dir: &TempDir, file: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(file);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn yaml_definition_compiles_to_a_wire_document() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "triage.yaml", TRIAGE_YAML);

    let doc = compile_definition(&path).unwrap();
    assert_eq!(doc["name"], "ticket_triage");
    assert_eq!(doc["metadata"][metadata::SOURCE_KIND], metadata::SOURCE_DEFINITION);
    assert!(doc["metadata"][metadata::COMPILED_ON].is_string());

    let nodes = doc["nodes"].as_object().unwrap();
    for name in ["classify", "route", "issue_refund", "reply", START, END] {
        assert!(nodes.contains_key(name), "missing node {name}");
    }
    assert_eq!(nodes["classify"]["spec"]["display_name"], "Classify ticket");
    assert_eq!(
        nodes["classify"]["spec"]["output_schema"],
        json!({"$ref": "#/schemas/Classification"})
    );
    assert_eq!(nodes["issue_refund"]["spec"]["tool"], "refund");
    assert_eq!(
        nodes["route"]["spec"]["cases"],
        json!({"billing": "issue_refund", "other": "reply", "__default__": END})
    );
    assert_eq!(
        nodes["classify"]["input_map"]["maps"][0],
        json!({"target": "text", "source": "flow.input.text"})
    );

    // 4 declared edges plus one per branch case
    assert_eq!(doc["edges"].as_array().unwrap().len(), 7);
    let schemas = doc["schemas"].as_object().unwrap();
    assert!(schemas.contains_key("Classification"));
    assert!(schemas.contains_key("issue_refund_input"));
    assert_eq!(doc["input_schema"], json!({"$ref": "#/schemas/ticket_triage_input"}));
}

#[test]
fn json_and_yaml_definitions_agree() {
    let dir = TempDir::new().unwrap();
    let definition = FlowDefinition::from_yaml_str(TRIAGE_YAML).unwrap();
    let json_path = write(&dir, "triage.json", &serde_json::to_string(&definition).unwrap());
    let yaml_path = write(&dir, "triage.yml", TRIAGE_YAML);

    let mut from_json = compile_definition(&json_path).unwrap();
    let mut from_yaml = compile_definition(&yaml_path).unwrap();
    for doc in [&mut from_json, &mut from_yaml] {
        doc["metadata"]
            .as_object_mut()
            .unwrap()
            .remove(metadata::COMPILED_ON);
    }
    assert_eq!(from_json, from_yaml);
}

#[test]
fn tools_are_listed_in_declaration_order() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "triage.yaml", TRIAGE_YAML);

    let tools = list_tools(&path).unwrap();
    let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, ["classify", "refund"]);
    assert_eq!(tools[0].display_name, "Classify ticket");
    assert_eq!(tools[1].display_name, "refund");
    assert_eq!(tools[1].description, "");
}

#[test]
fn definitions_without_rules_have_no_findings() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "triage.yaml", TRIAGE_YAML);
    assert!(validate_definition(&path).unwrap().is_empty());
}

#[test]
fn broken_definitions_report_what_is_wrong() {
    let dir = TempDir::new().unwrap();

    let undeclared = write(
        &dir,
        "undeclared.json",
        r#"{"name": "lookup", "nodes": [{"id": "search", "type": "tool"}]}"#,
    );
    assert!(matches!(
        compile_definition(&undeclared).unwrap_err(),
        OrchestrateError::ToolNotFound(name) if name == "search"
    ));

    let dangling = write(
        &dir,
        "dangling.json",
        r#"{
            "name": "dangling",
            "nodes": [{"id": "ask", "type": "prompt"}],
            "edges": [{"from": "ask", "to": "nowhere"}]
        }"#,
    );
    assert!(matches!(
        compile_definition(&dangling).unwrap_err(),
        OrchestrateError::UnknownNode(name) if name == "nowhere"
    ));

    let backwards = write(
        &dir,
        "backwards.json",
        r#"{
            "name": "backwards",
            "nodes": [{"id": "ask", "type": "prompt"}],
            "edges": [{"from": "END", "to": "ask"}]
        }"#,
    );
    assert!(matches!(
        compile_definition(&backwards).unwrap_err(),
        OrchestrateError::InvalidEdge { .. }
    ));

    let malformed = write(&dir, "malformed.yaml", "name: [unterminated");
    assert!(matches!(
        compile_definition(&malformed).unwrap_err(),
        OrchestrateError::Yaml(_)
    ));

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        compile_definition(&missing).unwrap_err(),
        OrchestrateError::Io(_)
    ));
}

#[test]
fn rendered_documents_parse_back() {
    let doc = json!({"name": "f", "nodes": {}});
    let compact = render_document(&doc, false).unwrap();
    let pretty = render_document(&doc, true).unwrap();
    assert!(!compact.contains('\n'));
    assert!(pretty.contains('\n'));
    assert_eq!(serde_json::from_str::<Value>(&pretty).unwrap(), doc);
}
