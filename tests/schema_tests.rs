use orchestrate::schema::{render_schema, SCHEMA_REF_PREFIX};
use orchestrate::{JsonSchemaObject, SchemaRef, SchemaSlot, SchemaTable};
use serde_json::json;

fn address() -> JsonSchemaObject {
    JsonSchemaObject::object()
        .with_title("Address")
        .with_property("street", JsonSchemaObject::string())
        .with_property("zip", JsonSchemaObject::string())
        .with_required("street")
}

fn customer() -> JsonSchemaObject {
    JsonSchemaObject::object()
        .with_title("Customer")
        .with_property("name", JsonSchemaObject::string())
        .with_property("address", address())
}

#[test]
fn equal_schemas_share_one_entry() {
    let mut table = SchemaTable::new();
    let first = table.add(&customer(), Some("Customer"));
    let size = table.len();

    // same structure, built independently
    let second = table.add(&customer().with_title("Customer"), Some("Customer"));
    assert_eq!(first, second);
    assert_eq!(table.len(), size);
}

#[test]
fn different_schemas_under_one_title_stay_resolvable() {
    let mut table = SchemaTable::new();
    let first = table.add_ref(&customer(), None).unwrap();
    let other = JsonSchemaObject::object()
        .with_title("Customer")
        .with_property("id", JsonSchemaObject::integer());
    let second = table.add_ref(&other, None).unwrap();

    assert_ne!(first.title(), second.title());
    assert!(table.resolve(&first).unwrap().properties.as_ref().unwrap().contains_key("address"));
    assert!(table.resolve(&second).unwrap().properties.as_ref().unwrap().contains_key("id"));

    let third = table.add_ref(&other, None).unwrap();
    assert_eq!(second, third);
}

#[test]
fn rendered_references_resolve_against_rendered_schemas() {
    let mut table = SchemaTable::new();
    let reference = table.add_ref(&customer(), None).unwrap();
    let rendered = table.render().unwrap();

    let path = reference.reference.strip_prefix(SCHEMA_REF_PREFIX).unwrap();
    let document = &rendered[path];
    assert_eq!(document["properties"]["address"], json!({"$ref": "#/schemas/Address"}));
    assert_eq!(
        rendered["Address"],
        render_schema(&address()).unwrap()
    );

    let expanded = table.expand(&SchemaSlot::from(reference)).unwrap();
    assert_eq!(expanded, customer());
}

#[test]
fn nullable_unions_fold_to_the_inner_schema() {
    let schema: JsonSchemaObject = serde_json::from_value(json!({
        "anyOf": [{"type": "string"}, {"type": "null"}]
    }))
    .unwrap();
    let mut table = SchemaTable::new();
    assert_eq!(table.add(&schema, Some("maybe")), JsonSchemaObject::string());
    assert!(table.is_empty());

    let listed: JsonSchemaObject =
        serde_json::from_value(json!({"type": ["integer", "null"]})).unwrap();
    assert_eq!(listed, JsonSchemaObject::integer());
}

#[test]
fn untitled_arrays_get_generated_titles() {
    let mut table = SchemaTable::new();
    let order = JsonSchemaObject::object()
        .with_title("Order")
        .with_property("lines", JsonSchemaObject::array(JsonSchemaObject::string()))
        .with_property("notes", JsonSchemaObject::array(JsonSchemaObject::string()));
    let entry = table.add(&order, None);

    let properties = entry.properties.unwrap();
    assert_eq!(properties["lines"], properties["notes"]);
    let generated = properties["lines"].as_reference().unwrap().title().to_string();
    assert!(generated.starts_with("bo_"));
    assert_eq!(table.len(), 2);
}

#[test]
fn primitives_cannot_be_referenced() {
    let mut table = SchemaTable::new();
    assert!(table.add_ref(&JsonSchemaObject::string(), Some("name")).is_err());
    assert_eq!(SchemaRef::to_title("Customer").reference, "#/schemas/Customer");
}
