use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::table::SCHEMA_REF_PREFIX;

/// Schema 类型枚举
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JsonSchemaType {
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Null,
}

impl JsonSchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonSchemaType::Object => "object",
            JsonSchemaType::String => "string",
            JsonSchemaType::Number => "number",
            JsonSchemaType::Integer => "integer",
            JsonSchemaType::Boolean => "boolean",
            JsonSchemaType::Array => "array",
            JsonSchemaType::Null => "null",
        }
    }

    /// Only objects and arrays are kept in a schema table.
    pub fn is_complex(&self) -> bool {
        matches!(self, JsonSchemaType::Object | JsonSchemaType::Array)
    }
}

/// `type` may arrive as a list of types; the first entry wins.
fn deserialize_type<'de, D>(deserializer: D) -> Result<Option<JsonSchemaType>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TypeField {
        One(JsonSchemaType),
        Many(Vec<JsonSchemaType>),
    }

    Ok(match Option::<TypeField>::deserialize(deserializer)? {
        None => None,
        Some(TypeField::One(kind)) => Some(kind),
        Some(TypeField::Many(kinds)) => kinds.into_iter().next(),
    })
}

/// Pointer to a tabled schema, rendered as `{"$ref": "#/schemas/<title>"}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl SchemaRef {
    pub fn to_title(title: &str) -> Self {
        Self {
            reference: format!("{SCHEMA_REF_PREFIX}{title}"),
        }
    }

    /// Last path segment of the reference.
    pub fn title(&self) -> &str {
        self.reference
            .rsplit('/')
            .next()
            .unwrap_or(self.reference.as_str())
    }

    pub fn is_local(&self) -> bool {
        self.reference.starts_with(SCHEMA_REF_PREFIX)
    }

    /// Rewrites foreign paths such as `#/definitions/Customer` into the table prefix.
    pub fn localized(&self) -> Self {
        if self.is_local() {
            self.clone()
        } else {
            Self::to_title(self.title())
        }
    }
}

/// A schema position that holds either an inline schema or a reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SchemaSlot {
    Ref(SchemaRef),
    Inline(Box<JsonSchemaObject>),
}

impl SchemaSlot {
    pub fn as_reference(&self) -> Option<&SchemaRef> {
        match self {
            SchemaSlot::Ref(reference) => Some(reference),
            SchemaSlot::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&JsonSchemaObject> {
        match self {
            SchemaSlot::Inline(schema) => Some(schema),
            SchemaSlot::Ref(_) => None,
        }
    }
}

impl From<JsonSchemaObject> for SchemaSlot {
    fn from(schema: JsonSchemaObject) -> Self {
        SchemaSlot::Inline(Box::new(schema))
    }
}

impl From<SchemaRef> for SchemaSlot {
    fn from(reference: SchemaRef) -> Self {
        SchemaSlot::Ref(reference)
    }
}

/// JSON-Schema-like structural type.
///
/// Unset fields are skipped on serialization, so derived equality matches a
/// comparison of the "exclude unset" dumps of two schemas.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct JsonSchemaObject {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "deserialize_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_type: Option<JsonSchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<BTreeSet<String>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "anyOf", default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaSlot>>,
    #[serde(rename = "aliasName", default, skip_serializing_if = "Option::is_none")]
    pub alias_name: Option<String>,
    /// Extension keywords carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JsonSchemaObject {
    pub fn new(schema_type: JsonSchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        let mut schema = Self::new(JsonSchemaType::Object);
        schema.properties = Some(BTreeMap::new());
        schema
    }

    pub fn array(items: impl Into<SchemaSlot>) -> Self {
        let mut schema = Self::new(JsonSchemaType::Array);
        schema.items = Some(Box::new(items.into()));
        schema
    }

    pub fn string() -> Self {
        Self::new(JsonSchemaType::String)
    }

    pub fn integer() -> Self {
        Self::new(JsonSchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::new(JsonSchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(JsonSchemaType::Boolean)
    }

    pub fn null() -> Self {
        Self::new(JsonSchemaType::Null)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: impl Into<SchemaSlot>) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema.into());
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
        self
    }

    pub fn with_enum<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_alias_name(mut self, alias: impl Into<String>) -> Self {
        self.alias_name = Some(alias.into());
        self
    }

    pub fn nullable(inner: impl Into<SchemaSlot>) -> Self {
        Self {
            any_of: Some(vec![inner.into(), Self::null().into()]),
            ..Self::default()
        }
    }

    pub fn is_complex(&self) -> bool {
        self.schema_type.map(|kind| kind.is_complex()).unwrap_or(false)
    }

    pub fn is_null(&self) -> bool {
        self.schema_type == Some(JsonSchemaType::Null)
    }

    /// Folds `anyOf: [X, null]` into `X`, recursively through properties and items.
    ///
    /// The outer title/description/default win over the folded alternative's.
    pub fn normalized(&self) -> JsonSchemaObject {
        let mut schema = self.clone();

        if schema.schema_type.is_none() {
            if let Some(alternatives) = &schema.any_of {
                let non_null: Vec<&SchemaSlot> = alternatives
                    .iter()
                    .filter(|slot| !matches!(slot, SchemaSlot::Inline(inner) if inner.is_null()))
                    .collect();
                if non_null.len() == 1 && alternatives.len() == 2 {
                    if let SchemaSlot::Inline(inner) = non_null[0] {
                        let mut folded = inner.normalized();
                        folded.title = schema.title.take().or(folded.title);
                        folded.description = schema.description.take().or(folded.description);
                        folded.default = schema.default.take().or(folded.default);
                        return folded;
                    }
                }
            }
        }

        if let Some(properties) = schema.properties.as_mut() {
            for slot in properties.values_mut() {
                if let SchemaSlot::Inline(inner) = slot {
                    **inner = inner.normalized();
                }
            }
        }
        if let Some(items) = schema.items.as_mut() {
            if let SchemaSlot::Inline(inner) = items.as_mut() {
                **inner = inner.normalized();
            }
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_valued_type_takes_first_entry() {
        let schema: JsonSchemaObject =
            serde_json::from_value(json!({ "type": ["string", "null"] })).unwrap();
        assert_eq!(schema.schema_type, Some(JsonSchemaType::String));
    }

    #[test]
    fn dollar_ref_parses_as_reference_slot() {
        let schema: JsonSchemaObject = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "owner": { "$ref": "#/definitions/Customer" },
                "count": { "type": "integer" }
            }
        }))
        .unwrap();
        let properties = schema.properties.unwrap();
        let owner = properties["owner"].as_reference().expect("owner should be a reference");
        assert_eq!(owner.title(), "Customer");
        assert!(!owner.is_local());
        assert_eq!(owner.localized().reference, "#/schemas/Customer");
        assert!(properties["count"].as_inline().is_some());
    }

    #[test]
    fn nullable_union_folds_to_inner_type() {
        let schema = JsonSchemaObject::nullable(JsonSchemaObject::integer())
            .with_description("optional count");
        let folded = schema.normalized();
        assert_eq!(folded.schema_type, Some(JsonSchemaType::Integer));
        assert_eq!(folded.description.as_deref(), Some("optional count"));
        assert!(folded.any_of.is_none());
    }

    #[test]
    fn extension_keywords_survive_serialization() {
        let value = json!({ "type": "string", "x-ui-widget": "textarea" });
        let schema: JsonSchemaObject = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&schema).unwrap(), value);
    }
}
