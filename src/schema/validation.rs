use serde_json::Value;

use super::error::SchemaError;
use super::schema::{JsonSchemaObject, JsonSchemaType, SchemaSlot};

/// 验证值是否符合 Schema
///
/// Expects an expanded schema. Reference slots that are still present are not
/// followed and accept any value.
pub fn validate_value(
    schema: &JsonSchemaObject,
    value: &Value,
    path: &mut Vec<String>,
) -> std::result::Result<(), SchemaError> {
    if let Some(alternatives) = &schema.any_of {
        let matched = alternatives.iter().any(|slot| match slot {
            SchemaSlot::Inline(inner) => validate_value(inner, value, &mut path.clone()).is_ok(),
            SchemaSlot::Ref(_) => true,
        });
        if !matched {
            return Err(SchemaError::validation(
                "value matches none of the allowed alternatives",
                path,
            ));
        }
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.contains(value) {
            return Err(SchemaError::validation(
                format!("value {value} is not one of the allowed values"),
                path,
            ));
        }
    }

    let Some(kind) = schema.schema_type else {
        return Ok(());
    };

    match kind {
        JsonSchemaType::Null => {
            if !value.is_null() {
                return Err(SchemaError::validation("expected null", path));
            }
        }
        JsonSchemaType::Boolean => {
            if !value.is_boolean() {
                return Err(SchemaError::validation("expected boolean", path));
            }
        }
        JsonSchemaType::Integer => {
            if !(value.is_i64() || value.is_u64()) {
                return Err(SchemaError::validation("expected integer", path));
            }
        }
        JsonSchemaType::Number => {
            if !value.is_number() {
                return Err(SchemaError::validation("expected number", path));
            }
        }
        JsonSchemaType::String => {
            if !value.is_string() {
                return Err(SchemaError::validation("expected string", path));
            }
        }
        JsonSchemaType::Array => {
            let array = value
                .as_array()
                .ok_or_else(|| SchemaError::validation("expected array", path))?;
            if let Some(SchemaSlot::Inline(items)) = schema.items.as_deref() {
                for (idx, element) in array.iter().enumerate() {
                    path.push(idx.to_string());
                    validate_value(items, element, path)?;
                    path.pop();
                }
            }
        }
        JsonSchemaType::Object => {
            let object = value
                .as_object()
                .ok_or_else(|| SchemaError::validation("expected object", path))?;

            for key in schema.required.iter().flatten() {
                if !object.contains_key(key) {
                    let mut required_path = path.clone();
                    required_path.push(key.clone());
                    return Err(SchemaError::Validation {
                        message: format!("missing required property `{}`", key),
                        path: required_path,
                    });
                }
            }

            if let Some(properties) = &schema.properties {
                for (key, val) in object {
                    if let Some(SchemaSlot::Inline(sub_schema)) = properties.get(key) {
                        path.push(key.clone());
                        validate_value(sub_schema, val, path)?;
                        path.pop();
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> JsonSchemaObject {
        JsonSchemaObject::object()
            .with_property("name", JsonSchemaObject::string())
            .with_property("age", JsonSchemaObject::integer())
            .with_property(
                "tier",
                JsonSchemaObject::string().with_enum([json!("gold"), json!("silver")]),
            )
            .with_required("name")
    }

    #[test]
    fn accepts_matching_object() {
        let value = json!({ "name": "Alice", "age": 30, "tier": "gold" });
        assert!(validate_value(&user_schema(), &value, &mut Vec::new()).is_ok());
    }

    #[test]
    fn reports_missing_required_property_with_path() {
        let error = validate_value(&user_schema(), &json!({ "age": 30 }), &mut Vec::new())
            .expect_err("name is required");
        assert_eq!(error.path().as_deref(), Some("name"));
    }

    #[test]
    fn rejects_value_outside_enum() {
        let value = json!({ "name": "Bob", "tier": "bronze" });
        assert!(validate_value(&user_schema(), &value, &mut Vec::new()).is_err());
    }

    #[test]
    fn nullable_union_accepts_null() {
        let schema = JsonSchemaObject::nullable(JsonSchemaObject::integer());
        assert!(validate_value(&schema, &json!(null), &mut Vec::new()).is_ok());
        assert!(validate_value(&schema, &json!(3), &mut Vec::new()).is_ok());
        assert!(validate_value(&schema, &json!("3"), &mut Vec::new()).is_err());
    }
}
