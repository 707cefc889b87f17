// Schema 模块 - JSON Schema 模型、去重表和校验

mod error;
#[allow(clippy::module_inception)]
mod schema;
mod table;
mod validation;

pub use error::SchemaError;
pub use schema::{JsonSchemaObject, JsonSchemaType, SchemaRef, SchemaSlot};
pub use table::{render_schema, render_slot, SchemaScope, SchemaTable, SCHEMA_REF_PREFIX};
pub use validation::validate_value;
