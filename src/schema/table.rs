use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::SchemaError;
use super::schema::{JsonSchemaObject, SchemaRef, SchemaSlot};
use crate::utils::naming::sanitize_identifier;

pub const SCHEMA_REF_PREFIX: &str = "#/schemas/";
const GENERATED_TITLE_PREFIX: &str = "bo_";

/// Title-keyed registry of object and array schemas shared by a flow tree.
///
/// Nested complex schemas are tabled first and replaced by references, so
/// every entry holds at most one level of inline structure.
#[derive(Clone, Debug, Default)]
pub struct SchemaTable {
    schemas: BTreeMap<String, JsonSchemaObject>,
    renamed: HashMap<String, Vec<String>>,
    generated: Vec<String>,
    sequence: u64,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&JsonSchemaObject> {
        self.schemas.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.schemas.contains_key(title)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonSchemaObject)> {
        self.schemas.iter()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Tables `schema` and returns the canonical entry.
    ///
    /// Primitive schemas come back unchanged and are never tabled.
    pub fn add(&mut self, schema: &JsonSchemaObject, title: Option<&str>) -> JsonSchemaObject {
        let schema = schema.normalized();
        if !schema.is_complex() {
            return schema;
        }

        let explicit = title
            .map(str::to_string)
            .or_else(|| schema.title.clone())
            .or_else(|| schema.alias_name.clone())
            .map(|name| sanitize_identifier(&name));

        let candidate = self.table_children(schema);
        match explicit {
            Some(base) => self.insert_titled(candidate, base),
            None => self.insert_generated(candidate),
        }
    }

    /// Tables `schema` and returns a reference to its entry.
    pub fn add_ref(
        &mut self,
        schema: &JsonSchemaObject,
        title: Option<&str>,
    ) -> std::result::Result<SchemaRef, SchemaError> {
        if !schema.normalized().is_complex() {
            let name = title
                .map(str::to_string)
                .or_else(|| schema.title.clone())
                .unwrap_or_else(|| "<untitled>".to_string());
            return Err(SchemaError::NonComplex(name));
        }
        let entry = self.add(schema, title);
        let entry_title = entry.title.as_deref().unwrap_or_default();
        Ok(SchemaRef::to_title(entry_title))
    }

    fn insert_titled(&mut self, mut candidate: JsonSchemaObject, base: String) -> JsonSchemaObject {
        candidate.title = Some(base.clone());
        let Some(existing) = self.schemas.get(&base) else {
            return self.insert(base, candidate);
        };
        if *existing == candidate {
            debug!(title = %base, "schema table hit");
            return existing.clone();
        }

        if let Some(variants) = self.renamed.get(&base) {
            for variant in variants {
                candidate.title = Some(variant.clone());
                if let Some(existing) = self.schemas.get(variant) {
                    if *existing == candidate {
                        debug!(title = %variant, "schema table hit on renamed entry");
                        return existing.clone();
                    }
                }
            }
        }

        let renamed = loop {
            let name = format!("{}_{}", base, self.next_sequence());
            if !self.schemas.contains_key(&name) {
                break name;
            }
        };
        debug!(title = %base, renamed = %renamed, "schema title collision");
        self.renamed.entry(base).or_default().push(renamed.clone());
        candidate.title = Some(renamed.clone());
        self.insert(renamed, candidate)
    }

    fn insert_generated(&mut self, mut candidate: JsonSchemaObject) -> JsonSchemaObject {
        for title in &self.generated {
            candidate.title = Some(title.clone());
            if let Some(existing) = self.schemas.get(title) {
                if *existing == candidate {
                    return existing.clone();
                }
            }
        }

        let title = loop {
            let name = format!("{}{}", GENERATED_TITLE_PREFIX, self.next_sequence());
            if !self.schemas.contains_key(&name) {
                break name;
            }
        };
        self.generated.push(title.clone());
        candidate.title = Some(title.clone());
        self.insert(title, candidate)
    }

    fn insert(&mut self, title: String, schema: JsonSchemaObject) -> JsonSchemaObject {
        debug!(title = %title, "schema tabled");
        self.schemas.insert(title, schema.clone());
        schema
    }

    /// Replaces complex properties/items with references to their own entries.
    fn table_children(&mut self, mut schema: JsonSchemaObject) -> JsonSchemaObject {
        if let Some(properties) = schema.properties.take() {
            let properties = properties
                .into_iter()
                .map(|(name, slot)| (name, self.table_slot(slot)))
                .collect();
            schema.properties = Some(properties);
        }
        if let Some(items) = schema.items.take() {
            schema.items = Some(Box::new(self.table_slot(*items)));
        }
        schema
    }

    fn table_slot(&mut self, slot: SchemaSlot) -> SchemaSlot {
        match slot {
            SchemaSlot::Ref(reference) => SchemaSlot::Ref(reference.localized()),
            SchemaSlot::Inline(inner) if inner.is_complex() => {
                let entry = self.add(&inner, None);
                let title = entry.title.as_deref().unwrap_or_default();
                SchemaSlot::Ref(SchemaRef::to_title(title))
            }
            inline => inline,
        }
    }

    pub fn resolve(&self, reference: &SchemaRef) -> std::result::Result<&JsonSchemaObject, SchemaError> {
        if !reference.is_local() {
            return Err(SchemaError::Unresolved(reference.reference.clone()));
        }
        self.schemas
            .get(reference.title())
            .ok_or_else(|| SchemaError::Unresolved(reference.reference.clone()))
    }

    /// Inlines every reference reachable from `slot`.
    ///
    /// A reference that would re-enter a schema already being expanded is left in place.
    pub fn expand(&self, slot: &SchemaSlot) -> std::result::Result<JsonSchemaObject, SchemaError> {
        let mut visiting = HashSet::new();
        match self.expand_slot(slot, &mut visiting)? {
            SchemaSlot::Inline(schema) => Ok(*schema),
            SchemaSlot::Ref(reference) => Err(SchemaError::Unresolved(reference.reference)),
        }
    }

    fn expand_slot(
        &self,
        slot: &SchemaSlot,
        visiting: &mut HashSet<String>,
    ) -> std::result::Result<SchemaSlot, SchemaError> {
        match slot {
            SchemaSlot::Ref(reference) => {
                let title = reference.title().to_string();
                if visiting.contains(&title) {
                    return Ok(slot.clone());
                }
                let target = self.resolve(reference)?;
                visiting.insert(title.clone());
                let expanded = self.expand_object(target, visiting)?;
                visiting.remove(&title);
                Ok(expanded.into())
            }
            SchemaSlot::Inline(schema) => Ok(self.expand_object(schema, visiting)?.into()),
        }
    }

    fn expand_object(
        &self,
        schema: &JsonSchemaObject,
        visiting: &mut HashSet<String>,
    ) -> std::result::Result<JsonSchemaObject, SchemaError> {
        let mut expanded = schema.clone();
        if let Some(properties) = &schema.properties {
            let mut inlined = BTreeMap::new();
            for (name, slot) in properties {
                inlined.insert(name.clone(), self.expand_slot(slot, visiting)?);
            }
            expanded.properties = Some(inlined);
        }
        if let Some(items) = &schema.items {
            expanded.items = Some(Box::new(self.expand_slot(items, visiting)?));
        }
        if let Some(alternatives) = &schema.any_of {
            let inlined = alternatives
                .iter()
                .map(|slot| self.expand_slot(slot, visiting))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            expanded.any_of = Some(inlined);
        }
        Ok(expanded)
    }

    /// Flattens the table into the `schemas` map of a wire document.
    pub fn render(&self) -> serde_json::Result<Map<String, Value>> {
        let mut rendered = Map::new();
        for (title, schema) in &self.schemas {
            rendered.insert(title.clone(), render_schema(schema)?);
        }
        Ok(rendered)
    }
}

/// Renders a schema the way the execution engine reads it; references become `{"$ref": ...}`.
pub fn render_schema(schema: &JsonSchemaObject) -> serde_json::Result<Value> {
    serde_json::to_value(schema)
}

pub fn render_slot(slot: &SchemaSlot) -> serde_json::Result<Value> {
    serde_json::to_value(slot)
}

/// Handle to the schema table a flow writes into.
///
/// The outermost flow owns the table; nested bodies hold a weak handle to the
/// same table, which stands in for walking parent links up to the root.
#[derive(Clone, Debug)]
pub enum SchemaScope {
    Owner(Arc<RwLock<SchemaTable>>),
    Nested(Weak<RwLock<SchemaTable>>),
}

impl Default for SchemaScope {
    fn default() -> Self {
        Self::root()
    }
}

impl SchemaScope {
    pub fn root() -> Self {
        SchemaScope::Owner(Arc::new(RwLock::new(SchemaTable::new())))
    }

    pub fn child(&self) -> Self {
        match self {
            SchemaScope::Owner(table) => SchemaScope::Nested(Arc::downgrade(table)),
            SchemaScope::Nested(table) => SchemaScope::Nested(table.clone()),
        }
    }

    /// Scope for a copy of the flow holding this one. An owner gets its own
    /// copy of the table; a nested scope keeps pointing at the same table.
    pub fn detached(&self) -> Self {
        match self {
            SchemaScope::Owner(table) => {
                SchemaScope::Owner(Arc::new(RwLock::new(table.read().clone())))
            }
            SchemaScope::Nested(table) => SchemaScope::Nested(table.clone()),
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, SchemaScope::Owner(_))
    }

    /// The owning table, or `None` once the outermost flow has been dropped.
    pub fn table(&self) -> Option<Arc<RwLock<SchemaTable>>> {
        match self {
            SchemaScope::Owner(table) => Some(Arc::clone(table)),
            SchemaScope::Nested(table) => table.upgrade(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> JsonSchemaObject {
        JsonSchemaObject::object()
            .with_title("Customer")
            .with_property("id", JsonSchemaObject::string())
            .with_property(
                "address",
                JsonSchemaObject::object()
                    .with_title("Address")
                    .with_property("city", JsonSchemaObject::string()),
            )
            .with_required("id")
    }

    #[test]
    fn primitive_schemas_are_not_tabled() {
        let mut table = SchemaTable::new();
        let schema = table.add(&JsonSchemaObject::string(), Some("name"));
        assert_eq!(schema, JsonSchemaObject::string());
        assert!(table.is_empty());
    }

    #[test]
    fn nested_objects_become_references() {
        let mut table = SchemaTable::new();
        let entry = table.add(&customer(), None);
        assert_eq!(entry.title.as_deref(), Some("Customer"));
        assert_eq!(table.len(), 2);

        let address = &entry.properties.as_ref().unwrap()["address"];
        assert_eq!(
            address.as_reference().map(|r| r.reference.as_str()),
            Some("#/schemas/Address")
        );
    }

    #[test]
    fn equal_schema_under_same_title_is_deduplicated() {
        let mut table = SchemaTable::new();
        let first = table.add(&customer(), Some("Customer"));
        let second = table.add(&customer(), Some("Customer"));
        assert_eq!(first, second);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn colliding_title_gets_sequence_suffix() {
        let mut table = SchemaTable::new();
        table.add(&customer(), None);
        let other = JsonSchemaObject::object()
            .with_title("Customer")
            .with_property("email", JsonSchemaObject::string());
        let renamed = table.add(&other, None);
        let title = renamed.title.clone().unwrap();
        assert_ne!(title, "Customer");
        assert!(title.starts_with("Customer_"));
        assert!(table.contains("Customer"));
        assert!(table.contains(&title));

        let again = table.add(&other, None);
        assert_eq!(again.title.as_deref(), Some(title.as_str()));
    }

    #[test]
    fn untitled_nested_schemas_share_generated_entry() {
        let mut table = SchemaTable::new();
        let point = JsonSchemaObject::object()
            .with_property("x", JsonSchemaObject::number())
            .with_property("y", JsonSchemaObject::number());
        let line = JsonSchemaObject::object()
            .with_title("Line")
            .with_property("from", point.clone())
            .with_property("to", point);
        let entry = table.add(&line, None);
        let properties = entry.properties.unwrap();
        assert_eq!(properties["from"], properties["to"]);
        assert_eq!(table.len(), 2);
        assert!(table.titles().any(|title| title.starts_with("bo_")));
    }

    #[test]
    fn add_ref_rejects_primitives() {
        let mut table = SchemaTable::new();
        let error = table
            .add_ref(&JsonSchemaObject::integer(), Some("count"))
            .expect_err("integers cannot be referenced");
        assert!(matches!(error, SchemaError::NonComplex(name) if name == "count"));
    }

    #[test]
    fn expand_reconstructs_original_structure() {
        let mut table = SchemaTable::new();
        let reference = table.add_ref(&customer(), None).unwrap();
        let expanded = table.expand(&reference.into()).unwrap();
        assert_eq!(expanded, customer());
    }

    #[test]
    fn foreign_references_are_localized() {
        let mut table = SchemaTable::new();
        let order = JsonSchemaObject::object().with_title("Order").with_property(
            "customer",
            SchemaRef {
                reference: "#/definitions/Customer".to_string(),
            },
        );
        let entry = table.add(&order, None);
        let customer = &entry.properties.unwrap()["customer"];
        assert_eq!(
            customer.as_reference().map(|r| r.reference.as_str()),
            Some("#/schemas/Customer")
        );
    }

    #[test]
    fn nested_scope_writes_into_owner_table() {
        let root = SchemaScope::root();
        let child = root.child().child();
        assert!(!child.is_owner());
        child
            .table()
            .expect("owner is alive")
            .write()
            .add(&customer(), None);
        assert_eq!(root.table().unwrap().read().len(), 2);

        drop(root);
        assert!(child.table().is_none());
    }

    #[test]
    fn detached_owner_gets_its_own_table() {
        let root = SchemaScope::root();
        root.table().unwrap().write().add(&customer(), None);
        let copy = root.detached();
        copy.table().unwrap().write().add(
            &JsonSchemaObject::object()
                .with_title("Order")
                .with_property("id", JsonSchemaObject::string()),
            None,
        );

        assert_eq!(root.table().unwrap().read().len(), 2);
        assert_eq!(copy.table().unwrap().read().len(), 3);
        assert!(copy.is_owner());
    }
}
