//! Change-tracked entities
//!
//! An [`Entity`] is an ordered set of [`EntityField`]s plus the shared
//! [`EntityMetadata`] of its type. Fields remember the value they were loaded
//! with so the adapter can tell what changed and, under first-in-wins
//! concurrency, what the row looked like before the edit.

use super::binary::BinaryStream;
use super::error::{DatabaseError, Result};
use super::metadata::{EntityMetadata, EntityRelation, FieldDefinition};
use super::type_map::DbType;
use super::value::DatabaseValue;
use std::sync::Arc;

/// One column's current and initial value
#[derive(Debug, Clone)]
pub struct EntityField {
    definition: FieldDefinition,
    value: DatabaseValue,
    initial_value: DatabaseValue,
    stream: Option<BinaryStream>,
    // binary fields have no comparable initial value; track writes instead
    touched: bool,
    // left out of the SELECT that produced this entity
    unread: bool,
}

impl EntityField {
    pub fn new(definition: FieldDefinition) -> Self {
        let value = if definition.db_type.is_binary() {
            DatabaseValue::Null
        } else {
            definition.default_value.clone()
        };
        Self {
            initial_value: value.clone(),
            value,
            definition,
            stream: None,
            touched: false,
            unread: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn db_type(&self) -> DbType {
        self.definition.db_type
    }

    pub fn length(&self) -> Option<usize> {
        self.definition.length
    }

    pub fn is_nullable(&self) -> bool {
        self.definition.nullable
    }

    pub fn is_calculated(&self) -> bool {
        self.definition.calculated
    }

    pub fn is_binary(&self) -> bool {
        self.definition.db_type.is_binary()
    }

    pub fn default_value(&self) -> &DatabaseValue {
        &self.definition.default_value
    }

    pub fn definition(&self) -> &FieldDefinition {
        &self.definition
    }

    /// Current value; for binary fields only a pending write is visible here,
    /// loaded content is read through [`EntityField::stream_mut`]
    pub fn value(&self) -> &DatabaseValue {
        &self.value
    }

    /// Value at load time; `None` for binary fields and for fields the
    /// producing query did not read
    pub fn initial_value(&self) -> Option<&DatabaseValue> {
        if self.is_binary() || self.unread {
            None
        } else {
            Some(&self.initial_value)
        }
    }

    /// Assign a new value, validating it against the field definition
    pub fn set_value(&mut self, value: impl Into<DatabaseValue>) -> Result<()> {
        let value = value.into();
        if self.is_binary() {
            if !matches!(value, DatabaseValue::Bytes(_) | DatabaseValue::Null) {
                return Err(DatabaseError::invalid_parameter(format!(
                    "binary field '{}' only accepts bytes, got {}",
                    self.name(),
                    value.type_name()
                )));
            }
            self.value = value;
            self.touched = true;
            return Ok(());
        }

        let value = self.definition.db_type.coerce(value);
        if let (Some(max), DatabaseValue::String(s)) = (self.definition.length, &value) {
            if max > 0 && s.chars().count() > max {
                return Err(DatabaseError::invalid_parameter(format!(
                    "value for '{}' exceeds maximum length {}",
                    self.name(),
                    max
                )));
            }
        }
        self.value = value;
        Ok(())
    }

    pub fn has_changed(&self) -> bool {
        if self.is_binary() {
            self.touched
        } else {
            self.value != self.initial_value
        }
    }

    /// Revert the current value to the initial one
    pub fn discard_changes(&mut self) {
        if self.is_binary() {
            self.value = DatabaseValue::Null;
            self.touched = false;
        } else {
            self.value = self.initial_value.clone();
        }
    }

    /// Make the current value the new baseline
    pub fn accept_changes(&mut self) {
        self.unread = false;
        if self.is_binary() {
            if let DatabaseValue::Bytes(bytes) = std::mem::take(&mut self.value) {
                self.stream = Some(BinaryStream::new(bytes));
            }
            self.touched = false;
        } else {
            self.initial_value = self.value.clone();
        }
    }

    /// Materialize a value read from the backend; the field starts unchanged
    pub(crate) fn load(&mut self, value: DatabaseValue) {
        self.unread = false;
        if self.is_binary() {
            self.stream = match value {
                DatabaseValue::Bytes(bytes) => Some(BinaryStream::new(bytes)),
                _ => None,
            };
            self.value = DatabaseValue::Null;
            self.touched = false;
        } else {
            self.value = self.definition.db_type.coerce(value);
            self.initial_value = self.value.clone();
        }
    }

    /// Materialize a field the query did not select: it starts unchanged
    /// with its default, and nothing is known about the stored value
    pub(crate) fn load_unread(&mut self) {
        self.accept_changes();
        self.unread = true;
    }

    pub fn is_unread(&self) -> bool {
        self.unread
    }

    /// Loaded binary content, if this is a binary field that was selected
    pub fn stream_mut(&mut self) -> Option<&mut BinaryStream> {
        self.stream.as_mut()
    }
}

/// An in-memory row with named, change-tracked fields
#[derive(Debug, Clone)]
pub struct Entity {
    metadata: Arc<EntityMetadata>,
    fields: Vec<EntityField>,
}

impl Entity {
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        let fields = metadata
            .fields
            .iter()
            .cloned()
            .map(EntityField::new)
            .collect();
        Self { metadata, fields }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn entity_name(&self) -> &str {
        &self.metadata.entity_name
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.metadata.schema_name.as_deref()
    }

    pub fn table_name(&self) -> &str {
        &self.metadata.table_name
    }

    pub fn is_view(&self) -> bool {
        self.metadata.is_view
    }

    pub fn primary_key_field_names(&self) -> &[String] {
        &self.metadata.primary_keys
    }

    pub fn relations(&self) -> &[EntityRelation] {
        &self.metadata.relations
    }

    /// The relation pointing at `target_entity_type`
    pub fn relation(&self, target_entity_type: &str) -> Result<&EntityRelation> {
        self.metadata
            .relations
            .iter()
            .find(|r| r.target_entity_type == target_entity_type)
            .ok_or_else(|| {
                DatabaseError::key_not_found(format!(
                    "entity '{}' has no relation to '{}'",
                    self.entity_name(),
                    target_entity_type
                ))
            })
    }

    pub fn field(&self, name: &str) -> Result<&EntityField> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| self.missing(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut EntityField> {
        match self.fields.iter().position(|f| f.name() == name) {
            Some(index) => Ok(&mut self.fields[index]),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> DatabaseError {
        DatabaseError::key_not_found(format!(
            "entity '{}' has no field '{}'",
            self.entity_name(),
            name
        ))
    }

    /// Fields in registration order
    pub fn fields(&self) -> impl Iterator<Item = &EntityField> {
        self.fields.iter()
    }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = &mut EntityField> {
        self.fields.iter_mut()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    pub fn get(&self, name: &str) -> Result<&DatabaseValue> {
        self.field(name).map(EntityField::value)
    }

    pub fn set(&mut self, name: &str, value: impl Into<DatabaseValue>) -> Result<()> {
        self.field_mut(name)?.set_value(value)
    }

    /// Loaded content of a binary field
    pub fn stream_mut(&mut self, name: &str) -> Result<Option<&mut BinaryStream>> {
        Ok(self.field_mut(name)?.stream_mut())
    }

    pub fn has_changed(&self) -> bool {
        self.fields.iter().any(EntityField::has_changed)
    }

    pub fn changed_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.has_changed())
            .map(EntityField::name)
            .collect()
    }

    pub fn discard_changes(&mut self) {
        self.fields.iter_mut().for_each(EntityField::discard_changes);
    }

    pub fn accept_changes(&mut self) {
        self.fields.iter_mut().for_each(EntityField::accept_changes);
    }

    /// Current primary-key values in key order
    pub fn identity(&self) -> Result<Vec<DatabaseValue>> {
        self.metadata
            .primary_keys
            .iter()
            .map(|key| self.get(key).cloned())
            .collect()
    }

    /// Field values as a JSON object, binary fields omitted
    pub fn to_data_source(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .filter(|f| !f.is_binary())
            .map(|f| (f.name().to_string(), f.value().to_json()))
            .collect()
    }

    /// Assign field values from a JSON object; unknown keys are ignored
    pub fn data_bind(&mut self, source: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        for (name, value) in source {
            if let Some(field) = self.fields.iter_mut().find(|f| f.name() == name) {
                field.set_value(DatabaseValue::from_json(value))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::MetadataRegistry;

    fn customer() -> Entity {
        let registry = MetadataRegistry::new();
        registry.register_fn("Customer", |m| {
            m.register_entity(None, "Customer", false)
                .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
                .register_entity_field("Name", DbType::Varchar, Some(5), false, false, DatabaseValue::Null)
                .register_entity_field("Age", DbType::Int, None, true, false, DatabaseValue::Null)
                .register_binary_entity_field("Photo", true)
                .register_entity_pri_key("CustomerId");
        });
        registry.create("Customer").unwrap()
    }

    #[test]
    fn test_new_entity_is_unchanged() {
        let entity = customer();
        assert!(!entity.has_changed());
        assert_eq!(entity.get("CustomerId").unwrap(), &DatabaseValue::Long(0));
        assert_eq!(entity.primary_key_field_names(), ["CustomerId".to_string()]);
    }

    #[test]
    fn test_set_tracks_changes() {
        let mut entity = customer();
        entity.set("Name", "Ann").unwrap();
        entity.set("Age", 30).unwrap();
        assert!(entity.has_changed());
        assert_eq!(entity.changed_fields(), vec!["Name", "Age"]);
        assert_eq!(entity.get("Age").unwrap(), &DatabaseValue::Long(30));

        entity.accept_changes();
        assert!(!entity.has_changed());
        entity.set("Age", 30).unwrap();
        assert!(!entity.has_changed());
    }

    #[test]
    fn test_discard_changes_is_idempotent() {
        let mut entity = customer();
        entity.set("Name", "Ann").unwrap();
        entity.set("Photo", vec![1u8, 2]).unwrap();
        entity.discard_changes();
        entity.discard_changes();
        assert!(!entity.has_changed());
        assert!(entity.get("Name").unwrap().is_null());
        assert!(entity.get("Photo").unwrap().is_null());
    }

    #[test]
    fn test_unknown_field_and_validation() {
        let mut entity = customer();
        assert!(matches!(
            entity.get("Nope"),
            Err(DatabaseError::KeyNotFound(_))
        ));
        assert!(matches!(
            entity.set("Name", "Too long a name"),
            Err(DatabaseError::InvalidParameter(_))
        ));
        assert!(matches!(
            entity.set("Photo", "text"),
            Err(DatabaseError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_binary_field_has_no_initial_value() {
        let mut entity = customer();
        let photo = entity.field_mut("Photo").unwrap();
        photo.load(DatabaseValue::Bytes(vec![7, 8, 9]));
        assert!(photo.initial_value().is_none());
        assert!(!photo.has_changed());
        assert_eq!(photo.stream_mut().unwrap().read_all().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_unread_field_has_no_initial_value() {
        let mut entity = customer();
        let age = entity.field_mut("Age").unwrap();
        age.load_unread();
        assert!(age.is_unread());
        assert_eq!(age.initial_value(), None);
        assert!(!age.has_changed());

        age.set_value(40).unwrap();
        assert!(age.has_changed());
        age.accept_changes();
        assert!(!age.is_unread());
        assert_eq!(age.initial_value(), Some(&DatabaseValue::Long(40)));

        age.load(DatabaseValue::Long(41));
        assert!(!age.is_unread());
    }

    #[test]
    fn test_data_source_round_trip() {
        let mut entity = customer();
        let mut source = serde_json::Map::new();
        source.insert("Name".into(), serde_json::json!("Bo"));
        source.insert("Age".into(), serde_json::json!(41));
        source.insert("Unknown".into(), serde_json::json!(true));
        entity.data_bind(&source).unwrap();

        let exported = entity.to_data_source();
        assert_eq!(exported["Name"], serde_json::json!("Bo"));
        assert_eq!(exported["Age"], serde_json::json!(41));
        assert!(!exported.contains_key("Photo"));
    }
}
