//! Per-entity-type schema metadata
//!
//! An [`EntityDescriptor`] describes one entity type by issuing registration
//! calls against a [`MetadataBuilder`]. The [`MetadataRegistry`] runs that
//! description the first time any fact about the type is requested and keeps
//! the result, immutable, for the registry's lifetime.

use super::entity::Entity;
use super::error::{DatabaseError, Result};
use super::type_map::DbType;
use super::value::DatabaseValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A link from one entity type to another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRelation {
    /// Entity type name on the other side of the relation
    pub target_entity_type: String,
    /// Field on this entity
    pub local_field_name: String,
    /// Field on the target entity
    pub foreign_field_name: String,
    /// `true` for a required parent (many-to-one), `false` for a dependent
    /// collection (one-to-many)
    pub is_parent_relation: bool,
}

/// Static description of one column
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub db_type: DbType,
    /// Maximum length for character data, `None` when unbounded
    pub length: Option<usize>,
    pub nullable: bool,
    /// Assigned by the server (auto-increment, computed column)
    pub calculated: bool,
    pub default_value: DatabaseValue,
}

/// Everything known about an entity type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMetadata {
    pub entity_name: String,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub is_view: bool,
    pub primary_keys: Vec<String>,
    pub relations: Vec<EntityRelation>,
    pub fields: Vec<FieldDefinition>,
    pub ddl: Option<String>,
}

impl EntityMetadata {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.iter().any(|k| k == name)
    }
}

/// Receiver for the registration calls an [`EntityDescriptor`] issues
#[derive(Debug)]
pub struct MetadataBuilder {
    metadata: EntityMetadata,
}

impl MetadataBuilder {
    fn new(entity_name: &str) -> Self {
        Self {
            metadata: EntityMetadata {
                entity_name: entity_name.to_string(),
                table_name: entity_name.to_string(),
                ..EntityMetadata::default()
            },
        }
    }

    /// Declare the backing table (or view) of the entity
    pub fn register_entity(
        &mut self,
        schema_name: Option<&str>,
        table_name: &str,
        is_view: bool,
    ) -> &mut Self {
        self.metadata.schema_name = schema_name.map(str::to_string);
        self.metadata.table_name = table_name.to_string();
        self.metadata.is_view = is_view;
        self
    }

    /// Append a primary-key field; order of calls is key order
    pub fn register_entity_pri_key(&mut self, field_name: &str) -> &mut Self {
        if !self.metadata.is_primary_key(field_name) {
            self.metadata.primary_keys.push(field_name.to_string());
        }
        self
    }

    pub fn register_entity_relation(
        &mut self,
        target_entity_type: &str,
        local_field_name: &str,
        foreign_field_name: &str,
        is_parent_relation: bool,
    ) -> &mut Self {
        let relation = EntityRelation {
            target_entity_type: target_entity_type.to_string(),
            local_field_name: local_field_name.to_string(),
            foreign_field_name: foreign_field_name.to_string(),
            is_parent_relation,
        };
        if !self.metadata.relations.contains(&relation) {
            self.metadata.relations.push(relation);
        }
        self
    }

    /// Register a column; re-registering a name replaces the definition
    pub fn register_entity_field(
        &mut self,
        name: &str,
        db_type: DbType,
        length: Option<usize>,
        nullable: bool,
        calculated: bool,
        default_value: DatabaseValue,
    ) -> &mut Self {
        let definition = FieldDefinition {
            name: name.to_string(),
            db_type,
            length,
            nullable,
            calculated,
            default_value,
        };
        match self.metadata.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = definition,
            None => self.metadata.fields.push(definition),
        }
        self
    }

    pub fn register_binary_entity_field(&mut self, name: &str, nullable: bool) -> &mut Self {
        self.register_entity_field(name, DbType::Binary, None, nullable, false, DatabaseValue::Null)
    }

    pub fn register_ddl(&mut self, ddl: &str) -> &mut Self {
        self.metadata.ddl = Some(ddl.to_string());
        self
    }

    fn finish(self) -> Result<EntityMetadata> {
        let metadata = self.metadata;
        if metadata.table_name.trim().is_empty() {
            return Err(DatabaseError::invalid_parameter(format!(
                "entity '{}' has no table name",
                metadata.entity_name
            )));
        }
        for key in &metadata.primary_keys {
            if metadata.field(key).is_none() {
                return Err(DatabaseError::key_not_found(format!(
                    "primary key '{}' of entity '{}' is not a registered field",
                    key, metadata.entity_name
                )));
            }
        }
        Ok(metadata)
    }
}

/// Capability implemented once per concrete entity type
pub trait EntityDescriptor: Send + Sync {
    /// Name the type is registered and looked up under
    fn entity_name(&self) -> &str;

    /// Populate every metadata fact of the type
    fn load_metadata(&self, builder: &mut MetadataBuilder) -> Result<()>;
}

struct FnDescriptor<F> {
    name: String,
    load: F,
}

impl<F> EntityDescriptor for FnDescriptor<F>
where
    F: Fn(&mut MetadataBuilder) + Send + Sync,
{
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn load_metadata(&self, builder: &mut MetadataBuilder) -> Result<()> {
        (self.load)(builder);
        Ok(())
    }
}

/// Lazily populated cache of per-entity-type metadata
#[derive(Default)]
pub struct MetadataRegistry {
    descriptors: RwLock<HashMap<String, Arc<dyn EntityDescriptor>>>,
    loaded: RwLock<HashMap<String, Arc<EntityMetadata>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; a later registration for the same name wins
    /// unless its metadata was already loaded
    pub fn register(&self, descriptor: impl EntityDescriptor + 'static) -> &Self {
        let name = descriptor.entity_name().to_string();
        self.descriptors.write().insert(name, Arc::new(descriptor));
        self
    }

    /// Register an entity type from a closure issuing registration calls
    pub fn register_fn<F>(&self, entity_name: &str, load: F) -> &Self
    where
        F: Fn(&mut MetadataBuilder) + Send + Sync + 'static,
    {
        self.register(FnDescriptor {
            name: entity_name.to_string(),
            load,
        })
    }

    pub fn is_registered(&self, entity_name: &str) -> bool {
        self.descriptors.read().contains_key(entity_name)
    }

    /// All facts about an entity type, loading them on first access
    pub fn metadata(&self, entity_name: &str) -> Result<Arc<EntityMetadata>> {
        if let Some(metadata) = self.loaded.read().get(entity_name) {
            return Ok(Arc::clone(metadata));
        }

        let descriptor = self
            .descriptors
            .read()
            .get(entity_name)
            .cloned()
            .ok_or_else(|| {
                DatabaseError::key_not_found(format!("entity type '{}' is not registered", entity_name))
            })?;

        let mut builder = MetadataBuilder::new(entity_name);
        descriptor.load_metadata(&mut builder)?;
        let metadata = Arc::new(builder.finish()?);
        log::debug!(
            "loaded metadata for entity '{}' (table {}, {} fields)",
            entity_name,
            metadata.table_name,
            metadata.fields.len()
        );

        // another caller may have loaded it meanwhile; first one wins
        let mut loaded = self.loaded.write();
        let entry = loaded
            .entry(entity_name.to_string())
            .or_insert_with(|| Arc::clone(&metadata));
        Ok(Arc::clone(entry))
    }

    pub fn schema_name(&self, entity_name: &str) -> Result<Option<String>> {
        Ok(self.metadata(entity_name)?.schema_name.clone())
    }

    pub fn table_name(&self, entity_name: &str) -> Result<String> {
        Ok(self.metadata(entity_name)?.table_name.clone())
    }

    pub fn is_view(&self, entity_name: &str) -> Result<bool> {
        Ok(self.metadata(entity_name)?.is_view)
    }

    pub fn primary_keys(&self, entity_name: &str) -> Result<Vec<String>> {
        Ok(self.metadata(entity_name)?.primary_keys.clone())
    }

    pub fn relations(&self, entity_name: &str) -> Result<Vec<EntityRelation>> {
        Ok(self.metadata(entity_name)?.relations.clone())
    }

    pub fn ddl(&self, entity_name: &str) -> Result<Option<String>> {
        Ok(self.metadata(entity_name)?.ddl.clone())
    }

    /// Create a fresh entity of the given type with default field values
    pub fn create(&self, entity_name: &str) -> Result<Entity> {
        Ok(Entity::new(self.metadata(entity_name)?))
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("registered", &self.descriptors.read().keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted {
        loads: Arc<AtomicUsize>,
    }

    impl EntityDescriptor for Counted {
        fn entity_name(&self) -> &str {
            "Customer"
        }

        fn load_metadata(&self, builder: &mut MetadataBuilder) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            builder
                .register_entity(Some("main"), "Customer", false)
                .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Null)
                .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
                .register_entity_pri_key("CustomerId")
                .register_entity_relation("Order", "CustomerId", "CustomerId", false)
                .register_ddl("CREATE TABLE Customer (CustomerId INTEGER PRIMARY KEY, Name VARCHAR(50))");
            Ok(())
        }
    }

    #[test]
    fn test_loads_once_on_first_access() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = MetadataRegistry::new();
        registry.register(Counted {
            loads: Arc::clone(&loads),
        });
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        assert_eq!(registry.table_name("Customer").unwrap(), "Customer");
        assert_eq!(registry.schema_name("Customer").unwrap().as_deref(), Some("main"));
        assert!(!registry.is_view("Customer").unwrap());
        assert_eq!(registry.primary_keys("Customer").unwrap(), vec!["CustomerId"]);
        assert_eq!(registry.relations("Customer").unwrap().len(), 1);
        assert!(registry.ddl("Customer").unwrap().is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_entity() {
        let registry = MetadataRegistry::new();
        assert!(matches!(
            registry.table_name("Nope"),
            Err(DatabaseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_primary_key_must_be_a_field() {
        let registry = MetadataRegistry::new();
        registry.register_fn("Broken", |m| {
            m.register_entity(None, "broken", false)
                .register_entity_pri_key("Id");
        });
        assert!(matches!(
            registry.metadata("Broken"),
            Err(DatabaseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_table_defaults_to_entity_name() {
        let registry = MetadataRegistry::new();
        registry.register_fn("Tag", |m| {
            m.register_entity_field("Label", DbType::Varchar, Some(20), false, false, DatabaseValue::Null);
        });
        let metadata = registry.metadata("Tag").unwrap();
        assert_eq!(metadata.table_name, "Tag");
        assert!(metadata.primary_keys.is_empty());
    }
}
