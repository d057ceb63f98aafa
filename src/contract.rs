//! Persister contracts a query front end programs against.
//!
//! A query compiler written for a live persistence engine asks its
//! persisters for far more than property types. The traits here carry that
//! whole surface so such a front end can run unchanged against static
//! descriptors. Methods fall into two groups:
//!
//! - **load-bearing**: property and role resolution plus a few descriptive
//!   accessors returning fixed, low-information values;
//! - **runtime**: loading, writing, locking, caching, dirty checking,
//!   versioning and proxying. Static descriptors answer every one of these
//!   with [`Unsupported`].
//!
//! Runtime operations whose results have no static representation return
//! `Result<Infallible, Unsupported>`.

use crate::error::{SchemaError, Unsupported};
use crate::types::{CollectionKind, QueryType};
use smol_str::SmolStr;
use std::convert::Infallible;

/// Identifier value of an entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey(pub SmolStr);

/// Hydrated column or property values of one row.
pub type Row = Vec<Option<SmolStr>>;

/// Lock level requested by a runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    None,
    Read,
    Optimistic,
    PessimisticRead,
    PessimisticWrite,
}

/// Representation an entity is materialized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityMode {
    /// Plain objects of the entity class.
    Pojo,
    /// Generic maps keyed by property name.
    Map,
}

/// Where a property of a polymorphic entity is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declarer {
    Class,
    Subclass,
    Superclass,
}

/// Contract for a persister of one entity.
pub trait EntityPersister {
    fn entity_name(&self) -> &str;

    /// Type of a property path, or `None` if it is not mapped.
    fn property_type(&self, path: &str) -> Option<QueryType>;

    /// Type of a property path, failing if it is not mapped.
    fn to_type(&self, path: &str) -> Result<QueryType, SchemaError>;

    fn entity_type(&self) -> QueryType;
    fn identifier_type(&self) -> QueryType;
    fn identifier_property_name(&self) -> SmolStr;
    fn identifier_column_names(&self) -> Vec<SmolStr>;
    fn key_column_names(&self) -> Vec<SmolStr>;
    fn root_entity_name(&self) -> SmolStr;
    fn property_spaces(&self) -> Vec<SmolStr>;
    fn query_spaces(&self) -> Vec<SmolStr>;
    fn to_columns(&self, alias: &str, path: &str) -> Vec<SmolStr>;
    fn subclass_property_declarer(&self, path: &str) -> Declarer;
    fn is_subclass_entity_name(&self, entity_name: &str) -> bool;
    fn discriminator_sql_value(&self) -> &str;
    fn table_alias_for_column(&self, column: &str, root_alias: &str) -> &str;
    fn identifier_select_fragment(&self, name: &str, suffix: &str) -> String;
    fn property_select_fragment(&self, alias: &str, suffix: &str, all_properties: bool) -> String;
    fn mapped_superclass(&self) -> Option<SmolStr>;
    fn entity_mode(&self) -> EntityMode;

    fn has_proxy(&self) -> bool;
    fn has_collections(&self) -> bool;
    fn has_mutable_properties(&self) -> bool;
    fn has_cascades(&self) -> bool;
    fn has_identifier_property(&self) -> bool;
    fn has_natural_identifier(&self) -> bool;
    fn has_lazy_properties(&self) -> bool;
    fn has_subclasses(&self) -> bool;
    fn has_cache(&self) -> bool;
    fn has_row_id(&self) -> bool;
    fn is_mutable(&self) -> bool;
    fn is_inherited(&self) -> bool;
    fn is_abstract(&self) -> bool;
    fn is_versioned(&self) -> bool;
    fn is_batch_loadable(&self) -> bool;
    fn is_multi_table(&self) -> bool;
    fn is_explicit_polymorphism(&self) -> bool;
    fn can_read_from_cache(&self) -> bool;
    fn can_write_to_cache(&self) -> bool;
    fn version_property(&self) -> Option<usize>;

    fn load(&self, id: &EntityKey, lock: LockMode) -> Result<Row, Unsupported>;
    fn multi_load(&self, ids: &[EntityKey]) -> Result<Vec<Row>, Unsupported>;
    fn insert(&self, id: Option<&EntityKey>, values: &Row) -> Result<EntityKey, Unsupported>;
    fn update(&self, id: &EntityKey, values: &Row, dirty: &[usize]) -> Result<(), Unsupported>;
    fn delete(&self, id: &EntityKey, version: Option<&str>) -> Result<(), Unsupported>;
    fn lock(&self, id: &EntityKey, lock: LockMode) -> Result<(), Unsupported>;
    fn find_dirty(&self, current: &Row, previous: &Row) -> Result<Vec<usize>, Unsupported>;
    fn find_modified(&self, current: &Row, previous: &Row) -> Result<Vec<usize>, Unsupported>;
    fn database_snapshot(&self, id: &EntityKey) -> Result<Row, Unsupported>;
    fn current_version(&self, id: &EntityKey) -> Result<Option<SmolStr>, Unsupported>;
    fn natural_identifier_properties(&self) -> Result<Vec<usize>, Unsupported>;
    fn natural_identifier_snapshot(&self, id: &EntityKey) -> Result<Row, Unsupported>;
    fn load_entity_id_by_natural_id(&self, values: &Row) -> Result<EntityKey, Unsupported>;
    fn instantiate(&self, id: &EntityKey) -> Result<Infallible, Unsupported>;
    fn identifier_generator(&self) -> Result<Infallible, Unsupported>;
    fn cache_access_strategy(&self) -> Result<Infallible, Unsupported>;
    fn natural_id_cache_access_strategy(&self) -> Result<Infallible, Unsupported>;
    fn entity_tuplizer(&self) -> Result<Infallible, Unsupported>;
    fn entity_metamodel(&self) -> Result<Infallible, Unsupported>;
    fn concrete_proxy_class(&self) -> Result<Infallible, Unsupported>;
    fn post_instantiate(&self) -> Result<(), Unsupported>;
}

/// Contract for a persister of one collection role.
pub trait CollectionPersister {
    fn role(&self) -> &str;
    fn collection_type(&self) -> QueryType;
    fn kind(&self) -> CollectionKind;
    fn element_type(&self) -> QueryType;
    /// Index type: `Integer` for lists, the key type for maps.
    fn index_type(&self) -> Option<QueryType>;
    fn key_type(&self) -> Option<QueryType>;
    fn owner_entity_name(&self) -> &str;
    fn is_one_to_many(&self) -> bool;
    fn is_many_to_many(&self) -> bool;
    fn has_index(&self) -> bool;
    fn has_orphan_delete(&self) -> bool;
    fn is_inverse(&self) -> bool;
    fn is_lazy(&self) -> bool;
    fn is_mutable(&self) -> bool;
    fn has_cache(&self) -> bool;
    fn collection_spaces(&self) -> Vec<SmolStr>;
    fn element_column_names(&self) -> Vec<SmolStr>;
    fn index_column_names(&self) -> Vec<SmolStr>;

    fn initialize(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn recreate(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn remove(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn delete_rows(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn update_rows(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn insert_rows(&self, key: &EntityKey) -> Result<(), Unsupported>;
    fn read_element(&self, row: &Row) -> Result<Infallible, Unsupported>;
    fn read_index(&self, row: &Row) -> Result<Infallible, Unsupported>;
    fn read_key(&self, row: &Row) -> Result<Infallible, Unsupported>;
    fn cache_access_strategy(&self) -> Result<Infallible, Unsupported>;
    fn element_persister(&self) -> Result<Infallible, Unsupported>;
}
