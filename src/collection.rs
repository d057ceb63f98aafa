//! Collection descriptors.
//!
//! One [`CollectionDescriptor`] exists per navigable collection role, named
//! `<owner entity>.<property path>`. It classifies the declared collection
//! shape and resolves element and key types lazily, once.

use crate::contract::{CollectionPersister, EntityKey, Row};
use crate::error::{SchemaError, Unsupported, unsupported};
use crate::model::MemberType;
use crate::types::{CollectionKind, CollectionType, QueryType, TypeBridge};
use smol_str::SmolStr;
use std::cell::OnceCell;
use std::convert::Infallible;

/// Static descriptor of one collection role.
#[derive(Debug)]
pub struct CollectionDescriptor {
    role: SmolStr,
    owner: SmolStr,
    kind: CollectionKind,
    element_fact: MemberType,
    key_fact: Option<MemberType>,
    element: OnceCell<QueryType>,
    key: OnceCell<Option<QueryType>>,
}

impl CollectionDescriptor {
    /// Creates a descriptor for `role` owned by `owner` from the member fact
    /// declared at that path.
    ///
    /// Fails with [`SchemaError::NotACollection`] if the member is not
    /// collection-valued.
    pub fn new(
        role: impl Into<SmolStr>,
        owner: impl Into<SmolStr>,
        member: MemberType,
    ) -> Result<Self, SchemaError> {
        let role = role.into();
        let MemberType::Collection {
            shape,
            element,
            key,
        } = member
        else {
            return Err(SchemaError::NotACollection { role });
        };

        Ok(Self {
            role,
            owner: owner.into(),
            kind: CollectionKind::classify(&shape),
            element_fact: *element,
            key_fact: key.map(|key| *key),
            element: OnceCell::new(),
            key: OnceCell::new(),
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn owner_entity_name(&self) -> &str {
        &self.owner
    }

    pub fn element_type(&self) -> &QueryType {
        self.element
            .get_or_init(|| TypeBridge::type_for_element(&self.element_fact))
    }

    /// Key type of a map role; `None` for every other shape.
    pub fn key_type(&self) -> Option<&QueryType> {
        self.key
            .get_or_init(|| {
                if !self.kind.is_map() {
                    return None;
                }
                Some(
                    self.key_fact
                        .as_ref()
                        .map(TypeBridge::type_for_element)
                        .unwrap_or_else(|| TypeBridge::unknown().clone()),
                )
            })
            .as_ref()
    }

    /// Index type: `Integer` for lists, the key type for maps.
    pub fn index_type(&self) -> Option<QueryType> {
        match self.kind {
            CollectionKind::List => Some(QueryType::Integer),
            kind if kind.is_map() => self.key_type().cloned(),
            _ => None,
        }
    }

    /// Entity name of the elements, for collections of entities.
    pub fn element_entity_name(&self) -> Option<&str> {
        self.element_type().entity_name()
    }

    pub fn collection_type(&self) -> QueryType {
        QueryType::Collection(CollectionType {
            role: self.role.clone(),
            kind: self.kind,
            element: Box::new(self.element_type().clone()),
            key: self.key_type().cloned().map(Box::new),
        })
    }
}

impl CollectionPersister for CollectionDescriptor {
    fn role(&self) -> &str {
        &self.role
    }

    fn collection_type(&self) -> QueryType {
        CollectionDescriptor::collection_type(self)
    }

    fn kind(&self) -> CollectionKind {
        self.kind
    }

    fn element_type(&self) -> QueryType {
        CollectionDescriptor::element_type(self).clone()
    }

    fn index_type(&self) -> Option<QueryType> {
        CollectionDescriptor::index_type(self)
    }

    fn key_type(&self) -> Option<QueryType> {
        CollectionDescriptor::key_type(self).cloned()
    }

    fn owner_entity_name(&self) -> &str {
        &self.owner
    }

    fn is_one_to_many(&self) -> bool {
        CollectionDescriptor::element_type(self).is_entity()
    }

    fn is_many_to_many(&self) -> bool {
        false
    }

    fn has_index(&self) -> bool {
        self.kind.is_indexed()
    }

    fn has_orphan_delete(&self) -> bool {
        false
    }

    fn is_inverse(&self) -> bool {
        false
    }

    fn is_lazy(&self) -> bool {
        false
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn has_cache(&self) -> bool {
        false
    }

    fn collection_spaces(&self) -> Vec<SmolStr> {
        vec![self.role.clone()]
    }

    fn element_column_names(&self) -> Vec<SmolStr> {
        vec![SmolStr::default()]
    }

    fn index_column_names(&self) -> Vec<SmolStr> {
        if self.kind.is_indexed() {
            vec![SmolStr::default()]
        } else {
            Vec::new()
        }
    }

    fn initialize(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("initialize")
    }

    fn recreate(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("recreate")
    }

    fn remove(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("remove")
    }

    fn delete_rows(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("delete_rows")
    }

    fn update_rows(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("update_rows")
    }

    fn insert_rows(&self, _key: &EntityKey) -> Result<(), Unsupported> {
        unsupported("insert_rows")
    }

    fn read_element(&self, _row: &Row) -> Result<Infallible, Unsupported> {
        unsupported("read_element")
    }

    fn read_index(&self, _row: &Row) -> Result<Infallible, Unsupported> {
        unsupported("read_index")
    }

    fn read_key(&self, _row: &Row) -> Result<Infallible, Unsupported> {
        unsupported("read_key")
    }

    fn cache_access_strategy(&self) -> Result<Infallible, Unsupported> {
        unsupported("cache_access_strategy")
    }

    fn element_persister(&self) -> Result<Infallible, Unsupported> {
        unsupported("element_persister")
    }
}
