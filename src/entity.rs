//! Entity descriptors.
//!
//! An [`EntityDescriptor`] answers "what is the type of property path P on
//! entity E" from whichever metadata source recognized E. Answers are
//! memoized permanently; misses are not, so a path that only a subclass
//! declares can still resolve once that subclass has been realized.

use crate::config::{RegistryConfig, SubclassResolution};
use crate::contract::{Declarer, EntityKey, EntityMode, EntityPersister, LockMode, Row};
use crate::error::{SchemaError, Unsupported, unsupported};
use crate::model::{self, ClassModel, MappingSnapshot, MemberType};
use crate::registry::RegistryState;
use crate::types::{QueryType, TypeBridge};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Metadata source backing a descriptor, chosen once at construction.
#[derive(Clone)]
pub enum EntityShape {
    /// Backed by introspected class facts.
    Introspected {
        /// Qualified name of the entity class.
        class: SmolStr,
        model: Rc<dyn ClassModel>,
    },
    /// Backed by a mapping document.
    Mapped { mapping: Rc<MappingSnapshot> },
}

impl fmt::Debug for EntityShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityShape::Introspected { class, .. } => {
                f.debug_struct("Introspected").field("class", class).finish()
            }
            EntityShape::Mapped { .. } => f.write_str("Mapped"),
        }
    }
}

/// A resolved member along a property path.
enum PathTarget {
    Member(MemberType),
    /// `association.id`
    AssociationIdentifier,
}

/// Static descriptor of one entity.
pub struct EntityDescriptor {
    name: SmolStr,
    shape: EntityShape,
    registry: Weak<RegistryState>,
    identifier_property: SmolStr,
    identifier_type: QueryType,
    property_types: RefCell<HashMap<SmolStr, QueryType>>,
    /// Subclass descriptors recorded at creation time, used only with
    /// [`SubclassResolution::AtCreation`].
    subclasses: RefCell<Vec<Weak<EntityDescriptor>>>,
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("cached_paths", &self.property_types.borrow().len())
            .finish()
    }
}

impl EntityDescriptor {
    /// Creates a descriptor. The identifier property and type are taken
    /// from `config` once and never re-read.
    pub(crate) fn new(
        name: SmolStr,
        shape: EntityShape,
        config: &RegistryConfig,
        registry: Weak<RegistryState>,
    ) -> Self {
        Self {
            name,
            shape,
            registry,
            identifier_property: config.identifier_property.clone(),
            identifier_type: config.identifier_type.clone(),
            property_types: RefCell::new(HashMap::new()),
            subclasses: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &EntityShape {
        &self.shape
    }

    /// Resolves a property path to its type.
    ///
    /// Checks the cache, then the locally declared (or inherited) members,
    /// then every subclass descriptor, so paths valid only on a narrower
    /// subclass resolve for downcasts. Hits are cached permanently; misses
    /// are not cached.
    pub fn resolve_property_type(&self, path: &str) -> Option<QueryType> {
        if let Some(ty) = self.cached(path) {
            return Some(ty);
        }

        let resolved = self
            .synthesize_property_type(path)
            .or_else(|| self.subclass_property_type(path));

        match &resolved {
            Some(ty) => {
                trace!(entity = %self.name, path, ty = %ty, "resolved property");
                self.property_types
                    .borrow_mut()
                    .insert(SmolStr::new(path), ty.clone());
            }
            None => trace!(entity = %self.name, path, "property not found"),
        }
        resolved
    }

    /// Like [`resolve_property_type`](Self::resolve_property_type), failing
    /// with [`SchemaError::NoSuchProperty`] when the path is not mapped.
    pub fn require_type(&self, path: &str) -> Result<QueryType, SchemaError> {
        self.resolve_property_type(path)
            .ok_or_else(|| SchemaError::NoSuchProperty {
                entity: self.name.clone(),
                path: path.into(),
            })
    }

    /// Entity reference type for this entity.
    pub fn entity_type(&self) -> QueryType {
        TypeBridge::entity(self.name.clone())
    }

    /// Returns true if `other` is a proper subclass of this entity.
    pub fn is_subclass_descriptor(&self, other: &EntityDescriptor) -> bool {
        if other.name == self.name {
            return false;
        }
        match (&self.shape, &other.shape) {
            (
                EntityShape::Introspected { class: mine, .. },
                EntityShape::Introspected {
                    class: theirs,
                    model,
                },
            ) => theirs != mine && model::extends(model.as_ref(), theirs, mine),
            (EntityShape::Mapped { .. }, EntityShape::Mapped { mapping }) => {
                mapping.descends_from(&other.name, &self.name)
            }
            _ => false,
        }
    }

    /// Names of the subclass descriptors currently visible to this one.
    pub fn subclass_entity_names(&self) -> Vec<SmolStr> {
        self.subclass_descriptors()
            .iter()
            .map(|descriptor| descriptor.name.clone())
            .collect()
    }

    /// Records `other` as a subclass if it is one.
    pub(crate) fn add_if_subclass(&self, other: &Rc<EntityDescriptor>) {
        if self.is_subclass_descriptor(other) {
            debug!(entity = %self.name, subclass = %other.name, "recorded subclass");
            self.subclasses.borrow_mut().push(Rc::downgrade(other));
        }
    }

    /// Member fact for a property path, without subclass fallback.
    pub(crate) fn declared_member(&self, path: &str) -> Option<MemberType> {
        match self.resolve_path(path)? {
            PathTarget::Member(member) => Some(member),
            PathTarget::AssociationIdentifier => None,
        }
    }

    fn cached(&self, path: &str) -> Option<QueryType> {
        self.property_types.borrow().get(path).cloned()
    }

    /// Cache, then local synthesis. Used for subclass fallback so that the
    /// walk never recurses through another descriptor's subclasses.
    fn resolve_declared(&self, path: &str) -> Option<QueryType> {
        if let Some(ty) = self.cached(path) {
            return Some(ty);
        }
        let ty = self.synthesize_property_type(path)?;
        self.property_types
            .borrow_mut()
            .insert(SmolStr::new(path), ty.clone());
        Some(ty)
    }

    fn synthesize_property_type(&self, path: &str) -> Option<QueryType> {
        match self.resolve_path(path)? {
            PathTarget::Member(member) => {
                let role = format!("{}.{}", self.name, path);
                Some(TypeBridge::type_for_member(&member, &role))
            }
            PathTarget::AssociationIdentifier => Some(self.identifier_type.clone()),
        }
    }

    fn subclass_property_type(&self, path: &str) -> Option<QueryType> {
        self.subclass_descriptors()
            .iter()
            .find_map(|subclass| subclass.resolve_declared(path))
    }

    fn subclass_descriptors(&self) -> Vec<Rc<EntityDescriptor>> {
        let Some(registry) = self.registry.upgrade() else {
            return Vec::new();
        };
        match registry.config().subclass_resolution {
            SubclassResolution::OnDemand => registry
                .known_entity_descriptors()
                .into_iter()
                .filter(|other| self.is_subclass_descriptor(other))
                .collect(),
            SubclassResolution::AtCreation => self
                .subclasses
                .borrow()
                .iter()
                .filter_map(Weak::upgrade)
                .collect(),
        }
    }

    /// Walks a dotted path: the first segment is a member of this entity,
    /// later segments traverse embedded components, and an association may
    /// be followed only by its identifier property.
    fn resolve_path(&self, path: &str) -> Option<PathTarget> {
        let mut segments = path.split('.');
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut member = self.local_member(first)?;

        while let Some(segment) = segments.next() {
            member = match member {
                MemberType::Embedded(class) => self.component_member(&class, segment)?,
                MemberType::Association(_) if self.identifier_property == segment => {
                    return match segments.next() {
                        None => Some(PathTarget::AssociationIdentifier),
                        Some(_) => None,
                    };
                }
                _ => return None,
            };
        }
        Some(PathTarget::Member(member))
    }

    fn local_member(&self, field: &str) -> Option<MemberType> {
        match &self.shape {
            EntityShape::Introspected { class, model } => {
                model::inherited_field_type(model.as_ref(), class, field)
            }
            EntityShape::Mapped { mapping } => mapping.property(&self.name, field).cloned(),
        }
    }

    fn component_member(&self, component_class: &str, field: &str) -> Option<MemberType> {
        match &self.shape {
            EntityShape::Introspected { model, .. } => {
                model::inherited_field_type(model.as_ref(), component_class, field)
            }
            EntityShape::Mapped { mapping } => {
                mapping.component_property(component_class, field).cloned()
            }
        }
    }

    /// Type of `path` inside the embeddable `component_class`, read from
    /// this descriptor's metadata source. Used for elements of collections
    /// of components, which have no role of their own. Not cached.
    pub(crate) fn component_property_type(
        &self,
        component_class: &str,
        path: &str,
    ) -> Option<QueryType> {
        let mut segments = path.split('.');
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut member = self.component_member(component_class, first)?;
        for segment in segments {
            let MemberType::Embedded(class) = member else {
                return None;
            };
            member = self.component_member(&class, segment)?;
        }
        let role = format!("{}.{}", component_class, path);
        Some(TypeBridge::type_for_member(&member, &role))
    }
}

impl EntityPersister for EntityDescriptor {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn property_type(&self, path: &str) -> Option<QueryType> {
        self.resolve_property_type(path)
    }

    fn to_type(&self, path: &str) -> Result<QueryType, SchemaError> {
        self.require_type(path)
    }

    fn entity_type(&self) -> QueryType {
        EntityDescriptor::entity_type(self)
    }

    fn identifier_type(&self) -> QueryType {
        self.identifier_type.clone()
    }

    fn identifier_property_name(&self) -> SmolStr {
        self.identifier_property.clone()
    }

    fn identifier_column_names(&self) -> Vec<SmolStr> {
        vec![SmolStr::new_static("id")]
    }

    fn key_column_names(&self) -> Vec<SmolStr> {
        self.identifier_column_names()
    }

    fn root_entity_name(&self) -> SmolStr {
        self.name.clone()
    }

    fn property_spaces(&self) -> Vec<SmolStr> {
        vec![self.name.clone()]
    }

    fn query_spaces(&self) -> Vec<SmolStr> {
        vec![self.name.clone()]
    }

    fn to_columns(&self, _alias: &str, _path: &str) -> Vec<SmolStr> {
        vec![SmolStr::default()]
    }

    fn subclass_property_declarer(&self, _path: &str) -> Declarer {
        Declarer::Class
    }

    fn is_subclass_entity_name(&self, _entity_name: &str) -> bool {
        false
    }

    fn discriminator_sql_value(&self) -> &str {
        ""
    }

    fn table_alias_for_column(&self, _column: &str, _root_alias: &str) -> &str {
        ""
    }

    fn identifier_select_fragment(&self, _name: &str, _suffix: &str) -> String {
        String::new()
    }

    fn property_select_fragment(&self, _alias: &str, _suffix: &str, _all: bool) -> String {
        String::new()
    }

    fn mapped_superclass(&self) -> Option<SmolStr> {
        None
    }

    fn entity_mode(&self) -> EntityMode {
        EntityMode::Pojo
    }

    fn has_proxy(&self) -> bool {
        false
    }

    fn has_collections(&self) -> bool {
        false
    }

    fn has_mutable_properties(&self) -> bool {
        false
    }

    fn has_cascades(&self) -> bool {
        false
    }

    fn has_identifier_property(&self) -> bool {
        false
    }

    fn has_natural_identifier(&self) -> bool {
        false
    }

    fn has_lazy_properties(&self) -> bool {
        false
    }

    fn has_subclasses(&self) -> bool {
        false
    }

    fn has_cache(&self) -> bool {
        false
    }

    fn has_row_id(&self) -> bool {
        false
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn is_inherited(&self) -> bool {
        false
    }

    fn is_abstract(&self) -> bool {
        false
    }

    fn is_versioned(&self) -> bool {
        false
    }

    fn is_batch_loadable(&self) -> bool {
        false
    }

    fn is_multi_table(&self) -> bool {
        false
    }

    fn is_explicit_polymorphism(&self) -> bool {
        false
    }

    fn can_read_from_cache(&self) -> bool {
        false
    }

    fn can_write_to_cache(&self) -> bool {
        false
    }

    fn version_property(&self) -> Option<usize> {
        None
    }

    fn load(&self, _id: &EntityKey, _lock: LockMode) -> Result<Row, Unsupported> {
        unsupported("load")
    }

    fn multi_load(&self, _ids: &[EntityKey]) -> Result<Vec<Row>, Unsupported> {
        unsupported("multi_load")
    }

    fn insert(&self, _id: Option<&EntityKey>, _values: &Row) -> Result<EntityKey, Unsupported> {
        unsupported("insert")
    }

    fn update(&self, _id: &EntityKey, _values: &Row, _dirty: &[usize]) -> Result<(), Unsupported> {
        unsupported("update")
    }

    fn delete(&self, _id: &EntityKey, _version: Option<&str>) -> Result<(), Unsupported> {
        unsupported("delete")
    }

    fn lock(&self, _id: &EntityKey, _lock: LockMode) -> Result<(), Unsupported> {
        unsupported("lock")
    }

    fn find_dirty(&self, _current: &Row, _previous: &Row) -> Result<Vec<usize>, Unsupported> {
        unsupported("find_dirty")
    }

    fn find_modified(&self, _current: &Row, _previous: &Row) -> Result<Vec<usize>, Unsupported> {
        unsupported("find_modified")
    }

    fn database_snapshot(&self, _id: &EntityKey) -> Result<Row, Unsupported> {
        unsupported("database_snapshot")
    }

    fn current_version(&self, _id: &EntityKey) -> Result<Option<SmolStr>, Unsupported> {
        unsupported("current_version")
    }

    fn natural_identifier_properties(&self) -> Result<Vec<usize>, Unsupported> {
        unsupported("natural_identifier_properties")
    }

    fn natural_identifier_snapshot(&self, _id: &EntityKey) -> Result<Row, Unsupported> {
        unsupported("natural_identifier_snapshot")
    }

    fn load_entity_id_by_natural_id(&self, _values: &Row) -> Result<EntityKey, Unsupported> {
        unsupported("load_entity_id_by_natural_id")
    }

    fn instantiate(&self, _id: &EntityKey) -> Result<Infallible, Unsupported> {
        unsupported("instantiate")
    }

    fn identifier_generator(&self) -> Result<Infallible, Unsupported> {
        unsupported("identifier_generator")
    }

    fn cache_access_strategy(&self) -> Result<Infallible, Unsupported> {
        unsupported("cache_access_strategy")
    }

    fn natural_id_cache_access_strategy(&self) -> Result<Infallible, Unsupported> {
        unsupported("natural_id_cache_access_strategy")
    }

    fn entity_tuplizer(&self) -> Result<Infallible, Unsupported> {
        unsupported("entity_tuplizer")
    }

    fn entity_metamodel(&self) -> Result<Infallible, Unsupported> {
        unsupported("entity_metamodel")
    }

    fn concrete_proxy_class(&self) -> Result<Infallible, Unsupported> {
        unsupported("concrete_proxy_class")
    }

    fn post_instantiate(&self) -> Result<(), Unsupported> {
        unsupported("post_instantiate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InMemoryClassModel, MappingBuilder};
    use crate::types::CollectionKind;

    fn standalone(name: &str, class: &str) -> EntityDescriptor {
        EntityDescriptor::new(
            name.into(),
            EntityShape::Introspected {
                class: class.into(),
                model: Rc::new(InMemoryClassModel::example()),
            },
            &RegistryConfig::default(),
            Weak::new(),
        )
    }

    #[test]
    fn local_and_inherited_properties() {
        let employee = standalone("Employee", "com.acme.Employee");
        assert_eq!(employee.resolve_property_type("name"), Some(QueryType::String));
        assert_eq!(
            employee.resolve_property_type("salary"),
            Some(QueryType::BigDecimal)
        );
        assert_eq!(
            employee.resolve_property_type("manager"),
            Some(QueryType::Entity("Employee".into()))
        );
    }

    #[test]
    fn embedded_paths() {
        let person = standalone("Person", "com.acme.Person");
        assert_eq!(
            person.resolve_property_type("address"),
            Some(QueryType::Embedded("com.acme.Address".into()))
        );
        assert_eq!(person.resolve_property_type("address.city"), Some(QueryType::String));
        assert_eq!(person.resolve_property_type("address.zip"), Some(QueryType::Integer));
        assert_eq!(person.resolve_property_type("address.planet"), None);
        assert_eq!(person.resolve_property_type("name.length"), None);
        assert_eq!(person.resolve_property_type(""), None);
        assert_eq!(person.resolve_property_type(".name"), None);
    }

    #[test]
    fn association_identifier_path() {
        let order = standalone("Order", "com.acme.Order");
        assert_eq!(order.resolve_property_type("customer.id"), Some(QueryType::Integer));
        assert_eq!(order.resolve_property_type("customer.name"), None);
        assert_eq!(order.resolve_property_type("customer.id.x"), None);
    }

    #[test]
    fn collection_properties_carry_role() {
        let person = standalone("Person", "com.acme.Person");
        let Some(QueryType::Collection(orders)) = person.resolve_property_type("orders") else {
            panic!("expected a collection type");
        };
        assert_eq!(orders.role, "Person.orders");
        assert_eq!(orders.kind, CollectionKind::List);
    }

    #[test]
    fn hits_are_cached_misses_are_not() {
        let person = standalone("Person", "com.acme.Person");
        assert!(person.resolve_property_type("name").is_some());
        assert!(person.resolve_property_type("salary").is_none());
        let cache = person.property_types.borrow();
        assert!(cache.contains_key("name"));
        assert!(!cache.contains_key("salary"));
    }

    #[test]
    fn require_type_reports_entity_and_path() {
        let person = standalone("Person", "com.acme.Person");
        assert_eq!(
            person.require_type("nickname"),
            Err(SchemaError::NoSuchProperty {
                entity: "Person".into(),
                path: "nickname".into(),
            })
        );
    }

    #[test]
    fn detached_descriptor_has_no_subclasses() {
        let person = standalone("Person", "com.acme.Person");
        assert!(person.subclass_entity_names().is_empty());
        assert_eq!(person.identifier_property_name(), "id");
        assert_eq!(EntityPersister::identifier_type(&person), QueryType::Integer);
    }

    #[test]
    fn subclass_relation_between_shapes() {
        let person = standalone("Person", "com.acme.Person");
        let employee = standalone("Employee", "com.acme.Employee");
        assert!(person.is_subclass_descriptor(&employee));
        assert!(!employee.is_subclass_descriptor(&person));
        assert!(!person.is_subclass_descriptor(&person));

        let mapping = Rc::new(
            MappingBuilder::new()
                .with_entity("Animal", |e| e)
                .with_entity("Dog", |e| e.parent("Animal"))
                .build(),
        );
        let animal = EntityDescriptor::new(
            "Animal".into(),
            EntityShape::Mapped { mapping: mapping.clone() },
            &RegistryConfig::default(),
            Weak::new(),
        );
        let dog = EntityDescriptor::new(
            "Dog".into(),
            EntityShape::Mapped { mapping },
            &RegistryConfig::default(),
            Weak::new(),
        );
        assert!(animal.is_subclass_descriptor(&dog));
        assert!(!person.is_subclass_descriptor(&dog));
    }

    #[test]
    fn identifier_is_fixed_at_construction() {
        let config = RegistryConfig::new().with_identifier("code", QueryType::String);
        let order = EntityDescriptor::new(
            "Order".into(),
            EntityShape::Introspected {
                class: "com.acme.Order".into(),
                model: Rc::new(InMemoryClassModel::example()),
            },
            &config,
            Weak::new(),
        );
        assert_eq!(order.identifier_property_name(), "code");
        assert_eq!(order.resolve_property_type("customer.code"), Some(QueryType::String));
        assert_eq!(order.resolve_property_type("customer.id"), None);
    }

    #[test]
    fn component_paths_without_an_owning_member() {
        let person = standalone("Person", "com.acme.Person");
        assert_eq!(
            person.component_property_type("com.acme.Address", "city"),
            Some(QueryType::String)
        );
        assert_eq!(person.component_property_type("com.acme.Address", "planet"), None);
        assert_eq!(person.component_property_type("com.acme.Address", ""), None);
        assert_eq!(person.component_property_type("com.acme.Address", "city.x"), None);
    }

    #[test]
    fn runtime_operations_are_unsupported() {
        let person = standalone("Person", "com.acme.Person");
        let key = EntityKey("1".into());
        assert_eq!(person.load(&key, LockMode::Read).unwrap_err().operation, "load");
        assert_eq!(person.delete(&key, None).unwrap_err().operation, "delete");
        assert_eq!(
            person.find_dirty(&vec![], &vec![]).unwrap_err().operation,
            "find_dirty"
        );
        assert_eq!(
            person.cache_access_strategy().unwrap_err().operation,
            "cache_access_strategy"
        );
        assert!(person.post_instantiate().is_err());
    }

    #[test]
    fn descriptive_accessors_are_fixed() {
        let person = standalone("Person", "com.acme.Person");
        assert_eq!(person.root_entity_name(), "Person");
        assert_eq!(person.identifier_column_names(), vec![SmolStr::new("id")]);
        assert_eq!(person.property_spaces(), vec![SmolStr::new("Person")]);
        assert_eq!(person.to_columns("p", "name"), vec![SmolStr::default()]);
        assert_eq!(person.discriminator_sql_value(), "");
        assert_eq!(person.entity_mode(), EntityMode::Pojo);
        assert!(!person.has_proxy());
        assert_eq!(person.version_property(), None);
    }
}
