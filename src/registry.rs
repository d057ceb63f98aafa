//! The schema registry: entry point for static query validation.
//!
//! A [`SchemaRegistry`] lives for one validation session. It creates entity
//! and collection descriptors on first lookup, memoizes exactly one per name
//! or role, and hosts the session's [`FunctionValidator`].
//!
//! # Example
//!
//! ```
//! use query_validator::model::InMemoryClassModel;
//! use query_validator::registry::SchemaRegistry;
//! use query_validator::types::QueryType;
//!
//! let registry = SchemaRegistry::builder()
//!     .with_class_model(InMemoryClassModel::example())
//!     .build();
//!
//! let person = registry.descriptor_for("Person").unwrap();
//! assert_eq!(person.resolve_property_type("name"), Some(QueryType::String));
//! assert!(registry.descriptor_for("Ghost").is_err());
//! ```

use crate::collection::CollectionDescriptor;
use crate::config::{RegistryConfig, SubclassResolution};
use crate::entity::{EntityDescriptor, EntityShape};
use crate::error::{Result, SchemaError, Unsupported, unsupported};
use crate::function::{
    Dialect, DiagnosticSink, FunctionValidator, ResolvedFunction, StandardDialect, TracingSink,
};
use crate::model::{ClassModel, MappingSnapshot};
use crate::types::QueryType;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// A source of entity metadata.
#[derive(Clone)]
pub enum SchemaSource {
    /// Introspected classes.
    Classes(Rc<dyn ClassModel>),
    /// Declarative mapping documents.
    Mapping(Rc<MappingSnapshot>),
}

impl SchemaSource {
    /// Shape for `entity_name` if this source recognizes it.
    fn shape_for(&self, entity_name: &str) -> Option<EntityShape> {
        match self {
            SchemaSource::Classes(model) => {
                model
                    .entity_class(entity_name)
                    .map(|class| EntityShape::Introspected {
                        class,
                        model: model.clone(),
                    })
            }
            SchemaSource::Mapping(mapping) => {
                mapping.entity(entity_name).map(|_| EntityShape::Mapped {
                    mapping: mapping.clone(),
                })
            }
        }
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Classes(_) => f.write_str("Classes"),
            SchemaSource::Mapping(_) => f.write_str("Mapping"),
        }
    }
}

/// Shared session state. Descriptors hold a weak reference to it.
pub(crate) struct RegistryState {
    config: RegistryConfig,
    sources: Vec<SchemaSource>,
    entities: RefCell<IndexMap<SmolStr, Rc<EntityDescriptor>>>,
    collections: RefCell<IndexMap<SmolStr, Rc<CollectionDescriptor>>>,
    functions: FunctionValidator,
}

impl RegistryState {
    pub(crate) fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub(crate) fn known_entity_descriptors(&self) -> Vec<Rc<EntityDescriptor>> {
        self.entities.borrow().values().cloned().collect()
    }

    fn class_models(&self) -> impl Iterator<Item = &Rc<dyn ClassModel>> {
        self.sources.iter().filter_map(|source| match source {
            SchemaSource::Classes(model) => Some(model),
            SchemaSource::Mapping(_) => None,
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SchemaRegistry`].
pub struct SchemaRegistryBuilder {
    config: RegistryConfig,
    sources: Vec<SchemaSource>,
    dialect: Rc<dyn Dialect>,
    sink: Rc<dyn DiagnosticSink>,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            sources: Vec::new(),
            dialect: Rc::new(StandardDialect),
            sink: Rc::new(TracingSink),
        }
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an introspection source. Sources are consulted in the order
    /// they were added; the first one recognizing an entity name wins.
    pub fn with_class_model(self, model: impl ClassModel + 'static) -> Self {
        self.with_source(SchemaSource::Classes(Rc::new(model)))
    }

    /// Adds a mapping-document source.
    pub fn with_mapping(self, mapping: MappingSnapshot) -> Self {
        self.with_source(SchemaSource::Mapping(Rc::new(mapping)))
    }

    pub fn with_source(mut self, source: SchemaSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Replaces the [`StandardDialect`] function catalog.
    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Rc::new(dialect);
        self
    }

    /// Replaces the [`TracingSink`] receiving unknown-function warnings.
    pub fn with_sink(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> SchemaRegistry {
        let functions = FunctionValidator::new(self.dialect, self.sink, self.config.clone());
        SchemaRegistry {
            state: Rc::new(RegistryState {
                config: self.config,
                sources: self.sources,
                entities: RefCell::new(IndexMap::new()),
                collections: RefCell::new(IndexMap::new()),
                functions,
            }),
        }
    }
}

impl Default for SchemaRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SchemaRegistry
// ============================================================================

/// Per-session registry of entity and collection descriptors.
///
/// Cloning is cheap and shares the session.
#[derive(Clone)]
pub struct SchemaRegistry {
    state: Rc<RegistryState>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("sources", &self.state.sources)
            .field("entities", &self.state.entities.borrow().len())
            .field("collections", &self.state.collections.borrow().len())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.state.config
    }

    /// Returns the descriptor for `entity_name`, creating it on first use.
    ///
    /// Fails with [`SchemaError::UnmappedEntity`] if no source recognizes the
    /// name. Failures are not memoized.
    pub fn descriptor_for(&self, entity_name: &str) -> Result<Rc<EntityDescriptor>> {
        if let Some(descriptor) = self.state.entities.borrow().get(entity_name) {
            trace!(entity = entity_name, "entity descriptor cache hit");
            return Ok(descriptor.clone());
        }

        let shape = self
            .state
            .sources
            .iter()
            .find_map(|source| source.shape_for(entity_name))
            .ok_or_else(|| SchemaError::UnmappedEntity {
                name: entity_name.into(),
            })?;

        let descriptor = Rc::new(EntityDescriptor::new(
            entity_name.into(),
            shape,
            &self.state.config,
            Rc::downgrade(&self.state),
        ));
        debug!(entity = entity_name, shape = ?descriptor.shape(), "created entity descriptor");

        if self.state.config.subclass_resolution == SubclassResolution::AtCreation {
            for other in self.state.known_entity_descriptors() {
                other.add_if_subclass(&descriptor);
                descriptor.add_if_subclass(&other);
            }
        }

        self.state
            .entities
            .borrow_mut()
            .insert(SmolStr::new(entity_name), descriptor.clone());
        Ok(descriptor)
    }

    /// Returns the descriptor for collection role `role`
    /// (`<owner entity>.<property path>`), creating it on first use.
    pub fn collection_descriptor_for(&self, role: &str) -> Result<Rc<CollectionDescriptor>> {
        if let Some(descriptor) = self.state.collections.borrow().get(role) {
            trace!(role, "collection descriptor cache hit");
            return Ok(descriptor.clone());
        }

        let descriptor = Rc::new(self.create_collection_descriptor(role)?);
        debug!(role, kind = descriptor.kind().name(), "created collection descriptor");

        self.state
            .collections
            .borrow_mut()
            .insert(SmolStr::new(role), descriptor.clone());
        Ok(descriptor)
    }

    /// Owner entity names may contain dots, so split points are tried from
    /// the right until an owner declaring the remaining path is found.
    fn create_collection_descriptor(&self, role: &str) -> Result<CollectionDescriptor> {
        for (index, _) in role.rmatch_indices('.') {
            let (owner, path) = (&role[..index], &role[index + 1..]);
            let Ok(entity) = self.descriptor_for(owner) else {
                continue;
            };
            if let Some(member) = entity.declared_member(path) {
                return CollectionDescriptor::new(role, owner, member);
            }
        }
        Err(SchemaError::UnmappedCollection { role: role.into() })
    }

    /// Snapshot of every entity descriptor realized so far, in creation order.
    ///
    /// Only reflects descriptors created by earlier lookups in this session.
    pub fn known_entity_descriptors(&self) -> Vec<Rc<EntityDescriptor>> {
        self.state.known_entity_descriptors()
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Resolves a call-site function name. See
    /// [`FunctionValidator::resolve_function`].
    pub fn resolve_function(&self, name: &str) -> Option<ResolvedFunction> {
        self.state.functions.resolve_function(name)
    }

    pub fn function_validator(&self) -> &FunctionValidator {
        &self.state.functions
    }

    /// Unknown function names warned about so far, sorted.
    pub fn warned_functions(&self) -> Vec<SmolStr> {
        self.state.functions.warned_functions()
    }

    // ========================================================================
    // Session-level lookups
    // ========================================================================

    pub fn identifier_type(&self, entity_name: &str) -> Result<QueryType> {
        self.descriptor_for(entity_name)?;
        Ok(self.state.config.identifier_type.clone())
    }

    pub fn identifier_property_name(&self, entity_name: &str) -> Result<SmolStr> {
        self.descriptor_for(entity_name)?;
        Ok(self.state.config.identifier_property.clone())
    }

    /// Type of `path` on `entity_name`, failing if either is unmapped.
    pub fn referenced_property_type(&self, entity_name: &str, path: &str) -> Result<QueryType> {
        self.descriptor_for(entity_name)?.require_type(path)
    }

    /// Imports are not tracked; every name is its own import.
    pub fn imported_class_name<'a>(&self, name: &'a str) -> &'a str {
        name
    }

    pub fn is_class_defined(&self, qualified_name: &str) -> bool {
        self.state
            .class_models()
            .any(|model| model.class_exists(qualified_name))
    }

    pub fn is_field_defined(&self, qualified_class_name: &str, field_name: &str) -> bool {
        self.state
            .class_models()
            .any(|model| model.field_exists(qualified_class_name, field_name))
    }

    /// Checks an instantiation (`select new Class(...)`) target.
    pub fn check_instantiation(&self, qualified_name: &str, argument_types: &[QueryType]) -> Result<()> {
        if !self.is_class_defined(qualified_name) {
            return Err(SchemaError::UnknownClass {
                name: qualified_name.into(),
            });
        }
        let found = self
            .state
            .class_models()
            .any(|model| model.constructor_exists(qualified_name, argument_types));
        if found {
            Ok(())
        } else {
            Err(SchemaError::NoSuchConstructor {
                class: qualified_name.into(),
                arguments: argument_types.iter().map(QueryType::name).collect(),
            })
        }
    }

    // ========================================================================
    // Session contract
    // ========================================================================

    pub fn is_open(&self) -> bool {
        true
    }

    pub fn defined_filter_names(&self) -> Vec<SmolStr> {
        Vec::new()
    }

    pub fn contains_fetch_profile(&self, _name: &str) -> bool {
        false
    }

    pub fn open_session(&self) -> std::result::Result<Infallible, Unsupported> {
        unsupported("open_session")
    }

    pub fn statistics(&self) -> std::result::Result<Infallible, Unsupported> {
        unsupported("statistics")
    }

    pub fn identifier_generator(&self, _entity_name: &str) -> std::result::Result<Infallible, Unsupported> {
        unsupported("identifier_generator")
    }

    pub fn filter_definition(&self, _name: &str) -> std::result::Result<Infallible, Unsupported> {
        unsupported("filter_definition")
    }

    pub fn query_plan_cache(&self) -> std::result::Result<Infallible, Unsupported> {
        unsupported("query_plan_cache")
    }

    pub fn named_query_repository(&self) -> std::result::Result<Infallible, Unsupported> {
        unsupported("named_query_repository")
    }

    pub fn fetch_profile(&self, _name: &str) -> std::result::Result<Infallible, Unsupported> {
        unsupported("fetch_profile")
    }

    pub fn entity_graph_by_name(&self, _name: &str) -> std::result::Result<Infallible, Unsupported> {
        unsupported("entity_graph_by_name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::CollectingSink;
    use crate::model::{InMemoryClassModel, MappingBuilder, MemberType};
    use crate::types::CollectionKind;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .with_class_model(InMemoryClassModel::example())
            .build()
    }

    #[test]
    fn descriptors_are_memoized_by_name() {
        let registry = registry();
        let first = registry.descriptor_for("Person").unwrap();
        let second = registry.descriptor_for("Person").unwrap();
        let order = registry.descriptor_for("Order").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(!Rc::ptr_eq(&first, &order));
        assert_eq!(registry.known_entity_descriptors().len(), 2);
    }

    #[test]
    fn unmapped_entity_is_not_memoized() {
        let registry = registry();
        let err = registry.descriptor_for("Ghost").unwrap_err();
        assert_eq!(err, SchemaError::UnmappedEntity { name: "Ghost".into() });
        assert!(registry.known_entity_descriptors().is_empty());
    }

    #[test]
    fn first_recognizing_source_decides_the_shape() {
        let mapping = MappingBuilder::new()
            .with_entity("Person", |e| e.property("alias", MemberType::basic("String")))
            .with_entity("Invoice", |e| e.property("number", MemberType::basic("long")))
            .build();
        let registry = SchemaRegistry::builder()
            .with_class_model(InMemoryClassModel::example())
            .with_mapping(mapping)
            .build();

        let person = registry.descriptor_for("Person").unwrap();
        assert!(matches!(person.shape(), EntityShape::Introspected { .. }));
        assert_eq!(person.resolve_property_type("alias"), None);

        let invoice = registry.descriptor_for("Invoice").unwrap();
        assert!(matches!(invoice.shape(), EntityShape::Mapped { .. }));
        assert_eq!(invoice.resolve_property_type("number"), Some(QueryType::Long));
    }

    #[test]
    fn subclass_fallback_on_demand() {
        let registry = registry();
        let person = registry.descriptor_for("Person").unwrap();
        assert_eq!(person.resolve_property_type("salary"), None);

        registry.descriptor_for("Employee").unwrap();
        assert_eq!(
            person.resolve_property_type("salary"),
            Some(QueryType::BigDecimal)
        );
        assert_eq!(person.subclass_entity_names(), vec!["Employee"]);
    }

    #[test]
    fn subclass_edges_recorded_at_creation_in_both_directions() {
        let config = RegistryConfig::new().with_subclass_resolution(SubclassResolution::AtCreation);
        let registry = SchemaRegistry::builder()
            .with_config(config)
            .with_class_model(InMemoryClassModel::example())
            .build();

        let employee = registry.descriptor_for("Employee").unwrap();
        let person = registry.descriptor_for("Person").unwrap();
        assert_eq!(person.subclass_entity_names(), vec!["Employee"]);
        assert!(employee.subclass_entity_names().is_empty());
        assert_eq!(
            person.resolve_property_type("manager"),
            Some(QueryType::Entity("Employee".into()))
        );
    }

    #[test]
    fn collection_roles() {
        let registry = registry();
        let orders = registry.collection_descriptor_for("Person.orders").unwrap();
        assert_eq!(orders.kind(), CollectionKind::List);
        assert_eq!(orders.owner_entity_name(), "Person");
        assert!(Rc::ptr_eq(
            &orders,
            &registry.collection_descriptor_for("Person.orders").unwrap()
        ));

        let nicknames = registry.collection_descriptor_for("Person.nicknames").unwrap();
        assert_eq!(nicknames.kind(), CollectionKind::SortedSet);

        let qualified = registry
            .collection_descriptor_for("com.acme.Person.phones")
            .unwrap();
        assert_eq!(qualified.owner_entity_name(), "com.acme.Person");
        assert_eq!(qualified.kind(), CollectionKind::Map);
    }

    #[test]
    fn collection_role_failures() {
        let registry = registry();
        assert_eq!(
            registry.collection_descriptor_for("Person.name").unwrap_err(),
            SchemaError::NotACollection { role: "Person.name".into() }
        );
        assert_eq!(
            registry.collection_descriptor_for("Person.pets").unwrap_err(),
            SchemaError::UnmappedCollection { role: "Person.pets".into() }
        );
        assert_eq!(
            registry.collection_descriptor_for("orders").unwrap_err(),
            SchemaError::UnmappedCollection { role: "orders".into() }
        );
    }

    #[test]
    fn function_warnings_reach_the_configured_sink() {
        let sink = Rc::new(CollectingSink::new());
        let registry = SchemaRegistry::builder()
            .with_config(RegistryConfig::new().with_whitelisted_function("soundex"))
            .with_sink(sink.clone())
            .build();

        registry.resolve_function("levenshtein");
        registry.resolve_function("levenshtein");
        registry.resolve_function("soundex");
        registry.resolve_function("lower");
        assert_eq!(sink.warnings().len(), 1);
        assert_eq!(registry.warned_functions(), vec!["levenshtein"]);
    }

    #[test]
    fn session_level_lookups() {
        let registry = registry();
        assert_eq!(registry.identifier_type("Order").unwrap(), QueryType::Integer);
        assert_eq!(registry.identifier_property_name("Order").unwrap(), "id");
        assert_eq!(
            registry.referenced_property_type("Order", "total").unwrap(),
            QueryType::Double
        );
        assert_eq!(
            registry.referenced_property_type("Order", "discount").unwrap_err(),
            SchemaError::NoSuchProperty {
                entity: "Order".into(),
                path: "discount".into(),
            }
        );
        assert_eq!(registry.imported_class_name("Person"), "Person");
        assert!(registry.is_class_defined("com.acme.Address"));
        assert!(registry.is_field_defined("com.acme.Address", "city"));
        assert!(!registry.is_field_defined("com.acme.Employee", "name"));
    }

    #[test]
    fn instantiation_checks() {
        let registry = registry();
        assert!(registry
            .check_instantiation("com.acme.OrderSummary", &[QueryType::String, QueryType::Double])
            .is_ok());
        assert_eq!(
            registry
                .check_instantiation("com.acme.OrderSummary", &[QueryType::Boolean])
                .unwrap_err(),
            SchemaError::NoSuchConstructor {
                class: "com.acme.OrderSummary".into(),
                arguments: vec!["Boolean".into()],
            }
        );
        assert!(matches!(
            registry.check_instantiation("com.acme.Missing", &[]),
            Err(SchemaError::UnknownClass { .. })
        ));
    }

    #[test]
    fn session_contract() {
        let registry = registry();
        assert!(registry.is_open());
        assert!(registry.defined_filter_names().is_empty());
        assert!(!registry.contains_fetch_profile("eager"));
        assert_eq!(registry.open_session().unwrap_err().operation, "open_session");
        assert_eq!(
            registry.named_query_repository().unwrap_err().operation,
            "named_query_repository"
        );
    }
}
