//! Sources of static facts about entities.
//!
//! Two kinds of metadata feed the registry:
//!
//! - **Class models** ([`ClassModel`]): introspected class, field and
//!   constructor facts, typically supplied by a compiler front end. An
//!   [`InMemoryClassModel`] built with [`ClassModelBuilder`] serves tests and
//!   tools that already hold the facts.
//! - **Mapping documents** ([`MappingSnapshot`]): declarative entity mappings
//!   with explicit properties and parent entities.
//!
//! Both describe members with [`MemberType`] facts, which
//! [`TypeBridge`](crate::types::TypeBridge) turns into query types.

use crate::types::QueryType;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// Member facts
// ============================================================================

/// Declared type of a field or mapped property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberType {
    /// Basic value, by class name (`int`, `String`, `java.time.LocalDate`).
    Basic(SmolStr),
    /// Enumerated value, by enum class name.
    Enum(SmolStr),
    /// To-one association, by target entity name.
    Association(SmolStr),
    /// Embedded component, by component class name.
    Embedded(SmolStr),
    /// Collection-valued member.
    Collection {
        /// Declared shape token (`List`, `SortedSet`, `Map`, ...).
        shape: SmolStr,
        element: Box<MemberType>,
        /// Key fact, maps only.
        key: Option<Box<MemberType>>,
    },
}

impl MemberType {
    pub fn basic(class_name: impl Into<SmolStr>) -> Self {
        MemberType::Basic(class_name.into())
    }

    pub fn enumeration(class_name: impl Into<SmolStr>) -> Self {
        MemberType::Enum(class_name.into())
    }

    pub fn association(entity_name: impl Into<SmolStr>) -> Self {
        MemberType::Association(entity_name.into())
    }

    pub fn embedded(class_name: impl Into<SmolStr>) -> Self {
        MemberType::Embedded(class_name.into())
    }

    /// A non-map collection such as `List<element>`.
    pub fn collection(shape: impl Into<SmolStr>, element: MemberType) -> Self {
        MemberType::Collection {
            shape: shape.into(),
            element: Box::new(element),
            key: None,
        }
    }

    /// A map collection from `key` to `element`.
    pub fn map(shape: impl Into<SmolStr>, key: MemberType, element: MemberType) -> Self {
        MemberType::Collection {
            shape: shape.into(),
            element: Box::new(element),
            key: Some(Box::new(key)),
        }
    }
}

// ============================================================================
// ClassModel
// ============================================================================

/// Introspection source for class, field and constructor facts.
///
/// Implementations are expected to be synchronous and side-effect free.
/// Only the synthesis hooks of introspected descriptors and the registry's
/// class checks call into it.
pub trait ClassModel {
    /// Returns true if a class with this qualified name exists.
    fn class_exists(&self, qualified_name: &str) -> bool;

    /// Returns true if `field_name` is declared directly on the class.
    fn field_exists(&self, qualified_class_name: &str, field_name: &str) -> bool;

    /// Returns true if the class declares a constructor accepting arguments
    /// of the given types.
    fn constructor_exists(&self, qualified_class_name: &str, argument_types: &[QueryType]) -> bool;

    /// Resolves an entity name (simple or qualified) to its class.
    ///
    /// Returns `None` if no entity class has this name.
    fn entity_class(&self, entity_name: &str) -> Option<SmolStr>;

    /// Declared type of a field declared directly on the class.
    fn field_type(&self, qualified_class_name: &str, field_name: &str) -> Option<MemberType>;

    /// Direct superclass, if it is known to the model.
    fn superclass(&self, qualified_class_name: &str) -> Option<SmolStr>;
}

/// Facts about one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFact {
    /// Qualified class name.
    pub name: SmolStr,
    /// Entity name if the class is an entity.
    pub entity_name: Option<SmolStr>,
    pub superclass: Option<SmolStr>,
    /// Fields declared on this class (ordered by name for determinism).
    pub fields: BTreeMap<SmolStr, MemberType>,
    /// Parameter types of each declared constructor.
    pub constructors: Vec<Vec<QueryType>>,
}

/// In-memory class model.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClassModel {
    classes: HashMap<SmolStr, ClassFact>,
    entity_names: HashMap<SmolStr, SmolStr>,
}

impl InMemoryClassModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class; entity classes are registered under their entity name
    /// and their qualified class name.
    pub fn add_class(&mut self, class: ClassFact) {
        if let Some(entity_name) = &class.entity_name {
            self.entity_names
                .insert(entity_name.clone(), class.name.clone());
            self.entity_names
                .insert(class.name.clone(), class.name.clone());
        }
        self.classes.insert(class.name.clone(), class);
    }

    /// Creates the model used throughout the crate's examples: a `Person`
    /// with an embedded `Address`, an `Employee` subclass and `Order`s.
    pub fn example() -> Self {
        ClassModelBuilder::new()
            .with_entity("com.acme.Person", |class| {
                class
                    .field("id", MemberType::basic("long"))
                    .field("name", MemberType::basic("String"))
                    .field("birthDate", MemberType::basic("java.time.LocalDate"))
                    .field("address", MemberType::embedded("com.acme.Address"))
                    .field(
                        "orders",
                        MemberType::collection("List", MemberType::association("Order")),
                    )
                    .field(
                        "nicknames",
                        MemberType::collection("SortedSet", MemberType::basic("String")),
                    )
                    .field(
                        "phones",
                        MemberType::map(
                            "Map",
                            MemberType::basic("String"),
                            MemberType::basic("String"),
                        ),
                    )
            })
            .with_entity("com.acme.Employee", |class| {
                class
                    .extends("com.acme.Person")
                    .field("salary", MemberType::basic("java.math.BigDecimal"))
                    .field("manager", MemberType::association("Employee"))
            })
            .with_entity("com.acme.Order", |class| {
                class
                    .field("id", MemberType::basic("long"))
                    .field("total", MemberType::basic("double"))
                    .field("status", MemberType::enumeration("com.acme.OrderStatus"))
                    .field("customer", MemberType::association("Person"))
            })
            .with_class("com.acme.Address", |class| {
                class
                    .field("street", MemberType::basic("String"))
                    .field("city", MemberType::basic("String"))
                    .field("zip", MemberType::basic("int"))
            })
            .with_class("com.acme.OrderSummary", |class| {
                class.constructor([QueryType::String, QueryType::Double])
            })
            .build()
    }
}

impl ClassModel for InMemoryClassModel {
    fn class_exists(&self, qualified_name: &str) -> bool {
        self.classes.contains_key(qualified_name)
    }

    fn field_exists(&self, qualified_class_name: &str, field_name: &str) -> bool {
        self.classes
            .get(qualified_class_name)
            .is_some_and(|class| class.fields.contains_key(field_name))
    }

    fn constructor_exists(&self, qualified_class_name: &str, argument_types: &[QueryType]) -> bool {
        let Some(class) = self.classes.get(qualified_class_name) else {
            return false;
        };
        class.constructors.iter().any(|parameters| {
            parameters.len() == argument_types.len()
                && parameters
                    .iter()
                    .zip(argument_types)
                    .all(|(parameter, argument)| argument.is_compatible_with(parameter))
        })
    }

    fn entity_class(&self, entity_name: &str) -> Option<SmolStr> {
        self.entity_names.get(entity_name).cloned()
    }

    fn field_type(&self, qualified_class_name: &str, field_name: &str) -> Option<MemberType> {
        self.classes
            .get(qualified_class_name)
            .and_then(|class| class.fields.get(field_name))
            .cloned()
    }

    fn superclass(&self, qualified_class_name: &str) -> Option<SmolStr> {
        self.classes
            .get(qualified_class_name)
            .and_then(|class| class.superclass.clone())
    }
}

/// Finds a field on a class or any of its superclasses.
///
/// Superclass cycles in a broken model terminate the walk.
pub fn inherited_field_type(
    model: &dyn ClassModel,
    qualified_class_name: &str,
    field_name: &str,
) -> Option<MemberType> {
    let mut visited = HashSet::new();
    let mut current = Some(SmolStr::new(qualified_class_name));
    while let Some(class) = current {
        if !visited.insert(class.clone()) {
            return None;
        }
        if model.field_exists(&class, field_name) {
            if let Some(member) = model.field_type(&class, field_name) {
                return Some(member);
            }
        }
        current = model.superclass(&class);
    }
    None
}

/// Returns true if `class` extends `ancestor`, directly or transitively.
pub fn extends(model: &dyn ClassModel, class: &str, ancestor: &str) -> bool {
    let mut visited = HashSet::new();
    let mut current = model.superclass(class);
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        if !visited.insert(parent.clone()) {
            return false;
        }
        current = model.superclass(&parent);
    }
    false
}

// ============================================================================
// ClassModelBuilder
// ============================================================================

/// Builder for in-memory class models.
///
/// # Example
///
/// ```
/// use query_validator::model::{ClassModel, ClassModelBuilder, MemberType};
///
/// let model = ClassModelBuilder::new()
///     .with_entity("com.acme.Person", |class| {
///         class.field("name", MemberType::basic("String"))
///     })
///     .build();
///
/// assert_eq!(model.entity_class("Person").as_deref(), Some("com.acme.Person"));
/// assert!(model.field_exists("com.acme.Person", "name"));
/// ```
pub struct ClassModelBuilder {
    model: InMemoryClassModel,
}

impl ClassModelBuilder {
    pub fn new() -> Self {
        Self {
            model: InMemoryClassModel::new(),
        }
    }

    /// Adds an entity class named after its simple class name.
    pub fn with_entity<F>(self, qualified_name: impl Into<SmolStr>, builder_fn: F) -> Self
    where
        F: FnOnce(ClassBuilder) -> ClassBuilder,
    {
        let qualified_name = qualified_name.into();
        let entity_name = simple_name(&qualified_name);
        self.with_named_entity(entity_name, qualified_name, builder_fn)
    }

    /// Adds an entity class with an explicit entity name.
    pub fn with_named_entity<F>(
        mut self,
        entity_name: impl Into<SmolStr>,
        qualified_name: impl Into<SmolStr>,
        builder_fn: F,
    ) -> Self
    where
        F: FnOnce(ClassBuilder) -> ClassBuilder,
    {
        let mut builder = ClassBuilder::new(qualified_name.into());
        builder.entity_name = Some(entity_name.into());
        self.model.add_class(builder_fn(builder).build());
        self
    }

    /// Adds a plain class: an embeddable, a superclass, or an instantiation target.
    pub fn with_class<F>(mut self, qualified_name: impl Into<SmolStr>, builder_fn: F) -> Self
    where
        F: FnOnce(ClassBuilder) -> ClassBuilder,
    {
        let builder = ClassBuilder::new(qualified_name.into());
        self.model.add_class(builder_fn(builder).build());
        self
    }

    pub fn build(self) -> InMemoryClassModel {
        self.model
    }
}

impl Default for ClassModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one class.
pub struct ClassBuilder {
    name: SmolStr,
    entity_name: Option<SmolStr>,
    superclass: Option<SmolStr>,
    fields: BTreeMap<SmolStr, MemberType>,
    constructors: Vec<Vec<QueryType>>,
}

impl ClassBuilder {
    pub fn new(name: SmolStr) -> Self {
        Self {
            name,
            entity_name: None,
            superclass: None,
            fields: BTreeMap::new(),
            constructors: vec![],
        }
    }

    pub fn field(mut self, name: impl Into<SmolStr>, member: MemberType) -> Self {
        self.fields.insert(name.into(), member);
        self
    }

    pub fn extends(mut self, superclass: impl Into<SmolStr>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn constructor(mut self, parameters: impl IntoIterator<Item = QueryType>) -> Self {
        self.constructors.push(parameters.into_iter().collect());
        self
    }

    pub fn build(self) -> ClassFact {
        ClassFact {
            name: self.name,
            entity_name: self.entity_name,
            superclass: self.superclass,
            fields: self.fields,
            constructors: self.constructors,
        }
    }
}

fn simple_name(qualified_name: &str) -> SmolStr {
    SmolStr::new(qualified_name.rsplit('.').next().unwrap_or(qualified_name))
}

// ============================================================================
// Mapping documents
// ============================================================================

/// One entity declared in a mapping document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    pub name: SmolStr,
    /// Mapped properties (ordered by name for determinism).
    pub properties: BTreeMap<SmolStr, MemberType>,
    /// Parent entity in the mapped hierarchy.
    pub parent: Option<SmolStr>,
}

/// Immutable view of declaratively mapped entities and components.
#[derive(Debug, Clone, Default)]
pub struct MappingSnapshot {
    entities: HashMap<SmolStr, EntityMapping>,
    components: HashMap<SmolStr, BTreeMap<SmolStr, MemberType>>,
}

impl MappingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, mapping: EntityMapping) {
        self.entities.insert(mapping.name.clone(), mapping);
    }

    pub fn add_component(
        &mut self,
        class_name: impl Into<SmolStr>,
        properties: BTreeMap<SmolStr, MemberType>,
    ) {
        self.components.insert(class_name.into(), properties);
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.get(name)
    }

    /// Looks up a property on an entity or its mapped ancestors.
    pub fn property(&self, entity: &str, property: &str) -> Option<&MemberType> {
        let mut visited = HashSet::new();
        self.find_property_with_inheritance(entity, property, &mut visited)
    }

    fn find_property_with_inheritance(
        &self,
        entity: &str,
        property: &str,
        visited: &mut HashSet<SmolStr>,
    ) -> Option<&MemberType> {
        if !visited.insert(SmolStr::new(entity)) {
            return None;
        }
        let mapping = self.entities.get(entity)?;
        if let Some(member) = mapping.properties.get(property) {
            return Some(member);
        }
        let parent = mapping.parent.as_ref()?;
        self.find_property_with_inheritance(parent, property, visited)
    }

    /// Looks up a property of an embedded component.
    pub fn component_property(&self, class_name: &str, property: &str) -> Option<&MemberType> {
        self.components
            .get(class_name)
            .and_then(|properties| properties.get(property))
    }

    /// Returns true if `entity` descends from `ancestor` in the mapped hierarchy.
    pub fn descends_from(&self, entity: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = self.entities.get(entity).and_then(|m| m.parent.clone());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if !visited.insert(parent.clone()) {
                return false;
            }
            current = self.entities.get(&parent).and_then(|m| m.parent.clone());
        }
        false
    }
}

/// Builder for mapping snapshots.
pub struct MappingBuilder {
    snapshot: MappingSnapshot,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self {
            snapshot: MappingSnapshot::new(),
        }
    }

    /// Adds an entity mapping using a builder closure.
    pub fn with_entity<F>(mut self, name: impl Into<SmolStr>, builder_fn: F) -> Self
    where
        F: FnOnce(EntityMappingBuilder) -> EntityMappingBuilder,
    {
        let builder = EntityMappingBuilder {
            name: name.into(),
            properties: BTreeMap::new(),
            parent: None,
        };
        self.snapshot.add_entity(builder_fn(builder).build());
        self
    }

    /// Adds an embeddable component's properties.
    pub fn with_component<I, K>(mut self, class_name: impl Into<SmolStr>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, MemberType)>,
        K: Into<SmolStr>,
    {
        let properties = properties
            .into_iter()
            .map(|(name, member)| (name.into(), member))
            .collect();
        self.snapshot.add_component(class_name, properties);
        self
    }

    pub fn build(self) -> MappingSnapshot {
        self.snapshot
    }
}

impl Default for MappingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one entity mapping.
pub struct EntityMappingBuilder {
    name: SmolStr,
    properties: BTreeMap<SmolStr, MemberType>,
    parent: Option<SmolStr>,
}

impl EntityMappingBuilder {
    pub fn property(mut self, name: impl Into<SmolStr>, member: MemberType) -> Self {
        self.properties.insert(name.into(), member);
        self
    }

    pub fn parent(mut self, parent: impl Into<SmolStr>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn build(self) -> EntityMapping {
        EntityMapping {
            name: self.name,
            properties: self.properties,
            parent: self.parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_model_registers_entities_by_both_names() {
        let model = InMemoryClassModel::example();
        assert_eq!(model.entity_class("Person").as_deref(), Some("com.acme.Person"));
        assert_eq!(
            model.entity_class("com.acme.Person").as_deref(),
            Some("com.acme.Person")
        );
        assert!(model.entity_class("Address").is_none());
        assert!(model.class_exists("com.acme.Address"));
    }

    #[test]
    fn field_lookup_walks_superclasses() {
        let model = InMemoryClassModel::example();
        assert!(!model.field_exists("com.acme.Employee", "name"));
        assert_eq!(
            inherited_field_type(&model, "com.acme.Employee", "name"),
            Some(MemberType::basic("String"))
        );
        assert!(inherited_field_type(&model, "com.acme.Person", "salary").is_none());
    }

    #[test]
    fn superclass_cycles_terminate() {
        let model = ClassModelBuilder::new()
            .with_entity("a.A", |class| class.extends("a.B"))
            .with_entity("a.B", |class| class.extends("a.A"))
            .build();
        assert!(inherited_field_type(&model, "a.A", "missing").is_none());
        assert!(extends(&model, "a.A", "a.B"));
        assert!(!extends(&model, "a.A", "a.C"));
    }

    #[test]
    fn constructor_matching() {
        let model = InMemoryClassModel::example();
        assert!(model.constructor_exists(
            "com.acme.OrderSummary",
            &[QueryType::String, QueryType::Double]
        ));
        // Unknown arguments never reject a constructor.
        assert!(model.constructor_exists(
            "com.acme.OrderSummary",
            &[QueryType::Unknown, QueryType::Double]
        ));
        assert!(!model.constructor_exists("com.acme.OrderSummary", &[QueryType::String]));
        assert!(!model.constructor_exists("com.acme.Missing", &[]));
    }

    #[test]
    fn mapping_property_inheritance() {
        let mapping = MappingBuilder::new()
            .with_entity("Animal", |e| e.property("name", MemberType::basic("String")))
            .with_entity("Dog", |e| {
                e.parent("Animal")
                    .property("breed", MemberType::basic("String"))
            })
            .build();

        assert!(mapping.property("Dog", "name").is_some());
        assert!(mapping.property("Dog", "breed").is_some());
        assert!(mapping.property("Animal", "breed").is_none());
        assert!(mapping.descends_from("Dog", "Animal"));
        assert!(!mapping.descends_from("Animal", "Dog"));
    }

    #[test]
    fn mapping_components() {
        let mapping = MappingBuilder::new()
            .with_component("Money", [("amount", MemberType::basic("BigDecimal"))])
            .build();
        assert_eq!(
            mapping.component_property("Money", "amount"),
            Some(&MemberType::basic("BigDecimal"))
        );
        assert!(mapping.component_property("Money", "currency").is_none());
    }
}
