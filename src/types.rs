//! Query type representation and the bridge from class facts to it.
//!
//! [`TypeBridge`] is stateless: it maps member facts reported by a
//! [`ClassModel`](crate::model::ClassModel) or a mapping document into
//! [`QueryType`]s. Anything it cannot classify becomes the shared
//! [`UNKNOWN_TYPE`] so that validation of the surrounding expression can
//! continue.

use crate::model::MemberType;
use smol_str::SmolStr;
use std::fmt;

/// The placeholder type used whenever static facts are insufficient.
pub static UNKNOWN_TYPE: QueryType = QueryType::Unknown;

/// Type of a property, path or expression as the query language sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Character,
    String,
    Date,
    Time,
    Timestamp,
    Instant,
    Binary,
    Uuid,

    /// Enumerated type, by class name.
    Enum(SmolStr),

    /// Reference to a mapped entity, by entity name.
    Entity(SmolStr),

    /// Embedded component, by class name.
    Embedded(SmolStr),

    /// Collection-valued role.
    Collection(CollectionType),

    /// Not enough information; compatible with everything.
    Unknown,
}

impl QueryType {
    /// Returns true for the numeric basic types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            QueryType::Byte
                | QueryType::Short
                | QueryType::Integer
                | QueryType::Long
                | QueryType::Float
                | QueryType::Double
                | QueryType::BigInteger
                | QueryType::BigDecimal
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, QueryType::Unknown)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, QueryType::Entity(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, QueryType::Collection(_))
    }

    /// Returns the entity name for entity references.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            QueryType::Entity(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if a value of this type may be compared with or bound to `other`.
    pub fn is_compatible_with(&self, other: &QueryType) -> bool {
        if self == other || self.is_unknown() || other.is_unknown() {
            return true;
        }
        if self.is_numeric() && other.is_numeric() {
            return true;
        }
        match (self, other) {
            (QueryType::Date | QueryType::Timestamp, QueryType::Date | QueryType::Timestamp) => {
                true
            }
            (QueryType::Character, QueryType::String) | (QueryType::String, QueryType::Character) => {
                true
            }
            _ => false,
        }
    }

    /// Returns a human-readable name for this type.
    pub fn name(&self) -> String {
        match self {
            QueryType::Boolean => "Boolean".to_string(),
            QueryType::Byte => "Byte".to_string(),
            QueryType::Short => "Short".to_string(),
            QueryType::Integer => "Integer".to_string(),
            QueryType::Long => "Long".to_string(),
            QueryType::Float => "Float".to_string(),
            QueryType::Double => "Double".to_string(),
            QueryType::BigInteger => "BigInteger".to_string(),
            QueryType::BigDecimal => "BigDecimal".to_string(),
            QueryType::Character => "Character".to_string(),
            QueryType::String => "String".to_string(),
            QueryType::Date => "Date".to_string(),
            QueryType::Time => "Time".to_string(),
            QueryType::Timestamp => "Timestamp".to_string(),
            QueryType::Instant => "Instant".to_string(),
            QueryType::Binary => "Binary".to_string(),
            QueryType::Uuid => "Uuid".to_string(),
            QueryType::Enum(class) => format!("Enum:{}", class),
            QueryType::Entity(name) => format!("Entity:{}", name),
            QueryType::Embedded(class) => format!("Embedded:{}", class),
            QueryType::Collection(collection) => format!(
                "{}<{}>",
                collection.kind.name(),
                collection.element.name()
            ),
            QueryType::Unknown => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Shape of a collection-valued role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Set,
    SortedSet,
    Map,
    SortedMap,
    /// Unordered, duplicates allowed. Used whenever the shape is ambiguous.
    Bag,
}

impl CollectionKind {
    /// Classifies a declared collection shape token.
    ///
    /// Generic arguments and a package prefix are ignored, so
    /// `java.util.SortedSet<Item>` classifies like `SortedSet`.
    ///
    /// A declared `Set` may be mapped as an ordered bag; that needs ordering
    /// metadata this token does not carry, so it classifies as a set.
    pub fn classify(token: &str) -> CollectionKind {
        let raw = token.split('<').next().unwrap_or(token).trim();
        let simple = raw.rsplit('.').next().unwrap_or(raw);
        match simple {
            "Set" | "HashSet" | "LinkedHashSet" => CollectionKind::Set,
            "SortedSet" | "NavigableSet" | "TreeSet" => CollectionKind::SortedSet,
            "List" | "ArrayList" | "LinkedList" | "SortedList" => CollectionKind::List,
            "Map" | "HashMap" | "LinkedHashMap" => CollectionKind::Map,
            "SortedMap" | "NavigableMap" | "TreeMap" => CollectionKind::SortedMap,
            _ => CollectionKind::Bag,
        }
    }

    pub fn is_map(self) -> bool {
        matches!(self, CollectionKind::Map | CollectionKind::SortedMap)
    }

    /// Returns true if elements are addressable by an index or key.
    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            CollectionKind::List | CollectionKind::Map | CollectionKind::SortedMap
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::List => "List",
            CollectionKind::Set => "Set",
            CollectionKind::SortedSet => "SortedSet",
            CollectionKind::Map => "Map",
            CollectionKind::SortedMap => "SortedMap",
            CollectionKind::Bag => "Bag",
        }
    }
}

/// Type of a collection-valued role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionType {
    /// Navigable role, `<owner entity>.<property path>`.
    pub role: SmolStr,
    pub kind: CollectionKind,
    pub element: Box<QueryType>,
    /// Key type, maps only.
    pub key: Option<Box<QueryType>>,
}

/// Converts class and member facts into [`QueryType`]s.
pub struct TypeBridge;

impl TypeBridge {
    /// Returns the shared placeholder type.
    pub fn unknown() -> &'static QueryType {
        &UNKNOWN_TYPE
    }

    /// Returns an entity reference type bound to `entity_name`.
    pub fn entity(entity_name: impl Into<SmolStr>) -> QueryType {
        QueryType::Entity(entity_name.into())
    }

    /// Resolves a basic type by simple, primitive or qualified class name.
    ///
    /// Returns `None` if the name is not a basic type.
    pub fn basic(class_name: &str) -> Option<QueryType> {
        let class_name = class_name.trim();
        let simple = if class_name.ends_with("[]") {
            class_name
        } else {
            class_name.rsplit('.').next().unwrap_or(class_name)
        };
        let ty = match simple {
            "boolean" | "Boolean" => QueryType::Boolean,
            "byte" | "Byte" => QueryType::Byte,
            "short" | "Short" => QueryType::Short,
            "int" | "Integer" => QueryType::Integer,
            "long" | "Long" => QueryType::Long,
            "float" | "Float" => QueryType::Float,
            "double" | "Double" => QueryType::Double,
            "char" | "Character" => QueryType::Character,
            "String" | "char[]" | "Character[]" | "Clob" => QueryType::String,
            "BigInteger" => QueryType::BigInteger,
            "BigDecimal" => QueryType::BigDecimal,
            "Date" | "LocalDate" => QueryType::Date,
            "Time" | "LocalTime" | "OffsetTime" => QueryType::Time,
            "Timestamp" | "LocalDateTime" | "OffsetDateTime" | "ZonedDateTime" | "Calendar" => {
                QueryType::Timestamp
            }
            "Instant" => QueryType::Instant,
            "byte[]" | "Byte[]" | "Blob" => QueryType::Binary,
            "UUID" | "Uuid" => QueryType::Uuid,
            _ => return None,
        };
        Some(ty)
    }

    /// Like [`TypeBridge::basic`], degrading to [`QueryType::Unknown`].
    pub fn basic_or_unknown(class_name: &str) -> QueryType {
        Self::basic(class_name).unwrap_or_else(|| Self::unknown().clone())
    }

    /// Maps a member fact to its query type.
    ///
    /// `role` names the member as `<entity>.<path>` and is only used for
    /// collection-valued members.
    pub fn type_for_member(member: &MemberType, role: &str) -> QueryType {
        match member {
            MemberType::Basic(class_name) => Self::basic_or_unknown(class_name),
            MemberType::Enum(class_name) => QueryType::Enum(class_name.clone()),
            MemberType::Association(entity_name) => Self::entity(entity_name.clone()),
            MemberType::Embedded(class_name) => QueryType::Embedded(class_name.clone()),
            MemberType::Collection {
                shape,
                element,
                key,
            } => Self::collection(role, shape, element, key.as_deref()),
        }
    }

    /// Builds the type of a collection-valued role from its declared shape.
    pub fn collection(
        role: &str,
        shape: &str,
        element: &MemberType,
        key: Option<&MemberType>,
    ) -> QueryType {
        let kind = CollectionKind::classify(shape);
        let key = if kind.is_map() {
            Some(Box::new(
                key.map(Self::type_for_element)
                    .unwrap_or_else(|| Self::unknown().clone()),
            ))
        } else {
            None
        };
        QueryType::Collection(CollectionType {
            role: role.into(),
            kind,
            element: Box::new(Self::type_for_element(element)),
            key,
        })
    }

    /// Maps a collection element or key fact. Nested collections are not
    /// navigable and degrade to the placeholder.
    pub fn type_for_element(member: &MemberType) -> QueryType {
        match member {
            MemberType::Collection { .. } => Self::unknown().clone(),
            other => Self::type_for_member(other, ""),
        }
    }
}
