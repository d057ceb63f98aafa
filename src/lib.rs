//! Static schema resolution for query validation.
//!
//! This library answers the questions a query front end asks while
//! type-checking a query without a live data store: does property path P
//! exist on entity E and what is its type, which collection role does a
//! path denote, and is a called function known. Unresolvable references
//! become diagnostics built on miette.
//!
//! # Example
//!
//! ```
//! use query_validator::{InMemoryClassModel, PathResolver, QueryType, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builder()
//!     .with_class_model(InMemoryClassModel::example())
//!     .build();
//!
//! let employee = registry.descriptor_for("Employee").unwrap();
//! assert_eq!(employee.resolve_property_type("name"), Some(QueryType::String));
//!
//! let resolver = PathResolver::new(&registry);
//! assert_eq!(resolver.resolve_text("Person", "p.address.city", 0), Ok(QueryType::String));
//! assert!(resolver.resolve_text("Person", "p.nickname", 0).is_err());
//! ```

pub mod collection;
pub mod config;
pub mod contract;
pub mod diag;
pub mod entity;
pub mod error;
pub mod function;
pub mod model;
pub mod path;
pub mod registry;
pub mod types;

pub use collection::CollectionDescriptor;
pub use config::{RegistryConfig, SubclassResolution};
pub use contract::{CollectionPersister, EntityPersister};
pub use diag::{Diag, DiagLabel, DiagSeverity, LabelRole, SourceFile, Span};
pub use entity::{EntityDescriptor, EntityShape};
pub use error::{Result, SchemaError, Unsupported};
pub use function::{
    CollectingSink, DiagnosticSink, Dialect, FunctionValidator, ResolvedFunction, StandardDialect,
    TracingSink,
};
pub use model::{ClassModel, ClassModelBuilder, InMemoryClassModel, MappingBuilder, MemberType};
pub use path::PathResolver;
pub use registry::{SchemaRegistry, SchemaRegistryBuilder, SchemaSource};
pub use types::{CollectionKind, QueryType, TypeBridge};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_accessible() {
        let _span: Span = 0..5;
        let registry = SchemaRegistry::builder().build();
        assert!(registry.descriptor_for("Person").is_err());
        assert!(registry.resolve_function("abs").is_some());
    }
}
