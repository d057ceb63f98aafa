//! Error types for schema resolution.
//!
//! [`SchemaError`] is what a consumer sees when a reference cannot be
//! resolved; convert it to a [`Diag`] with [`SchemaError::to_diag`] to attach
//! the source position of the offending reference. [`Unsupported`] is the
//! out-of-contract signal returned by runtime persistence operations that
//! static validation never performs.

use crate::diag::{Diag, DiagLabel, Span};
use smol_str::SmolStr;
use thiserror::Error;

/// Result type for schema operations.
pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// A reference that cannot be resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{name} is not mapped")]
    UnmappedEntity { name: SmolStr },

    #[error("{role} is not a mapped collection role")]
    UnmappedCollection { role: SmolStr },

    #[error("{role} is not collection-valued")]
    NotACollection { role: SmolStr },

    #[error("{entity} has no mapped {path}")]
    NoSuchProperty { entity: SmolStr, path: SmolStr },

    #[error("{name} is not a known class")]
    UnknownClass { name: SmolStr },

    #[error("{class} has no constructor accepting ({})", .arguments.join(", "))]
    NoSuchConstructor { class: SmolStr, arguments: Vec<String> },
}

impl SchemaError {
    /// The name or path the failure is attributable to.
    pub fn subject(&self) -> &str {
        match self {
            SchemaError::UnmappedEntity { name } | SchemaError::UnknownClass { name } => name,
            SchemaError::UnmappedCollection { role } | SchemaError::NotACollection { role } => role,
            SchemaError::NoSuchProperty { path, .. } => path,
            SchemaError::NoSuchConstructor { class, .. } => class,
        }
    }

    /// Stable diagnostic code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::UnmappedEntity { .. } => "schema::unmapped_entity",
            SchemaError::UnmappedCollection { .. } => "schema::unmapped_collection",
            SchemaError::NotACollection { .. } => "schema::not_a_collection",
            SchemaError::NoSuchProperty { .. } => "schema::no_such_property",
            SchemaError::UnknownClass { .. } => "schema::unknown_class",
            SchemaError::NoSuchConstructor { .. } => "schema::no_such_constructor",
        }
    }

    /// Converts this error to a diagnostic at the given span.
    ///
    /// Schema errors carry no location of their own; callers pass the span
    /// of the reference that failed.
    pub fn to_diag(&self, span: Span) -> Diag {
        let diag = Diag::error(self.to_string()).with_code(self.code());
        match self {
            SchemaError::UnmappedEntity { .. } => diag
                .with_label(DiagLabel::primary(span, "unmapped entity"))
                .with_help("check the entity name or make sure the class is annotated as an entity"),
            SchemaError::UnmappedCollection { .. } => {
                diag.with_label(DiagLabel::primary(span, "unmapped collection"))
            }
            SchemaError::NotACollection { .. } => {
                diag.with_label(DiagLabel::primary(span, "not a collection"))
            }
            SchemaError::NoSuchProperty { path, .. } => diag
                .with_label(DiagLabel::primary(span, format!("no property {}", path))),
            SchemaError::UnknownClass { .. } => {
                diag.with_label(DiagLabel::primary(span, "unknown class"))
            }
            SchemaError::NoSuchConstructor { .. } => diag
                .with_label(DiagLabel::primary(span, "no matching constructor"))
                .with_help("the instantiated class needs a constructor with exactly these argument types"),
        }
    }
}

/// A runtime persistence capability was invoked on a static descriptor.
///
/// Static validation never loads, writes, locks, caches or proxies
/// anything; getting this error means the caller treated a descriptor as a
/// live persister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} is not supported in static validation mode")]
pub struct Unsupported {
    pub operation: &'static str,
}

impl Unsupported {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

/// Shorthand for the body of every contractual-but-dead operation.
pub(crate) fn unsupported<T>(operation: &'static str) -> std::result::Result<T, Unsupported> {
    tracing::error!(operation, "runtime operation invoked on a static descriptor");
    Err(Unsupported::new(operation))
}
