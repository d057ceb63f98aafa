//! Resolution of navigation paths the way a query front end walks them.
//!
//! A path such as `p.address.city` starts at an alias bound to a root
//! entity; each following segment is resolved against the current owner.
//! Associations switch the owner entity, embedded components extend the
//! path within the owner, and collections navigate to their element type.
//! Elements of a collection of components are resolved against the
//! component class directly, since they have no path on the owner.
//! Failures are reported at the exact segment that could not be resolved.

use crate::diag::{Diag, Span};
use crate::entity::EntityDescriptor;
use crate::error::SchemaError;
use crate::registry::SchemaRegistry;
use crate::types::QueryType;
use smol_str::SmolStr;
use std::rc::Rc;
use tracing::trace;

/// One dotted segment of a path and its position in the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: SmolStr,
    pub span: Span,
}

impl PathSegment {
    pub fn new(name: impl Into<SmolStr>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Splits `text` into segments, with spans offset by `offset`.
pub fn split_segments(text: &str, offset: usize) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut start = 0;
    for part in text.split('.') {
        segments.push(PathSegment::new(part, offset + start..offset + start + part.len()));
        start += part.len() + 1;
    }
    segments
}

/// Resolves navigation paths against a [`SchemaRegistry`].
pub struct PathResolver<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> PathResolver<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Resolves `text` (`alias.segment...`) where the alias is bound to
    /// `root_entity` and `text` starts at byte `offset` of the query.
    pub fn resolve_text(&self, root_entity: &str, text: &str, offset: usize) -> Result<QueryType, Diag> {
        let mut segments = split_segments(text, offset).into_iter();
        let Some(alias) = segments.next().filter(|alias| !alias.name.is_empty()) else {
            return Err(Diag::error("path has no alias")
                .with_primary_label(offset..offset, "expected an alias")
                .with_code("path::empty"));
        };
        let rest: Vec<_> = segments.collect();
        self.resolve(root_entity, alias.span, &rest)
    }

    /// Resolves property `segments` starting at `root_entity`, whose alias
    /// occupies `root_span`.
    pub fn resolve(
        &self,
        root_entity: &str,
        root_span: Span,
        segments: &[PathSegment],
    ) -> Result<QueryType, Diag> {
        let mut owner = self.entity(root_entity, &root_span)?;
        let mut relative = String::new();
        let mut component: Option<SmolStr> = None;
        let mut current = owner.entity_type();
        let mut previous_span = root_span;

        for segment in segments {
            if segment.name.is_empty() {
                return Err(Diag::error("path segment is empty")
                    .with_primary_label(segment.span.clone(), "expected a property name")
                    .with_code("path::empty"));
            }

            let target = match &current {
                QueryType::Collection(collection) => self
                    .registry
                    .collection_descriptor_for(&collection.role)
                    .map_err(|err| err.to_diag(previous_span.clone()))?
                    .element_type()
                    .clone(),
                other => other.clone(),
            };

            match &target {
                QueryType::Entity(name) => {
                    owner = self.entity(name, &previous_span)?;
                    component = None;
                    relative = segment.name.to_string();
                }
                QueryType::Embedded(class) if current.is_collection() => {
                    component = Some(class.clone());
                    relative = segment.name.to_string();
                }
                QueryType::Embedded(_) if !relative.is_empty() => {
                    relative.push('.');
                    relative.push_str(&segment.name);
                }
                _ => return Err(not_navigable(segment, &target, previous_span)),
            }

            trace!(entity = owner.name(), component = ?component, path = %relative, "resolving path segment");
            let resolved = match &component {
                Some(class) => owner.component_property_type(class, &relative),
                None => owner.resolve_property_type(&relative),
            };
            current = resolved.ok_or_else(|| {
                SchemaError::NoSuchProperty {
                    entity: component.clone().unwrap_or_else(|| owner.name().into()),
                    path: relative.as_str().into(),
                }
                .to_diag(segment.span.clone())
            })?;
            previous_span = segment.span.clone();
        }

        Ok(current)
    }

    fn entity(&self, name: &str, span: &Span) -> Result<Rc<EntityDescriptor>, Diag> {
        self.registry
            .descriptor_for(name)
            .map_err(|err| err.to_diag(span.clone()))
    }
}

fn not_navigable(segment: &PathSegment, target: &QueryType, previous_span: Span) -> Diag {
    Diag::error(format!(
        "cannot dereference `{}` on a value of type {}",
        segment.name, target
    ))
    .with_primary_label(segment.span.clone(), "no such attribute")
    .with_secondary_label(previous_span, format!("this has type {}", target))
    .with_help("only entities and embedded components have attributes")
    .with_code("path::not_navigable")
}
