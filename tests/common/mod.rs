//! Common test utilities
//!
//! Shared fixtures and assertion helpers for the integration tests.
//!
//! # Fixtures
//! - [`example_registry`] - Registry over the `Person`/`Employee`/`Order` class model
//! - [`registry_with`] - Same model with a custom configuration and a collecting sink
//! - [`zoo_mapping`] - Mapping-document source with an `Animal` hierarchy
//!
//! # Diagnostic Helpers
//! - [`format_diagnostics`] - Format diagnostics for display in assertions
//! - [`assert_has_error_containing`] - Assert that an error message contains specific text

#![allow(dead_code)]

use query_validator::{
    CollectingSink, Diag, InMemoryClassModel, MappingBuilder, MemberType, RegistryConfig,
    SchemaRegistry, model::MappingSnapshot,
};
use std::rc::Rc;

// ============================================================================
// Fixtures
// ============================================================================

/// Registry over [`InMemoryClassModel::example`] with default configuration.
pub fn example_registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .with_class_model(InMemoryClassModel::example())
        .build()
}

/// Registry over the example model with `config`, reporting warnings to the
/// returned sink.
pub fn registry_with(config: RegistryConfig) -> (SchemaRegistry, Rc<CollectingSink>) {
    let sink = Rc::new(CollectingSink::new());
    let registry = SchemaRegistry::builder()
        .with_config(config)
        .with_class_model(InMemoryClassModel::example())
        .with_sink(sink.clone())
        .build();
    (registry, sink)
}

/// `Animal` <- `Dog` <- `Puppy`, with an embedded `Tag` component.
pub fn zoo_mapping() -> MappingSnapshot {
    MappingBuilder::new()
        .with_entity("Animal", |e| {
            e.property("id", MemberType::basic("long"))
                .property("name", MemberType::basic("String"))
                .property("tag", MemberType::embedded("Tag"))
        })
        .with_entity("Dog", |e| {
            e.parent("Animal")
                .property("breed", MemberType::basic("String"))
                .property("toys", MemberType::collection("Set", MemberType::basic("String")))
        })
        .with_entity("Puppy", |e| {
            e.parent("Dog")
                .property("weaned", MemberType::basic("boolean"))
        })
        .with_component("Tag", [("code", MemberType::basic("int"))])
        .build()
}

// ============================================================================
// Diagnostic Helpers
// ============================================================================

/// Format diagnostics for display in assertion messages.
pub fn format_diagnostics(diags: &[Diag]) -> String {
    diags
        .iter()
        .map(|diag| format!("{:?}", diag))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assert that some error diagnostic's message contains `needle`.
pub fn assert_has_error_containing(diags: &[Diag], needle: &str) {
    assert!(
        diags
            .iter()
            .any(|diag| diag.is_error() && diag.message.contains(needle)),
        "expected an error containing {:?}, got:\n{}",
        needle,
        format_diagnostics(diags)
    );
}
