//! Integration tests for call-site function validation.

mod common;

use common::{assert_has_error_containing, registry_with};
use query_validator::function::{FunctionKind, FunctionSignature, ParameterSignature};
use query_validator::{
    CollectingSink, DiagSeverity, Dialect, QueryType, RegistryConfig, ResolvedFunction,
    SchemaRegistry,
};
use std::rc::Rc;

#[test]
fn test_unknown_function_warns_exactly_once() {
    let (registry, sink) = registry_with(RegistryConfig::new());

    let first = registry.resolve_function("UNKNOWN_X");
    let second = registry.resolve_function("UNKNOWN_X");
    assert_eq!(first, second);
    assert_eq!(
        first,
        Some(ResolvedFunction::Placeholder {
            name: "UNKNOWN_X".into()
        })
    );

    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, DiagSeverity::Warning);
    assert!(warnings[0].message.contains("UNKNOWN_X"));
    assert!(warnings[0].message.contains("add it to whitelist"));
}

#[test]
fn test_distinct_unknown_names_warn_separately() {
    let (registry, sink) = registry_with(RegistryConfig::new());
    registry.resolve_function("soundex");
    registry.resolve_function("levenshtein");
    registry.resolve_function("soundex");
    assert_eq!(sink.warnings().len(), 2);
    assert_eq!(registry.warned_functions(), vec!["levenshtein", "soundex"]);

    // Draining the sink does not reset the once-per-name rule.
    assert_eq!(sink.take().len(), 2);
    assert!(sink.warnings().is_empty());
    registry.resolve_function("soundex");
    assert!(sink.take().is_empty());
}

#[test]
fn test_whitelisted_and_builtin_names_emit_nothing() {
    let whitelist = RegistryConfig::parse_whitelist("soundex, levenshtein");
    let (registry, sink) = registry_with(RegistryConfig::new().with_function_whitelist(whitelist));

    for name in ["soundex", "levenshtein", "abs", "Upper", "count", "current_date"] {
        assert!(registry.resolve_function(name).is_some(), "{}", name);
    }
    assert!(sink.warnings().is_empty());
    assert!(registry.warned_functions().is_empty());
}

#[test]
fn test_placeholder_keeps_expression_checkable() {
    let (registry, _) = registry_with(RegistryConfig::new());
    let resolved = registry.resolve_function("json_extract").unwrap();
    assert!(!resolved.is_builtin());
    assert_eq!(resolved.return_type(), QueryType::Float);
    assert!(resolved.return_type().is_numeric());
    assert!(resolved.matches_arity(0));
    assert!(resolved.matches_arity(5));
}

#[test]
fn test_builtin_return_types() {
    let (registry, _) = registry_with(RegistryConfig::new());
    let upper = registry.resolve_function("upper").unwrap();
    assert_eq!(upper.return_type(), QueryType::String);
    assert_eq!(upper.name(), "upper");

    // Argument-dependent return types stay open.
    let max = registry.resolve_function("max").unwrap();
    assert_eq!(max.return_type(), QueryType::Unknown);
}

#[test]
fn test_arity_diagnostics() {
    let (registry, sink) = registry_with(RegistryConfig::new());
    let validator = registry.function_validator();

    let diags = validator.check_call("length", 2, 7..13);
    assert_has_error_containing(&diags, "expects 1 arguments, but got 2");
    assert_eq!(diags[0].code.as_deref(), Some("function::arity"));

    assert!(validator.check_call("substring", 3, 0..9).is_empty());
    assert!(validator.check_call("concat", 0, 0..6).is_empty());

    // Unknown names are degraded, never arity errors.
    assert!(validator.check_call("my_udf", 3, 0..6).is_empty());
    assert_eq!(sink.warnings().len(), 1);
}

struct AuditDialect;

impl Dialect for AuditDialect {
    fn lookup_builtin(&self, name: &str) -> Option<FunctionSignature> {
        (name == "audit_user").then(|| {
            FunctionSignature::new(
                "audit_user",
                FunctionKind::Function,
                vec![ParameterSignature::required("id", Some(QueryType::Long))],
                Some(QueryType::String),
            )
        })
    }
}

#[test]
fn test_custom_dialect_replaces_the_catalog() {
    let sink = Rc::new(CollectingSink::new());
    let registry = SchemaRegistry::builder()
        .with_dialect(AuditDialect)
        .with_sink(sink.clone())
        .build();

    assert!(registry.resolve_function("AUDIT_USER").unwrap().is_builtin());
    assert!(!registry.resolve_function("abs").unwrap().is_builtin());
    assert_eq!(sink.warnings().len(), 1);
}

#[test]
fn test_empty_function_name() {
    let (registry, sink) = registry_with(RegistryConfig::new());
    assert_eq!(registry.resolve_function(""), None);
    assert!(sink.warnings().is_empty());
}
