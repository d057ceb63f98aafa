//! Registry configuration.

use crate::types::QueryType;
use smol_str::SmolStr;

/// When subclass relationships between entity descriptors are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubclassResolution {
    /// Consider every descriptor realized at the time of the property lookup.
    #[default]
    OnDemand,
    /// Record relationships once, pairwise, when a descriptor is created.
    ///
    /// Edges are recorded in both directions, so a base created before its
    /// subclass still sees it. Lookups give the same results as with
    /// `OnDemand`; only the time the edges are computed differs.
    AtCreation,
}

/// Configuration for a [`SchemaRegistry`](crate::registry::SchemaRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Function names accepted without a dialect match and without a warning.
    pub function_whitelist: Vec<SmolStr>,

    /// Subclass relationship strategy.
    pub subclass_resolution: SubclassResolution,

    /// Identifier property name reported by every entity descriptor.
    pub identifier_property: SmolStr,

    /// Identifier type reported by every entity descriptor.
    pub identifier_type: QueryType,

    /// Match dialect function names case-sensitively.
    pub case_sensitive_functions: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            function_whitelist: Vec::new(),
            subclass_resolution: SubclassResolution::default(),
            identifier_property: SmolStr::new_static("id"),
            identifier_type: QueryType::Integer,
            case_sensitive_functions: false,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_whitelisted_function(mut self, name: impl Into<SmolStr>) -> Self {
        self.function_whitelist.push(name.into());
        self
    }

    pub fn with_function_whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.function_whitelist
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_subclass_resolution(mut self, resolution: SubclassResolution) -> Self {
        self.subclass_resolution = resolution;
        self
    }

    pub fn with_identifier(mut self, property: impl Into<SmolStr>, ty: QueryType) -> Self {
        self.identifier_property = property.into();
        self.identifier_type = ty;
        self
    }

    pub fn with_case_sensitive_functions(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_functions = case_sensitive;
        self
    }

    /// Splits a whitelist option string as build tools pass it, e.g.
    /// `"soundex, levenshtein json_extract"`.
    pub fn parse_whitelist(option: &str) -> Vec<SmolStr> {
        option
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(SmolStr::new)
            .collect()
    }

    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.function_whitelist.iter().any(|entry| entry == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert!(config.function_whitelist.is_empty());
        assert_eq!(config.subclass_resolution, SubclassResolution::OnDemand);
        assert_eq!(config.identifier_property, "id");
        assert_eq!(config.identifier_type, QueryType::Integer);
        assert!(!config.case_sensitive_functions);
    }

    #[test]
    fn whitelist_option_parsing() {
        let names = RegistryConfig::parse_whitelist(" soundex,levenshtein  json_extract,,");
        assert_eq!(names, vec!["soundex", "levenshtein", "json_extract"]);
        assert!(RegistryConfig::parse_whitelist("").is_empty());
    }

    #[test]
    fn whitelist_is_exact_match() {
        let config = RegistryConfig::new()
            .with_function_whitelist(["soundex"])
            .with_whitelisted_function("levenshtein");
        assert!(config.is_whitelisted("soundex"));
        assert!(config.is_whitelisted("levenshtein"));
        assert!(!config.is_whitelisted("SOUNDEX"));
    }
}
