//! Function-name validation for query call sites.
//!
//! The dialect's catalog is consulted first. Names it does not know are
//! degraded rather than rejected: they resolve to a permissive
//! [`ResolvedFunction::Placeholder`] and, unless whitelisted, produce one
//! warning per distinct name for the whole session.
//!
//! # Example
//!
//! ```
//! use query_validator::config::RegistryConfig;
//! use query_validator::function::{CollectingSink, FunctionValidator, StandardDialect};
//! use std::rc::Rc;
//!
//! let sink = Rc::new(CollectingSink::new());
//! let validator = FunctionValidator::new(
//!     Rc::new(StandardDialect),
//!     sink.clone(),
//!     RegistryConfig::new(),
//! );
//!
//! assert!(validator.resolve_function("upper").unwrap().is_builtin());
//! validator.resolve_function("soundex");
//! validator.resolve_function("soundex");
//! assert_eq!(sink.warnings().len(), 1);
//! ```

use crate::config::RegistryConfig;
use crate::diag::{Diag, DiagLabel, Span};
use crate::types::QueryType;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

// ============================================================================
// Signature Types
// ============================================================================

/// Kind of function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Scalar function.
    Function,
    /// Aggregate function (count, sum, avg, ...).
    Aggregate,
}

/// Signature of a function known to the dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: SmolStr,
    pub kind: FunctionKind,
    pub parameters: Vec<ParameterSignature>,
    /// Return type; `None` when it depends on the arguments.
    pub return_type: Option<QueryType>,
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<SmolStr>,
        kind: FunctionKind,
        parameters: Vec<ParameterSignature>,
        return_type: Option<QueryType>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters,
            return_type,
        }
    }

    /// Returns the minimum number of required arguments.
    pub fn min_arity(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !p.optional && !p.variadic)
            .count()
    }

    /// Returns the maximum number of arguments (None if variadic).
    pub fn max_arity(&self) -> Option<usize> {
        if self.parameters.iter().any(|p| p.variadic) {
            None
        } else {
            Some(self.parameters.len())
        }
    }

    pub fn matches_arity(&self, arg_count: usize) -> bool {
        let min = self.min_arity();
        match self.max_arity() {
            Some(max) => arg_count >= min && arg_count <= max,
            None => arg_count >= min,
        }
    }

    fn expected_arity(&self) -> String {
        let min = self.min_arity();
        match self.max_arity() {
            None => format!("at least {} arguments", min),
            Some(max) if max == min => format!("{} arguments", min),
            Some(max) => format!("between {} and {} arguments", min, max),
        }
    }
}

/// Parameter of a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSignature {
    pub name: SmolStr,
    /// Accepted type; `None` accepts any type.
    pub param_type: Option<QueryType>,
    pub optional: bool,
    /// Accepts any number of values, including none.
    pub variadic: bool,
}

impl ParameterSignature {
    pub fn required(name: impl Into<SmolStr>, param_type: Option<QueryType>) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
            variadic: false,
        }
    }

    pub fn optional(name: impl Into<SmolStr>, param_type: Option<QueryType>) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: true,
            variadic: false,
        }
    }

    pub fn variadic(name: impl Into<SmolStr>, param_type: Option<QueryType>) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
            variadic: true,
        }
    }
}

/// Outcome of resolving a call-site function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFunction {
    /// Known to the dialect.
    Builtin(FunctionSignature),
    /// Unknown; accepts any arity and returns a floating-point number.
    Placeholder { name: SmolStr },
}

impl ResolvedFunction {
    pub fn is_builtin(&self) -> bool {
        matches!(self, ResolvedFunction::Builtin(_))
    }

    pub fn name(&self) -> &str {
        match self {
            ResolvedFunction::Builtin(signature) => &signature.name,
            ResolvedFunction::Placeholder { name } => name,
        }
    }

    /// Return type, [`QueryType::Unknown`] when it depends on the arguments.
    pub fn return_type(&self) -> QueryType {
        match self {
            ResolvedFunction::Builtin(signature) => signature
                .return_type
                .clone()
                .unwrap_or(QueryType::Unknown),
            ResolvedFunction::Placeholder { .. } => QueryType::Float,
        }
    }

    pub fn matches_arity(&self, arg_count: usize) -> bool {
        match self {
            ResolvedFunction::Builtin(signature) => signature.matches_arity(arg_count),
            ResolvedFunction::Placeholder { .. } => true,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// The dialect's built-in function catalog.
pub trait Dialect {
    /// Looks up a built-in function by its normalized name.
    fn lookup_builtin(&self, name: &str) -> Option<FunctionSignature>;
}

/// Receives warning-level diagnostics. Fire-and-forget.
pub trait DiagnosticSink {
    fn report_warning(&self, diag: Diag);
}

/// Sink that keeps every warning, for tests and batch tools.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: RefCell<Vec<Diag>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the warnings reported so far.
    pub fn warnings(&self) -> Vec<Diag> {
        self.warnings.borrow().clone()
    }

    /// Drains the warnings reported so far.
    pub fn take(&self) -> Vec<Diag> {
        self.warnings.take()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report_warning(&self, diag: Diag) {
        self.warnings.borrow_mut().push(diag);
    }
}

/// Sink that forwards warnings as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report_warning(&self, diag: Diag) {
        tracing::warn!(code = diag.code.as_deref().unwrap_or(""), "{}", diag.message);
    }
}

// ============================================================================
// Standard Dialect
// ============================================================================

/// Built-in functions of the query language itself.
///
/// - Numeric: abs, sqrt, mod, round, floor, ceiling, exp, ln, power, sign
/// - String: lower, upper, length, locate, substring, trim, concat, str, bit_length
/// - Temporal: current_date, current_time, current_timestamp, second .. year
/// - Aggregates: count, sum, avg, min, max
/// - Other: size, coalesce, nullif, cast
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDialect;

impl Dialect for StandardDialect {
    fn lookup_builtin(&self, name: &str) -> Option<FunctionSignature> {
        lookup_standard_function(name).or_else(|| lookup_standard_aggregate(name))
    }
}

impl StandardDialect {
    /// Names of every built-in, scalar functions first.
    pub fn function_names() -> Vec<SmolStr> {
        STANDARD_FUNCTIONS
            .iter()
            .chain(STANDARD_AGGREGATES)
            .map(|name| SmolStr::new(name))
            .collect()
    }
}

const STANDARD_FUNCTIONS: &[&str] = &[
    "abs",
    "sqrt",
    "mod",
    "round",
    "floor",
    "ceiling",
    "exp",
    "ln",
    "power",
    "sign",
    "lower",
    "upper",
    "length",
    "locate",
    "substring",
    "trim",
    "concat",
    "str",
    "bit_length",
    "current_date",
    "current_time",
    "current_timestamp",
    "second",
    "minute",
    "hour",
    "day",
    "month",
    "year",
    "size",
    "coalesce",
    "nullif",
    "cast",
];

const STANDARD_AGGREGATES: &[&str] = &["count", "sum", "avg", "min", "max"];

fn numeric() -> Option<QueryType> {
    Some(QueryType::Double)
}

fn string() -> Option<QueryType> {
    Some(QueryType::String)
}

fn integer() -> Option<QueryType> {
    Some(QueryType::Integer)
}

fn lookup_standard_function(name: &str) -> Option<FunctionSignature> {
    use ParameterSignature as P;

    let f = |params: Vec<ParameterSignature>, ret: Option<QueryType>| {
        Some(FunctionSignature::new(name, FunctionKind::Function, params, ret))
    };

    match name {
        // Numeric
        "abs" | "sqrt" | "floor" | "ceiling" | "exp" | "ln" => {
            f(vec![P::required("x", numeric())], numeric())
        }
        "sign" => f(vec![P::required("x", numeric())], integer()),
        "mod" => f(
            vec![P::required("x", integer()), P::required("y", integer())],
            integer(),
        ),
        "power" => f(
            vec![P::required("base", numeric()), P::required("exponent", numeric())],
            numeric(),
        ),
        "round" => f(
            vec![P::required("x", numeric()), P::optional("decimals", integer())],
            numeric(),
        ),

        // String
        "lower" | "upper" | "trim" => f(vec![P::required("s", string())], string()),
        "length" | "bit_length" => f(vec![P::required("s", string())], integer()),
        "locate" => f(
            vec![
                P::required("pattern", string()),
                P::required("s", string()),
                P::optional("start", integer()),
            ],
            integer(),
        ),
        "substring" => f(
            vec![
                P::required("s", string()),
                P::required("start", integer()),
                P::optional("length", integer()),
            ],
            string(),
        ),
        "concat" => f(vec![P::variadic("strings", string())], string()),
        "str" => f(vec![P::required("x", None)], string()),

        // Temporal
        "current_date" => f(vec![], Some(QueryType::Date)),
        "current_time" => f(vec![], Some(QueryType::Time)),
        "current_timestamp" => f(vec![], Some(QueryType::Timestamp)),
        "second" | "minute" | "hour" | "day" | "month" | "year" => {
            f(vec![P::required("t", None)], integer())
        }

        // Other
        "size" => f(vec![P::required("collection", None)], integer()),
        "coalesce" => f(
            vec![P::required("first", None), P::variadic("rest", None)],
            None,
        ),
        "nullif" => f(vec![P::required("x", None), P::required("y", None)], None),
        "cast" => f(vec![P::required("x", None), P::required("as", None)], None),

        _ => None,
    }
}

fn lookup_standard_aggregate(name: &str) -> Option<FunctionSignature> {
    let ret = match name {
        "count" => Some(QueryType::Long),
        "avg" => Some(QueryType::Double),
        "sum" | "min" | "max" => None,
        _ => return None,
    };
    Some(FunctionSignature::new(
        name,
        FunctionKind::Aggregate,
        vec![ParameterSignature::required("x", None)],
        ret,
    ))
}

// ============================================================================
// FunctionValidator
// ============================================================================

/// Classifies call-site function names against a dialect and a whitelist.
pub struct FunctionValidator {
    dialect: Rc<dyn Dialect>,
    sink: Rc<dyn DiagnosticSink>,
    whitelist: HashSet<SmolStr>,
    case_sensitive: bool,
    warned: RefCell<HashSet<SmolStr>>,
}

impl FunctionValidator {
    pub fn new(
        dialect: Rc<dyn Dialect>,
        sink: Rc<dyn DiagnosticSink>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            dialect,
            sink,
            whitelist: config.function_whitelist.into_iter().collect(),
            case_sensitive: config.case_sensitive_functions,
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Resolves a call-site function name.
    ///
    /// Returns `None` for an empty name. Names unknown to the dialect
    /// resolve to a placeholder; the first lookup of a name that is neither
    /// whitelisted nor already warned about reports one warning.
    pub fn resolve_function(&self, name: &str) -> Option<ResolvedFunction> {
        if name.is_empty() {
            return None;
        }

        if let Some(signature) = self.lookup_builtin(name) {
            return Some(ResolvedFunction::Builtin(signature));
        }

        if !self.is_whitelisted(name) && self.warned.borrow_mut().insert(SmolStr::new(name)) {
            self.sink.report_warning(
                Diag::warning(format!("`{}` is not defined (add it to whitelist)", name))
                    .with_code("function::unknown"),
            );
        }

        Some(ResolvedFunction::Placeholder {
            name: SmolStr::new(name),
        })
    }

    /// Resolves a call and checks its argument count.
    ///
    /// Unknown names are never arity errors; their warning, if any, goes to
    /// the sink rather than the returned diagnostics.
    pub fn check_call(&self, name: &str, arg_count: usize, span: Span) -> Vec<Diag> {
        let mut diagnostics = Vec::new();

        let Some(ResolvedFunction::Builtin(signature)) = self.resolve_function(name) else {
            return diagnostics;
        };

        if !signature.matches_arity(arg_count) {
            diagnostics.push(
                Diag::error(format!(
                    "function `{}` expects {}, but got {}",
                    name,
                    signature.expected_arity(),
                    arg_count
                ))
                .with_label(DiagLabel::primary(span, "incorrect number of arguments"))
                .with_code("function::arity"),
            );
        }

        diagnostics
    }

    /// Whitelist membership is exact; case folding applies to builtins only.
    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.contains(name)
    }

    /// Names already warned about in this session, sorted.
    pub fn warned_functions(&self) -> Vec<SmolStr> {
        let mut names: Vec<_> = self.warned.borrow().iter().cloned().collect();
        names.sort();
        names
    }

    fn lookup_builtin(&self, name: &str) -> Option<FunctionSignature> {
        if self.case_sensitive {
            self.dialect.lookup_builtin(name)
        } else {
            self.dialect.lookup_builtin(&name.to_lowercase())
        }
    }
}
