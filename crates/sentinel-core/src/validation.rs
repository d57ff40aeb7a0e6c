//! Shape validation boundary
//!
//! Every component validates constructed or external data before trusting
//! it. A type describes its own schema by implementing [`Validate`]; the
//! free function [`validate`] runs that schema and either hands the value
//! back or fails with a [`SchemaViolationError`] listing every violating
//! field path.
//!
//! # Example
//!
//! ```rust
//! use sentinel_core::validation::{validate, Validate, Violations};
//!
//! #[derive(Debug)]
//! struct Endpoint {
//!     url: String,
//!     timeout_ms: u64,
//! }
//!
//! impl Validate for Endpoint {
//!     fn check(&self, v: &mut Violations) {
//!         v.non_empty("url", &self.url);
//!         v.in_range("timeout_ms", self.timeout_ms, 1, 60_000);
//!     }
//! }
//!
//! let err = validate(Endpoint { url: String::new(), timeout_ms: 0 }, "endpoint").unwrap_err();
//! assert_eq!(err.paths(), vec!["url", "timeout_ms"]);
//! ```

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single violating field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Dotted path of the field (`metadata.trace_id`, `components.db.node`)
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Raised when a value does not satisfy its schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("schema violation in {context}: {}", render(.violations))]
pub struct SchemaViolationError {
    /// Where the validation happened (type or call-site label)
    pub context: String,
    /// Every violating field, in check order
    pub violations: Vec<FieldViolation>,
}

impl SchemaViolationError {
    /// Violating field paths, in check order
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

fn render(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collector handed to [`Validate::check`]
#[derive(Debug, Default)]
pub struct Violations {
    prefix: Vec<String>,
    found: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation at `path` (relative to the current nesting)
    pub fn push(&mut self, path: &str, message: impl Into<String>) {
        let path = if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}.{}", self.prefix.join("."), path)
        };
        self.found.push(FieldViolation {
            path,
            message: message.into(),
        });
    }

    /// Record a violation unless `condition` holds
    pub fn require(&mut self, path: &str, condition: bool, message: impl Into<String>) {
        if !condition {
            self.push(path, message);
        }
    }

    /// Require a string with at least one non-whitespace character
    pub fn non_empty(&mut self, path: &str, value: &str) {
        self.require(path, !value.trim().is_empty(), "must not be empty");
    }

    /// Require `min <= value <= max`
    pub fn in_range<T>(&mut self, path: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + fmt::Display + Copy,
    {
        if value < min || value > max {
            self.push(path, format!("{} is outside {}..={}", value, min, max));
        }
    }

    /// Require a finite, non-negative float
    pub fn non_negative(&mut self, path: &str, value: f64) {
        self.require(
            path,
            value.is_finite() && value >= 0.0,
            format!("{} is not a finite non-negative number", value),
        );
    }

    /// Parse a raw setting, keeping `default` when it is absent
    ///
    /// A value that is present but does not parse is recorded at `path` and
    /// `default` is returned so collection can continue.
    pub fn parse_or<T>(&mut self, path: &str, raw: Option<String>, default: T) -> T
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = raw else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                self.push(path, format!("'{}' is not valid: {}", raw, e));
                default
            }
        }
    }

    /// Validate a nested value under `path`
    pub fn nested<V: Validate + ?Sized>(&mut self, path: &str, value: &V) {
        self.prefix.push(path.to_string());
        value.check(self);
        self.prefix.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn into_vec(self) -> Vec<FieldViolation> {
        self.found
    }

    /// Run `value`'s schema on top of what is already collected
    ///
    /// Used by loaders that record parse failures before the value exists.
    pub fn finish<T: Validate>(mut self, value: T, context: &str) -> Result<T, SchemaViolationError> {
        value.check(&mut self);
        if self.is_empty() {
            Ok(value)
        } else {
            tracing::debug!(context, violations = self.found.len(), "schema validation failed");
            Err(SchemaViolationError {
                context: context.to_string(),
                violations: self.found,
            })
        }
    }
}

/// A type that knows its own shape rules
pub trait Validate {
    /// Push every violation found on `self` into `violations`
    fn check(&self, violations: &mut Violations);

    /// Run the schema without consuming the value
    fn validate_ref(&self, context: &str) -> Result<(), SchemaViolationError> {
        let mut violations = Violations::new();
        self.check(&mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolationError {
                context: context.to_string(),
                violations: violations.into_vec(),
            })
        }
    }
}

/// Validate `value`, returning it unchanged when it satisfies its schema
pub fn validate<T: Validate>(value: T, context: &str) -> Result<T, SchemaViolationError> {
    match value.validate_ref(context) {
        Ok(()) => Ok(value),
        Err(e) => {
            tracing::debug!(context, violations = e.violations.len(), "schema validation failed");
            Err(e)
        }
    }
}
