//! Error types for schema compilation and field writes
//!
//! Two families live here:
//! - [`SchemaError`] for the few fallible surfaces (JSON declarations,
//!   configuration, IO).
//! - [`SetterError`] records produced by the coercion pipeline. These are
//!   never returned from a write; they are appended to the record's
//!   [`ErrorSink`] and polled with `Record::errors`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::FieldDescriptor;
use crate::value::Value;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema loading errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid schema declaration: {0}")]
    InvalidDeclaration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

/// Classification of a rejected write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The value's shape cannot be represented by the declared type
    TypeMismatch,
    /// The value has the right type but breaks a bound, pattern or enumeration
    ConstraintViolation,
    /// A textual or numeric representation could not be converted
    ParseError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed write, as recorded in a record's error sink
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct SetterError {
    pub kind: ErrorKind,
    pub message: String,
    /// The value the caller tried to write (after the general transform)
    pub attempted: Value,
    /// The value stored before the write; left in place
    pub prior: Value,
    /// The descriptor that rejected the value
    pub descriptor: Rc<FieldDescriptor>,
}

impl SetterError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        attempted: Value,
        prior: Value,
        descriptor: Rc<FieldDescriptor>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            attempted,
            prior,
            descriptor,
        }
    }

    pub fn type_mismatch(
        message: impl Into<String>,
        attempted: Value,
        prior: &Value,
        descriptor: &Rc<FieldDescriptor>,
    ) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            message,
            attempted,
            prior.clone(),
            descriptor.clone(),
        )
    }

    pub fn constraint(
        message: impl Into<String>,
        attempted: Value,
        prior: &Value,
        descriptor: &Rc<FieldDescriptor>,
    ) -> Self {
        Self::new(
            ErrorKind::ConstraintViolation,
            message,
            attempted,
            prior.clone(),
            descriptor.clone(),
        )
    }

    pub fn parse(
        message: impl Into<String>,
        attempted: Value,
        prior: &Value,
        descriptor: &Rc<FieldDescriptor>,
    ) -> Self {
        Self::new(
            ErrorKind::ParseError,
            message,
            attempted,
            prior.clone(),
            descriptor.clone(),
        )
    }

    /// Diagnostic name of the offending field, if the descriptor carries one
    pub fn field(&self) -> Option<&str> {
        self.descriptor.name.as_deref()
    }

    /// JSON report used by the CLI
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "field": self.field(),
            "kind": self.kind,
            "message": self.message,
            "attempted": self.attempted.to_json(),
            "prior": self.prior.to_json(),
        })
    }
}

/// Per-record, append-only list of failed writes
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: RefCell<Vec<SetterError>>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, error: SetterError) {
        self.errors.borrow_mut().push(error);
    }

    /// Copy of the current contents; later writes do not show up in it
    pub fn snapshot(&self) -> Vec<SetterError> {
        self.errors.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.errors.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldType;

    fn descriptor() -> Rc<FieldDescriptor> {
        Rc::new(FieldDescriptor::new(FieldType::Number).named("age"))
    }

    #[test]
    fn test_sink_append_and_clear() {
        let sink = ErrorSink::new();
        assert!(sink.is_empty());

        let unset = Value::Undefined;
        sink.push(SetterError::constraint("too small", Value::from(-5), &unset, &descriptor()));
        sink.push(SetterError::type_mismatch(
            "not a number",
            Value::from("x"),
            &unset,
            &descriptor(),
        ));
        assert_eq!(sink.len(), 2);

        let snapshot = sink.snapshot();
        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].kind, ErrorKind::ConstraintViolation);
    }

    #[test]
    fn test_error_report() {
        let error =
            SetterError::parse("bad date", Value::from("soon"), &Value::Null, &descriptor());
        assert_eq!(error.field(), Some("age"));
        assert_eq!(error.to_string(), "parse_error: bad date");

        let report = error.to_json();
        assert_eq!(report["kind"], "parse_error");
        assert_eq!(report["attempted"], "soon");
        assert_eq!(report["prior"], serde_json::Value::Null);
    }
}
