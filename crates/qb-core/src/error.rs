//! Core error types for Query Builder RS
//!
//! Lookups that miss (unknown field, unknown operator) are not errors and are
//! reported as `None` by the query layer. The variants below cover wiring
//! mistakes, refused edits, and configuration/serialization failures.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Core error type for all query builder operations
#[derive(Error, Debug)]
pub enum QbError {
    #[error("No node found at path {path}")]
    NodeNotFound { path: String },

    #[error("Node at path {path} is not a group")]
    NotAGroup { path: String },

    #[error("Node at path {path} is not a rule")]
    NotARule { path: String },

    #[error("No node with id {id}")]
    UnknownId { id: String },

    #[error("Index {index} is out of range for a group with {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QbError {
    /// Stable machine-readable code for the error kind
    pub fn error_code(&self) -> &'static str {
        match self {
            QbError::NodeNotFound { .. } => "node_not_found",
            QbError::NotAGroup { .. } => "not_a_group",
            QbError::NotARule { .. } => "not_a_rule",
            QbError::UnknownId { .. } => "unknown_id",
            QbError::IndexOutOfRange { .. } => "index_out_of_range",
            QbError::Validation(_) => "validation_failed",
            QbError::Serialization(_) => "serialization_error",
            QbError::Config(_) => "configuration_error",
            QbError::Io(_) => "io_error",
        }
    }

    /// Whether the error points at a stale or wrong handle rather than bad data
    pub fn is_wiring_error(&self) -> bool {
        matches!(
            self,
            QbError::NodeNotFound { .. } | QbError::NotAGroup { .. } | QbError::NotARule { .. }
        )
    }
}

/// Validation errors collection
///
/// Keyed by a dotted attribute path such as `fields[2].defaultOperator`.
/// Ordered so that reports are stable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    /// Attribute-specific errors: attribute -> messages
    pub errors: BTreeMap<String, Vec<String>>,
    /// Base errors not tied to a specific attribute
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific attribute
    pub fn has_error(&self, attribute: &str) -> bool {
        self.errors.contains_key(attribute)
    }

    /// Get errors for a specific attribute
    pub fn get(&self, attribute: &str) -> Option<&Vec<String>> {
        self.errors.get(attribute)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (attribute, messages) in other.errors {
            self.errors.entry(attribute).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (attribute, attribute_messages) in &self.errors {
            for msg in attribute_messages {
                messages.push(format!("{} {}", attribute, msg));
            }
        }
        messages
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation errors: {}", self.full_messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect_and_merge() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("fields[0].name", "can't be blank");
        errors.add_base("config has no fields");

        let mut other = ValidationErrors::new();
        other.add("fields[0].name", "is duplicated");
        errors.merge(other);

        assert!(errors.has_error("fields[0].name"));
        assert_eq!(errors.get("fields[0].name").map(Vec::len), Some(2));
        assert_eq!(
            errors.full_messages(),
            vec![
                "config has no fields".to_string(),
                "fields[0].name can't be blank".to_string(),
                "fields[0].name is duplicated".to_string(),
            ]
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add_base("broken");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_error_codes() {
        let err = QbError::NodeNotFound { path: "/0/1".into() };
        assert_eq!(err.error_code(), "node_not_found");
        assert!(err.is_wiring_error());

        let err = QbError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.error_code(), "index_out_of_range");
        assert!(!err.is_wiring_error());
        assert_eq!(
            err.to_string(),
            "Index 4 is out of range for a group with 2 children"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let mut errors = ValidationErrors::new();
        errors.add("rules[0].id", "is duplicated");
        let err = QbError::from(errors);
        assert_eq!(
            err.to_string(),
            "Validation failed: Validation errors: rules[0].id is duplicated"
        );
    }
}
