//! Core traits shared across the workspace

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::ValidationResult;

/// Trait for nodes addressable by a string identifier
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Contract validating a value as a whole, collecting every problem found
pub trait Contract<T>: Send + Sync {
    fn validate(&self, entity: &T) -> ValidationResult;
}

/// Source of fresh node identifiers
///
/// The only contract is uniqueness within one query tree's lifetime.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers, mostly for tests and replayable scripts
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("node")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Named id strategies, selectable from settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Uuid,
    Sequential,
}

impl IdStrategy {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uuid" | "random" => Some(Self::Uuid),
            "sequential" | "seq" => Some(Self::Sequential),
            _ => None,
        }
    }

    pub fn generator(&self) -> Box<dyn IdGenerator> {
        match self {
            Self::Uuid => Box::new(UuidGenerator),
            Self::Sequential => Box::new(SequentialIdGenerator::default()),
        }
    }
}
