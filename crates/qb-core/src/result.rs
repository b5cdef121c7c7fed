//! Result type aliases

use crate::error::{QbError, ValidationErrors};

/// Standard Result type for query builder operations
pub type QbResult<T> = Result<T, QbError>;

/// Result of a validation pass
pub type ValidationResult = Result<(), ValidationErrors>;
