//! # qb-core
//!
//! Core types, traits, and utilities for Query Builder RS.
//!
//! This crate provides the foundational building blocks used across the other crates:
//! - Common error types and the validation error collection
//! - Result type aliases
//! - Identifier generation traits

pub mod error;
pub mod result;
pub mod traits;

pub use error::*;
pub use result::*;
pub use traits::*;
