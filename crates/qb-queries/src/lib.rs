//! # qb-queries
//!
//! State layer of a visual query builder.
//!
//! This crate holds the boolean filter tree a builder UI edits, the field and
//! operator configuration it edits against, and the contexts that apply edits
//! to the tree as immutable snapshots.
//!
//! ## Structure
//!
//! - `value` - Rule value shapes (scalar, list, range)
//! - `tree` - Rules, groups and the root query
//! - `config` - Fields, operators and default values
//! - `contracts` - Validation of configurations and trees
//! - `builder` - Fluent API for configurations and trees, plus presets
//! - `context` - Builder, group and rule editing contexts
//! - `command` - Edits as serializable commands
//!
//! ## Example
//!
//! ```
//! use qb_queries::builder::{presets, QueryTreeBuilder};
//! use qb_queries::context::BuilderContext;
//! use qb_queries::tree::Combinator;
//!
//! let query = QueryTreeBuilder::new()
//!     .rule("age", "gt", 18)
//!     .group(Combinator::Or, |g| g.rule("status", "eq", "active").rule("verified", "eq", true))
//!     .build();
//!
//! let mut ctx = BuilderContext::new(presets::sample_config(), query);
//! ctx.root_group().set_combinator(Combinator::Or).unwrap();
//!
//! assert_eq!(ctx.query().combinator, Combinator::Or);
//! assert_eq!(ctx.query().rule_count(), 3);
//! ```

pub mod value;
pub mod tree;
pub mod config;
pub mod contracts;
pub mod builder;
pub mod context;
pub mod command;

pub use value::{RuleValue, ValueRange, ValueShape};
pub use tree::{Combinator, NodePath, NodeRef, Query, Rule, RuleGroup, RuleNode};
pub use config::{DefaultValue, QueryBuilderConfig, QueryField, QueryOperator};
pub use contracts::{ConfigContract, QueryContract};
pub use builder::{presets, ConfigBuilder, FieldBuilder, QueryTreeBuilder};
pub use context::{BuilderContext, GroupContext, RuleContext, SubscriptionId};
pub use command::{CommandOutcome, EditCommand};
