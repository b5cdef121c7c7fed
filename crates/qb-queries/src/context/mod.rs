//! Editing Contexts
//!
//! The state layer of the query builder. A [`BuilderContext`] owns the
//! configuration and the current [`Query`](crate::tree::Query) snapshot.
//! Edits go through short-lived handles borrowed from it:
//!
//! - [`GroupContext`] for one group (the root included): combinator,
//!   negation, and structural edits of its children
//! - [`RuleContext`] for one rule: field, operator and value edits
//!
//! A handle holds `&mut BuilderContext`, so while it is alive nothing else
//! can edit the tree and the node it addresses cannot move. Every edit
//! replaces the addressed node with a new one, rebuilds the path up to the
//! root, and publishes the new root snapshot to the subscribed listeners.
//!
//! ## Example
//!
//! ```
//! use qb_queries::builder::presets;
//! use qb_queries::context::BuilderContext;
//! use qb_queries::tree::{NodePath, Query};
//!
//! let mut ctx = BuilderContext::new(presets::sample_config(), Query::default());
//!
//! let id = ctx.root_group().add_rule(None).unwrap();
//! let path = ctx.find_path(&id).unwrap();
//!
//! let mut rule = ctx.rule_at(&path).unwrap();
//! rule.set_field("status").unwrap();
//! assert_eq!(rule.rule().operator, "eq");
//!
//! assert_eq!(ctx.query().rule_count(), 1);
//! assert_eq!(ctx.revision(), 2);
//! ```

mod root;
mod group;
mod rule;

pub use root::{BuilderContext, Listener, SubscriptionId};
pub use group::GroupContext;
pub use rule::RuleContext;
