//! Fluent Builders
//!
//! Provides a fluent API for constructing builder configurations and query
//! trees, plus presets for common operator sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use qb_core::traits::{IdGenerator, UuidGenerator};
use serde_json::Value;

use crate::config::{DefaultValue, QueryBuilderConfig, QueryField, QueryOperator};
use crate::tree::{Combinator, Query, Rule, RuleGroup, RuleNode};
use crate::value::RuleValue;

/// Builder for [`QueryBuilderConfig`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    fields: Vec<QueryField>,
    default_combinator: Combinator,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the combinator of newly added groups
    pub fn default_combinator(mut self, combinator: Combinator) -> Self {
        self.default_combinator = combinator;
        self
    }

    /// Add a finished field
    pub fn field(mut self, field: QueryField) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a field configured through a [`FieldBuilder`]
    pub fn with_field<F>(
        self,
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
        configure: F,
    ) -> Self
    where
        F: FnOnce(FieldBuilder) -> FieldBuilder,
    {
        let field = configure(FieldBuilder::new(name, label, field_type)).build();
        self.field(field)
    }

    pub fn build(self) -> QueryBuilderConfig {
        QueryBuilderConfig {
            fields: self.fields,
            default_combinator: self.default_combinator,
        }
    }
}

/// Builder for [`QueryField`]
#[derive(Debug)]
pub struct FieldBuilder {
    field: QueryField,
}

impl FieldBuilder {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            field: QueryField::new(name, label, field_type),
        }
    }

    pub fn operator(mut self, operator: QueryOperator) -> Self {
        self.field.operators.push(operator);
        self
    }

    pub fn operators(mut self, operators: impl IntoIterator<Item = QueryOperator>) -> Self {
        self.field.operators.extend(operators);
        self
    }

    pub fn default_operator(mut self, name: impl Into<String>) -> Self {
        self.field.default_operator = Some(name.into());
        self
    }

    /// Same default value whatever the operator
    pub fn default_value(mut self, value: impl Into<RuleValue>) -> Self {
        self.field.default_value = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Default value for one operator; accumulates across calls
    pub fn default_value_for(mut self, operator: impl Into<String>, value: impl Into<RuleValue>) -> Self {
        let mut values = match self.field.default_value.take() {
            Some(DefaultValue::ByOperator(values)) => values,
            _ => BTreeMap::new(),
        };
        values.insert(operator.into(), value.into());
        self.field.default_value = Some(DefaultValue::ByOperator(values));
        self
    }

    /// Default value computed from the operator
    pub fn default_value_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&QueryOperator) -> Option<RuleValue> + Send + Sync + 'static,
    {
        self.field.default_value = Some(DefaultValue::computed(f));
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.field.meta = Some(meta);
        self
    }

    pub fn build(self) -> QueryField {
        self.field
    }
}

/// Builder for [`Query`] trees with generated ids
pub struct QueryTreeBuilder {
    ids: Arc<dyn IdGenerator>,
    combinator: Combinator,
    not: bool,
    rules: Vec<RuleNode>,
}

impl QueryTreeBuilder {
    /// New builder using random UUIDs
    pub fn new() -> Self {
        Self::with_ids(Arc::new(UuidGenerator))
    }

    pub fn with_ids(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            combinator: Combinator::And,
            not: false,
            rules: vec![],
        }
    }

    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn not(mut self) -> Self {
        self.not = true;
        self
    }

    /// Add a rule
    pub fn rule(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<RuleValue>,
    ) -> Self {
        let rule = Rule::new(self.ids.generate(), field, operator, value);
        self.rules.push(RuleNode::Rule(rule));
        self
    }

    /// Add a rule with no field, operator or value
    pub fn empty_rule(mut self) -> Self {
        self.rules.push(RuleNode::Rule(Rule::empty(self.ids.generate())));
        self
    }

    /// Add a nested group built by `configure`
    pub fn group<F>(mut self, combinator: Combinator, configure: F) -> Self
    where
        F: FnOnce(QueryTreeBuilder) -> QueryTreeBuilder,
    {
        let id = self.ids.generate();
        let nested = configure(QueryTreeBuilder::with_ids(self.ids.clone()).combinator(combinator));
        let group = RuleGroup {
            id,
            combinator: nested.combinator,
            not: nested.not,
            rules: nested.rules.into_iter().map(Arc::new).collect(),
        };
        self.rules.push(RuleNode::Group(group));
        self
    }

    pub fn build(self) -> Query {
        Query {
            combinator: self.combinator,
            not: self.not,
            rules: self.rules.into_iter().map(Arc::new).collect(),
        }
    }
}

impl Default for QueryTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Common operator sets and a sample configuration
pub mod presets {
    use super::*;

    /// Operators for free text fields
    pub fn text_operators() -> Vec<QueryOperator> {
        vec![
            QueryOperator::new("eq", "is"),
            QueryOperator::new("neq", "is not"),
            QueryOperator::new("contains", "contains"),
            QueryOperator::new("not_contains", "does not contain"),
            QueryOperator::new("starts_with", "starts with"),
            QueryOperator::new("ends_with", "ends with"),
            QueryOperator::new("in", "is one of").multi(),
        ]
    }

    /// Operators for numeric fields
    pub fn number_operators() -> Vec<QueryOperator> {
        vec![
            QueryOperator::new("eq", "="),
            QueryOperator::new("neq", "!="),
            QueryOperator::new("gt", ">"),
            QueryOperator::new("gte", ">="),
            QueryOperator::new("lt", "<"),
            QueryOperator::new("lte", "<="),
            QueryOperator::new("between", "between").range(),
            QueryOperator::new("in", "is one of").multi(),
        ]
    }

    /// Operators for boolean fields
    pub fn boolean_operators() -> Vec<QueryOperator> {
        vec![QueryOperator::new("eq", "is")]
    }

    /// Operators for date fields
    pub fn date_operators() -> Vec<QueryOperator> {
        vec![
            QueryOperator::new("on", "on"),
            QueryOperator::new("before", "before"),
            QueryOperator::new("after", "after"),
            QueryOperator::new("between", "between").range(),
        ]
    }

    /// A small configuration over a user table
    pub fn sample_config() -> QueryBuilderConfig {
        ConfigBuilder::new()
            .with_field("name", "Name", "string", |f| {
                f.operators(text_operators()).default_operator("contains")
            })
            .with_field("age", "Age", "number", |f| {
                f.operators(number_operators())
                    .default_value_with(|op| op.is_range.then(|| RuleValue::range(18, 65)))
            })
            .with_field("status", "Status", "string", |f| {
                f.operators(text_operators())
                    .default_value_for("eq", "active")
                    .default_value_for("in", RuleValue::list(["active", "pending"]))
            })
            .with_field("verified", "Verified", "boolean", |f| {
                f.operators(boolean_operators()).default_value(true)
            })
            .with_field("created_at", "Created", "date", |f| {
                f.operators(date_operators()).default_operator("after")
            })
            .build()
    }
}
