//! Rule context

use qb_core::result::QbResult;
use tracing::trace;

use crate::config::{QueryField, QueryOperator};
use crate::tree::{NodePath, Rule, RuleNode};
use crate::value::RuleValue;

use super::root::BuilderContext;

/// Handle on one rule of the tree
#[derive(Debug)]
pub struct RuleContext<'a> {
    ctx: &'a mut BuilderContext,
    path: NodePath,
    rule: Rule,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(ctx: &'a mut BuilderContext, path: NodePath, rule: Rule) -> Self {
        Self { ctx, path, rule }
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Current snapshot of the rule
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Configured field of the rule; `None` when unset or unknown
    pub fn field(&self) -> Option<&QueryField> {
        self.ctx.get_field(&self.rule.field)
    }

    /// Configured operator of the rule; `None` when unset or unknown
    pub fn operator(&self) -> Option<&QueryOperator> {
        self.ctx.get_operator(&self.rule.field, &self.rule.operator)
    }

    pub fn value(&self) -> &RuleValue {
        &self.rule.value
    }

    /// Switch the rule to another field
    ///
    /// An operator the new field does not offer is replaced by the field's
    /// fallback operator. The field's default value for the resulting
    /// operator, if any, replaces the current value. Unknown fields only
    /// change the field name.
    pub fn set_field(&mut self, name: impl Into<String>) -> QbResult<()> {
        let mut next = self.rule.clone().with_field(name);

        if let Some(field) = self.ctx.get_field(&next.field) {
            if !field.has_operator(&next.operator) {
                if let Some(fallback) = field.fallback_operator() {
                    next.operator = fallback.to_string();
                }
            }
            if let Some(value) = field
                .operator(&next.operator)
                .and_then(|operator| field.default_value_for(operator))
            {
                next.value = value;
            }
        }

        self.apply("set_field", next)
    }

    /// Switch the rule to another operator of its field
    ///
    /// The field's default value for the new operator, if any, replaces the
    /// current value.
    pub fn set_operator(&mut self, name: impl Into<String>) -> QbResult<()> {
        let mut next = self.rule.clone().with_operator(name);

        if let Some(field) = self.ctx.get_field(&next.field) {
            match field.operator(&next.operator) {
                Some(operator) => {
                    if let Some(value) = field.default_value_for(operator) {
                        next.value = value;
                    }
                }
                None => trace!(field = %field.name, operator = %next.operator, "Operator not configured"),
            }
        }

        self.apply("set_operator", next)
    }

    /// Replace the value as is; the shape is not checked against the operator
    pub fn set_value(&mut self, value: impl Into<RuleValue>) -> QbResult<()> {
        let next = self.rule.clone().with_value(value);
        self.apply("set_value", next)
    }

    fn apply(&mut self, operation: &'static str, next: Rule) -> QbResult<()> {
        self.ctx
            .replace_node(operation, &self.path, RuleNode::Rule(next.clone()))?;
        self.rule = next;
        Ok(())
    }
}
