//! Validation contracts for configurations and query trees
//!
//! Contracts collect every problem they find instead of stopping at the first
//! one. None of them run implicitly: the editing contexts accept any tree and
//! any value, and callers decide when to check.

use std::collections::HashSet;

use qb_core::error::ValidationErrors;
use qb_core::result::ValidationResult;
use qb_core::traits::Contract;
use validator::Validate;

use crate::config::{DefaultValue, QueryBuilderConfig, QueryField};
use crate::tree::{Query, RuleNode};

/// Copy `validator` field errors under an attribute prefix
fn merge_field_errors(
    prefix: &str,
    result: Result<(), validator::ValidationErrors>,
    errors: &mut ValidationErrors,
) {
    if let Err(field_errors) = result {
        for (attribute, list) in field_errors.field_errors() {
            for error in list {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("is invalid ({})", error.code));
                errors.add(format!("{}.{}", prefix, attribute), message);
            }
        }
    }
}

/// Structural checks on a [`QueryBuilderConfig`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigContract;

impl ConfigContract {
    fn validate_field(&self, index: usize, field: &QueryField, errors: &mut ValidationErrors) {
        let prefix = format!("fields[{}]", index);
        merge_field_errors(&prefix, field.validate(), errors);

        if field.operators.is_empty() {
            errors.add(format!("{}.operators", prefix), "can't be empty");
        }

        let mut operator_names = HashSet::new();
        for (op_index, operator) in field.operators.iter().enumerate() {
            let op_prefix = format!("{}.operators[{}]", prefix, op_index);
            merge_field_errors(&op_prefix, operator.validate(), errors);
            if operator.is_multi && operator.is_range {
                errors.add(op_prefix.clone(), "can't be both multi and range");
            }
            if !operator_names.insert(operator.name.as_str()) {
                errors.add(
                    format!("{}.name", op_prefix),
                    format!("{} is duplicated", operator.name),
                );
            }
        }

        if let Some(default_operator) = field.default_operator.as_deref() {
            if !default_operator.is_empty() && !field.has_operator(default_operator) {
                errors.add(
                    format!("{}.defaultOperator", prefix),
                    format!("{} is not one of the field's operators", default_operator),
                );
            }
        }

        if let Some(DefaultValue::ByOperator(values)) = &field.default_value {
            for operator_name in values.keys() {
                if !field.has_operator(operator_name) {
                    errors.add(
                        format!("{}.defaultValue", prefix),
                        format!("{} is not one of the field's operators", operator_name),
                    );
                }
            }
        }
    }
}

impl Contract<QueryBuilderConfig> for ConfigContract {
    fn validate(&self, config: &QueryBuilderConfig) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        let mut field_names = HashSet::new();

        for (index, field) in config.fields.iter().enumerate() {
            self.validate_field(index, field, &mut errors);
            if !field_names.insert(field.name.as_str()) {
                errors.add(
                    format!("fields[{}].name", index),
                    format!("{} is duplicated", field.name),
                );
            }
        }

        errors.into_result()
    }
}

/// Checks on a [`Query`] tree
///
/// Always checks the id invariant. With a configuration attached it also
/// reports rules whose field or operator does not resolve. Rules still being
/// filled in (empty field or operator) are not reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryContract<'a> {
    config: Option<&'a QueryBuilderConfig>,
}

impl<'a> QueryContract<'a> {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn with_config(config: &'a QueryBuilderConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl Contract<Query> for QueryContract<'_> {
    fn validate(&self, query: &Query) -> ValidationResult {
        let mut errors = match query.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if let Some(config) = self.config {
            query.walk(&mut |path, node| {
                let RuleNode::Rule(rule) = node else {
                    return;
                };
                if rule.field.is_empty() {
                    return;
                }
                match config.field(&rule.field) {
                    None => errors.add(
                        format!("{}.field", path),
                        format!("{} is not a configured field", rule.field),
                    ),
                    Some(field) => {
                        if !rule.operator.is_empty() && !field.has_operator(&rule.operator) {
                            errors.add(
                                format!("{}.operator", path),
                                format!("{} is not an operator of {}", rule.operator, field.name),
                            );
                        }
                    }
                }
            });
        }

        errors.into_result()
    }
}
