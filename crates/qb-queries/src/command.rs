//! Edit Commands
//!
//! Every editing operation of the contexts as data. Commands address groups
//! and rules by node id (a missing group id means the root), so a recorded
//! script stays valid while siblings move around.
//!
//! Scripts are JSON arrays:
//!
//! ```json
//! [
//!   { "op": "add_rule" },
//!   { "op": "set_field", "rule": "r-1", "field": "age" },
//!   { "op": "set_combinator", "combinator": "or" }
//! ]
//! ```

use qb_core::result::QbResult;
use qb_core::traits::Identifiable;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{BuilderContext, GroupContext};
use crate::tree::{Combinator, RuleNode};
use crate::value::RuleValue;

/// One edit of the query tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    SetCombinator {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        combinator: Combinator,
    },
    SetNot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        not: bool,
    },
    AddRule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    AddGroup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    UpdateRule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        index: usize,
        node: RuleNode,
    },
    RemoveRule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    SetField {
        rule: String,
        field: String,
    },
    SetOperator {
        rule: String,
        operator: String,
    },
    SetValue {
        rule: String,
        #[serde(default)]
        value: RuleValue,
    },
}

/// What a command did to the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Changed,
    Added { id: String },
    Removed { id: String },
    /// Nothing matched, e.g. removing from an empty group
    Unchanged,
}

impl EditCommand {
    /// Operation name as used in scripts
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetCombinator { .. } => "set_combinator",
            Self::SetNot { .. } => "set_not",
            Self::AddRule { .. } => "add_rule",
            Self::AddGroup { .. } => "add_group",
            Self::UpdateRule { .. } => "update_rule",
            Self::RemoveRule { .. } => "remove_rule",
            Self::SetField { .. } => "set_field",
            Self::SetOperator { .. } => "set_operator",
            Self::SetValue { .. } => "set_value",
        }
    }

    /// Run the command against a context
    pub fn apply(&self, ctx: &mut BuilderContext) -> QbResult<CommandOutcome> {
        debug!(op = self.name(), "Applying edit command");
        match self {
            Self::SetCombinator { group, combinator } => {
                group_handle(ctx, group.as_deref())?.set_combinator(*combinator)?;
                Ok(CommandOutcome::Changed)
            }
            Self::SetNot { group, not } => {
                group_handle(ctx, group.as_deref())?.set_not(*not)?;
                Ok(CommandOutcome::Changed)
            }
            Self::AddRule { group, index } => {
                let id = group_handle(ctx, group.as_deref())?.add_rule(*index)?;
                Ok(CommandOutcome::Added { id })
            }
            Self::AddGroup { group, index } => {
                let id = group_handle(ctx, group.as_deref())?.add_group(*index)?;
                Ok(CommandOutcome::Added { id })
            }
            Self::UpdateRule { group, index, node } => {
                group_handle(ctx, group.as_deref())?.update_rule(*index, node.clone())?;
                Ok(CommandOutcome::Changed)
            }
            Self::RemoveRule { group, index } => {
                let removed = group_handle(ctx, group.as_deref())?.remove_rule(*index)?;
                Ok(match removed {
                    Some(node) => CommandOutcome::Removed {
                        id: node.id().to_string(),
                    },
                    None => CommandOutcome::Unchanged,
                })
            }
            Self::SetField { rule, field } => {
                ctx.rule_by_id(rule)?.set_field(field.as_str())?;
                Ok(CommandOutcome::Changed)
            }
            Self::SetOperator { rule, operator } => {
                ctx.rule_by_id(rule)?.set_operator(operator.as_str())?;
                Ok(CommandOutcome::Changed)
            }
            Self::SetValue { rule, value } => {
                ctx.rule_by_id(rule)?.set_value(value.clone())?;
                Ok(CommandOutcome::Changed)
            }
        }
    }

    /// Run commands in order, stopping at the first failure
    ///
    /// Commands applied before the failure stay applied.
    pub fn apply_all(commands: &[EditCommand], ctx: &mut BuilderContext) -> QbResult<Vec<CommandOutcome>> {
        commands.iter().map(|command| command.apply(ctx)).collect()
    }

    /// Parse a JSON script
    pub fn parse_script(json: &str) -> QbResult<Vec<EditCommand>> {
        Ok(serde_json::from_str(json)?)
    }
}

fn group_handle<'a>(ctx: &'a mut BuilderContext, id: Option<&str>) -> QbResult<GroupContext<'a>> {
    match id {
        None => Ok(ctx.root_group()),
        Some(id) => ctx.group_by_id(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::presets;
    use crate::tree::{Query, Rule};
    use qb_core::traits::SequentialIdGenerator;
    use std::sync::Arc;

    fn context() -> BuilderContext {
        BuilderContext::new(presets::sample_config(), Query::default())
            .with_id_generator(Arc::new(SequentialIdGenerator::new("c")))
    }

    #[test]
    fn test_parse_script() {
        let commands = EditCommand::parse_script(
            r#"[
                {"op": "add_rule"},
                {"op": "add_group", "group": "g", "index": 0},
                {"op": "set_value", "rule": "c-1", "value": {"from": 1, "to": 2}},
                {"op": "set_combinator", "combinator": "or"}
            ]"#,
        )
        .unwrap();

        assert_eq!(commands[0], EditCommand::AddRule { group: None, index: None });
        assert_eq!(
            commands[1],
            EditCommand::AddGroup {
                group: Some("g".to_string()),
                index: Some(0)
            }
        );
        assert_eq!(
            commands[2],
            EditCommand::SetValue {
                rule: "c-1".to_string(),
                value: RuleValue::range(1, 2)
            }
        );
        assert_eq!(commands[3].name(), "set_combinator");

        let err = EditCommand::parse_script(r#"[{"op": "explode"}]"#).unwrap_err();
        assert_eq!(err.error_code(), "serialization_error");
    }

    #[test]
    fn test_apply_script() {
        let mut ctx = context();
        let script = vec![
            EditCommand::AddRule { group: None, index: None },
            EditCommand::AddGroup { group: None, index: None },
            EditCommand::AddRule {
                group: Some("c-2".to_string()),
                index: None,
            },
            EditCommand::SetField {
                rule: "c-3".to_string(),
                field: "status".to_string(),
            },
            EditCommand::SetNot {
                group: Some("c-2".to_string()),
                not: true,
            },
            EditCommand::SetCombinator {
                group: None,
                combinator: Combinator::Or,
            },
            EditCommand::RemoveRule { group: None, index: Some(0) },
            EditCommand::RemoveRule { group: None, index: Some(7) },
        ];

        let outcomes = EditCommand::apply_all(&script, &mut ctx).unwrap();
        assert_eq!(outcomes[0], CommandOutcome::Added { id: "c-1".to_string() });
        assert_eq!(outcomes[6], CommandOutcome::Removed { id: "c-1".to_string() });
        assert_eq!(outcomes[7], CommandOutcome::Unchanged);

        let query = ctx.query();
        assert_eq!(query.combinator, Combinator::Or);
        assert_eq!(query.ids(), vec!["c-2", "c-3"]);
        let group = query.rules[0].as_group().unwrap();
        assert!(group.not);
        let rule = group.rules[0].as_rule().unwrap();
        assert_eq!(rule.operator, "eq");
        assert_eq!(rule.value, RuleValue::scalar("active"));
        assert_eq!(ctx.revision(), 7);
    }

    #[test]
    fn test_failure_stops_the_script() {
        let mut ctx = context();
        let script = vec![
            EditCommand::AddRule { group: None, index: None },
            EditCommand::SetOperator {
                rule: "missing".to_string(),
                operator: "eq".to_string(),
            },
            EditCommand::AddRule { group: None, index: None },
        ];

        let err = EditCommand::apply_all(&script, &mut ctx).unwrap_err();
        assert_eq!(err.error_code(), "unknown_id");
        assert_eq!(ctx.query().rule_count(), 1);
    }

    #[test]
    fn test_update_rule_addresses_kinds() {
        let mut ctx = context();
        ctx.set_query(Query::default().with_child(Rule::empty("r")));

        let err = EditCommand::AddRule {
            group: Some("r".to_string()),
            index: None,
        }
        .apply(&mut ctx)
        .unwrap_err();
        assert_eq!(err.error_code(), "not_a_group");

        EditCommand::UpdateRule {
            group: None,
            index: 0,
            node: RuleNode::Rule(Rule::new("r", "age", "gt", 30)),
        }
        .apply(&mut ctx)
        .unwrap();
        assert_eq!(ctx.query().rules[0].as_rule().unwrap().field, "age");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(EditCommand::SetField {
            rule: "r".to_string(),
            field: "age".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"op": "set_field", "rule": "r", "field": "age"}));

        let json = serde_json::to_value(CommandOutcome::Added { id: "x".to_string() }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "added", "id": "x"}));
    }
}
