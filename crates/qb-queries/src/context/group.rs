//! Group context
//!
//! Edits one group's flags and its immediate children. The root query is a
//! group without an id; nested groups are addressed by path.

use std::sync::Arc;

use qb_core::error::QbError;
use qb_core::result::QbResult;
use tracing::{debug, warn};

use crate::tree::{Combinator, NodePath, NodeRef, Query, Rule, RuleGroup, RuleNode};

use super::root::BuilderContext;
use super::rule::RuleContext;

/// Handle on one group of the tree
///
/// Index policy for structural edits:
/// - `add_rule`/`add_group` clamp an index past the end to the end
/// - `remove_rule` on an out-of-range index, or on an empty group without an
///   index, is a no-op returning `None`
/// - `update_rule` on an out-of-range index fails with
///   [`QbError::IndexOutOfRange`] and leaves the tree untouched
#[derive(Debug)]
pub struct GroupContext<'a> {
    ctx: &'a mut BuilderContext,
    path: NodePath,
    /// `None` for the root query
    id: Option<String>,
    /// Current combinator, negation and children of the group
    body: Query,
}

impl<'a> GroupContext<'a> {
    pub(crate) fn root(ctx: &'a mut BuilderContext) -> Self {
        let body = Query::clone(ctx.query());
        Self {
            ctx,
            path: NodePath::root(),
            id: None,
            body,
        }
    }

    pub(crate) fn nested(ctx: &'a mut BuilderContext, path: NodePath, group: RuleGroup) -> Self {
        Self {
            ctx,
            path,
            id: Some(group.id),
            body: Query {
                combinator: group.combinator,
                not: group.not,
                rules: group.rules,
            },
        }
    }

    // -- getters

    /// Group id; `None` for the root
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    pub fn combinator(&self) -> Combinator {
        self.body.combinator
    }

    pub fn not(&self) -> bool {
        self.body.not
    }

    /// Immediate children
    pub fn rules(&self) -> &[NodeRef] {
        &self.body.rules
    }

    pub fn len(&self) -> usize {
        self.body.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.rules.is_empty()
    }

    /// Path of the `index`-th child, for [`BuilderContext::rule_at`] / [`BuilderContext::group_at`]
    pub fn child_path(&self, index: usize) -> NodePath {
        self.path.child(index)
    }

    /// Snapshot of this group as a tree node; `None` for the root
    pub fn group(&self) -> Option<RuleGroup> {
        self.id.as_ref().map(|id| RuleGroup {
            id: id.clone(),
            combinator: self.body.combinator,
            not: self.body.not,
            rules: self.body.rules.clone(),
        })
    }

    /// Turn this handle into one on the `index`-th child, which must be a rule
    pub fn rule(self, index: usize) -> QbResult<RuleContext<'a>> {
        let path = self.child_path(index);
        let ctx = self.ctx;
        ctx.rule_at(&path)
    }

    /// Turn this handle into one on the `index`-th child, which must be a group
    pub fn subgroup(self, index: usize) -> QbResult<GroupContext<'a>> {
        let path = self.child_path(index);
        let ctx = self.ctx;
        ctx.group_at(&path)
    }

    // -- setters

    pub fn set_combinator(&mut self, combinator: Combinator) -> QbResult<()> {
        let next = Query {
            combinator,
            not: self.body.not,
            rules: self.body.rules.clone(),
        };
        self.apply("set_combinator", next)
    }

    pub fn set_not(&mut self, not: bool) -> QbResult<()> {
        let next = Query {
            combinator: self.body.combinator,
            not,
            rules: self.body.rules.clone(),
        };
        self.apply("set_not", next)
    }

    // -- rule actions

    /// Insert an empty rule at `index` (end of list by default); returns its id
    pub fn add_rule(&mut self, index: Option<usize>) -> QbResult<String> {
        let id = self.ctx.generate_id();
        let rule = Rule::empty(id.clone());
        self.insert("add_rule", index, RuleNode::Rule(rule))?;
        Ok(id)
    }

    /// Insert an empty group at `index` (end of list by default); returns its id
    ///
    /// The new group takes the configuration's default combinator.
    pub fn add_group(&mut self, index: Option<usize>) -> QbResult<String> {
        let id = self.ctx.generate_id();
        let group = RuleGroup::empty(id.clone(), self.ctx.config().default_combinator);
        self.insert("add_group", index, RuleNode::Group(group))?;
        Ok(id)
    }

    /// Replace the child at `index` wholesale
    pub fn update_rule(&mut self, index: usize, node: impl Into<RuleNode>) -> QbResult<()> {
        let len = self.body.rules.len();
        if index >= len {
            warn!(path = %self.path, index, len, "Refusing to update a child past the end");
            return Err(QbError::IndexOutOfRange { index, len });
        }
        let mut rules = self.body.rules.clone();
        rules[index] = Arc::new(node.into());
        self.apply_rules("update_rule", rules)
    }

    /// Remove the child at `index` (last child by default); returns the removed node
    pub fn remove_rule(&mut self, index: Option<usize>) -> QbResult<Option<NodeRef>> {
        let len = self.body.rules.len();
        let index = match index.or_else(|| len.checked_sub(1)) {
            Some(index) if index < len => index,
            other => {
                debug!(path = %self.path, index = ?other, len, "Nothing to remove");
                return Ok(None);
            }
        };
        let mut rules = self.body.rules.clone();
        let removed = rules.remove(index);
        self.apply_rules("remove_rule", rules)?;
        Ok(Some(removed))
    }

    // -- internals

    fn insert(&mut self, operation: &'static str, index: Option<usize>, node: RuleNode) -> QbResult<()> {
        let len = self.body.rules.len();
        let index = match index {
            Some(index) if index > len => {
                debug!(path = %self.path, index, len, "Clamping insert index to the end");
                len
            }
            Some(index) => index,
            None => len,
        };
        let mut rules = self.body.rules.clone();
        rules.insert(index, Arc::new(node));
        self.apply_rules(operation, rules)
    }

    fn apply_rules(&mut self, operation: &'static str, rules: Vec<NodeRef>) -> QbResult<()> {
        let next = Query {
            combinator: self.body.combinator,
            not: self.body.not,
            rules,
        };
        self.apply(operation, next)
    }

    /// Write the new group body back into the tree
    fn apply(&mut self, operation: &'static str, next: Query) -> QbResult<()> {
        match &self.id {
            None => self.ctx.commit(operation, &self.path, next.clone()),
            Some(id) => {
                let group = RuleGroup {
                    id: id.clone(),
                    combinator: next.combinator,
                    not: next.not,
                    rules: next.rules.clone(),
                };
                self.ctx
                    .replace_node(operation, &self.path, RuleNode::Group(group))?;
            }
        }
        self.body = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryBuilderConfig;
    use crate::value::RuleValue;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use qb_core::traits::{Identifiable, SequentialIdGenerator};

    fn context(default_combinator: Combinator, query: Query) -> BuilderContext {
        BuilderContext::new(QueryBuilderConfig::new(default_combinator), query)
            .with_id_generator(Arc::new(SequentialIdGenerator::new("id")))
    }

    fn three_rules() -> Query {
        Query::new(Combinator::And)
            .with_child(Rule::new("a", "age", "eq", 1))
            .with_child(Rule::new("b", "age", "eq", 2))
            .with_child(Rule::new("c", "age", "eq", 3))
    }

    fn ids(query: &Query) -> Vec<String> {
        query.rules.iter().map(|n| n.id().to_string()).collect()
    }

    #[test]
    fn test_add_rule_to_empty_root() {
        let mut ctx = context(Combinator::And, Query::default());
        let id = ctx.root_group().add_rule(None).unwrap();

        let query = ctx.query();
        assert_eq!(query.rules.len(), 1);
        let rule = query.rules[0].as_rule().unwrap();
        assert_eq!(rule.id, id);
        assert!(!rule.id.is_empty());
        assert_eq!(rule.field, "");
        assert_eq!(rule.operator, "");
        assert_eq!(rule.value, RuleValue::null());
    }

    #[test]
    fn test_add_group_uses_default_combinator() {
        let mut ctx = context(
            Combinator::Or,
            Query::new(Combinator::And).with_child(RuleGroup::empty("parent", Combinator::And)),
        );
        let id = ctx
            .group_by_id("parent")
            .unwrap()
            .add_group(None)
            .unwrap();

        assert_ne!(id, "parent");
        let parent = ctx.query().rules[0].as_group().unwrap();
        let group = parent.rules[0].as_group().unwrap();
        assert_eq!(group.id, id);
        assert_eq!(group.combinator, Combinator::Or);
        assert!(!group.not);
        assert!(group.rules.is_empty());
    }

    #[test]
    fn test_add_at_index_and_clamp() {
        let mut ctx = context(Combinator::And, three_rules());
        let mut root = ctx.root_group();
        let first = root.add_rule(Some(0)).unwrap();
        let middle = root.add_rule(Some(2)).unwrap();
        let last = root.add_group(Some(99)).unwrap();

        assert_eq!(
            ids(ctx.query()),
            vec![first, "a".to_string(), middle, "b".into(), "c".into(), last]
        );
    }

    #[test]
    fn test_remove_rule() {
        let mut ctx = context(Combinator::And, three_rules());
        let mut root = ctx.root_group();

        let removed = root.remove_rule(Some(1)).unwrap().unwrap();
        assert_eq!(removed.id(), "b");
        let removed = root.remove_rule(None).unwrap().unwrap();
        assert_eq!(removed.id(), "c");
        assert_eq!(root.len(), 1);

        assert!(root.remove_rule(Some(5)).unwrap().is_none());
        assert_eq!(ids(ctx.query()), vec!["a"]);
        assert_eq!(ctx.revision(), 2);
    }

    #[test]
    fn test_remove_from_empty_group_is_noop() {
        let mut ctx = context(Combinator::And, Query::default());
        assert!(ctx.root_group().remove_rule(None).unwrap().is_none());
        assert!(ctx.root_group().remove_rule(Some(0)).unwrap().is_none());
        assert_eq!(ctx.revision(), 0);
    }

    #[test]
    fn test_update_rule() {
        let mut ctx = context(Combinator::And, three_rules());
        let before = ctx.query().clone();

        ctx.root_group()
            .update_rule(1, RuleGroup::empty("g", Combinator::Or))
            .unwrap();
        let after = ctx.query().clone();
        assert_eq!(ids(&after), vec!["a", "g", "c"]);
        assert!(Arc::ptr_eq(&before.rules[0], &after.rules[0]));
        assert!(Arc::ptr_eq(&before.rules[2], &after.rules[2]));

        let err = ctx
            .root_group()
            .update_rule(3, Rule::empty("x"))
            .unwrap_err();
        assert_eq!(err.error_code(), "index_out_of_range");
        assert!(Arc::ptr_eq(&after, ctx.query()));
    }

    #[test]
    fn test_flags_on_root_and_nested() {
        let mut ctx = context(
            Combinator::And,
            three_rules().with_child(RuleGroup::empty("g", Combinator::And)),
        );

        let mut root = ctx.root_group();
        assert!(root.is_root());
        root.set_combinator(Combinator::Or).unwrap();
        root.set_not(true).unwrap();
        assert_eq!(root.combinator(), Combinator::Or);
        assert!(root.not());

        let mut nested = ctx.group_by_id("g").unwrap();
        nested.set_not(true).unwrap();
        assert_eq!(nested.group().unwrap().id, "g");
        assert_eq!(nested.child_path(0).to_string(), "/3/0");

        let query = ctx.query();
        assert_eq!(query.combinator, Combinator::Or);
        assert!(query.not);
        let group = query.rules[3].as_group().unwrap();
        assert!(group.not);
        assert_eq!(group.combinator, Combinator::And);
        assert_eq!(ids(query), vec!["a", "b", "c", "g"]);
    }

    #[test]
    fn test_nested_edit_keeps_parent_and_siblings() {
        let mut ctx = context(
            Combinator::And,
            Query::new(Combinator::And)
                .with_child(Rule::new("a", "age", "eq", 1))
                .with_child(
                    RuleGroup::empty("outer", Combinator::Or)
                        .with_child(Rule::new("b", "age", "eq", 2))
                        .with_child(RuleGroup::empty("inner", Combinator::And)),
                ),
        );
        let before = ctx.query().clone();

        ctx.group_by_id("inner").unwrap().add_rule(None).unwrap();

        let after = ctx.query();
        assert!(Arc::ptr_eq(&before.rules[0], &after.rules[0]));
        let outer_before = before.rules[1].as_group().unwrap();
        let outer_after = after.rules[1].as_group().unwrap();
        assert_eq!(outer_after.id, "outer");
        assert_eq!(outer_after.combinator, Combinator::Or);
        assert!(Arc::ptr_eq(&outer_before.rules[0], &outer_after.rules[0]));
        assert_eq!(outer_after.rules[1].as_group().unwrap().rules.len(), 1);
        assert!(outer_before.rules[1].as_group().unwrap().rules.is_empty());
    }

    #[test]
    fn test_navigate_into_children() {
        let mut ctx = context(
            Combinator::And,
            three_rules().with_child(
                RuleGroup::empty("g", Combinator::Or).with_child(Rule::new("d", "age", "eq", 4)),
            ),
        );

        ctx.root_group()
            .subgroup(3)
            .unwrap()
            .rule(0)
            .unwrap()
            .set_value(40)
            .unwrap();
        let value = &ctx.query().find("d").unwrap().as_rule().unwrap().value;
        assert_eq!(value, &RuleValue::scalar(40));

        assert_eq!(ctx.root_group().subgroup(0).unwrap_err().error_code(), "not_a_group");
        assert_eq!(ctx.root_group().rule(3).unwrap_err().error_code(), "not_a_rule");
        assert_eq!(ctx.root_group().rule(9).unwrap_err().error_code(), "node_not_found");
    }

    #[derive(Debug, Clone)]
    enum Op {
        AddRule(Option<usize>),
        AddGroup(Option<usize>),
        Remove(Option<usize>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let index = proptest::option::of(0usize..8);
        prop_oneof![
            index.clone().prop_map(Op::AddRule),
            index.clone().prop_map(Op::AddGroup),
            index.prop_map(Op::Remove),
        ]
    }

    fn children(query: &Query, group: Option<&str>) -> Vec<NodeRef> {
        match group {
            None => query.rules.clone(),
            Some(id) => query
                .find(id)
                .and_then(|node| node.as_group())
                .map(|g| g.rules.clone())
                .unwrap_or_default(),
        }
    }

    /// Apply `ops` to the root group or to the group with the given id and
    /// check length and sibling identity after every step
    fn check_structural_edits(group: Option<&str>, ops: Vec<Op>) -> Result<(), TestCaseError> {
        let query = three_rules().with_child(
            RuleGroup::empty("g", Combinator::Or)
                .with_child(Rule::new("d", "age", "eq", 4))
                .with_child(Rule::new("e", "age", "eq", 5)),
        );
        let mut ctx = context(Combinator::And, query);
        let mut expected_len = children(ctx.query(), group).len();

        for op in ops {
            let before = ctx.query().clone();
            let mut handle = match group {
                None => ctx.root_group(),
                Some(id) => ctx.group_by_id(id).unwrap(),
            };
            let target = match op {
                Op::AddRule(index) => {
                    handle.add_rule(index).unwrap();
                    expected_len += 1;
                    None
                }
                Op::AddGroup(index) => {
                    handle.add_group(index).unwrap();
                    expected_len += 1;
                    None
                }
                Op::Remove(index) => {
                    let removed = handle.remove_rule(index).unwrap();
                    if removed.is_some() {
                        expected_len -= 1;
                    }
                    removed
                }
            };

            let after = ctx.query().clone();
            let old_children = children(&before, group);
            let new_children = children(&after, group);
            prop_assert_eq!(new_children.len(), expected_len);

            // every old child, except a removed one, survives unchanged and in order
            let survivors: Vec<&NodeRef> = old_children
                .iter()
                .filter(|n| target.as_ref().map_or(true, |t| !Arc::ptr_eq(n, t)))
                .collect();
            let kept: Vec<&NodeRef> = new_children
                .iter()
                .filter(|n| old_children.iter().any(|b| Arc::ptr_eq(b, n)))
                .collect();
            prop_assert_eq!(survivors.len(), kept.len());
            for (old, new) in survivors.iter().zip(kept.iter()) {
                prop_assert!(Arc::ptr_eq(old, new));
            }

            // edits inside the nested group leave the root's rules shared
            if group.is_some() {
                for index in 0..3 {
                    prop_assert!(Arc::ptr_eq(&before.rules[index], &after.rules[index]));
                }
            }
        }
        prop_assert!(ctx.query().validate().is_ok());
        Ok(())
    }

    proptest! {
        /// Property: length tracks adds minus effective removes, and nodes not
        /// targeted by an operation keep their id and their `Arc`
        #[test]
        fn structural_edits_preserve_untouched_siblings(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            check_structural_edits(None, ops)?;
        }

        /// Same property through a nested group, where every edit rebuilds the spine
        #[test]
        fn nested_structural_edits_preserve_untouched_siblings(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            check_structural_edits(Some("g"), ops)?;
        }
    }
}
