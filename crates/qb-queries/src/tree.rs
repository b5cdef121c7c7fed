//! Query Tree
//!
//! The filter expression edited by the builder: a root [`Query`] holding an
//! ordered list of rules and nested groups.
//!
//! Nodes are immutable snapshots. Children are held behind [`Arc`], and an
//! edit produces a new root that shares every subtree it did not touch, so
//! `Arc::ptr_eq` on a child tells whether that child changed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use qb_core::error::ValidationErrors;
use qb_core::result::{QbResult, ValidationResult};
use qb_core::traits::Identifiable;
use serde::{Deserialize, Serialize};

use crate::value::RuleValue;

/// Boolean operator joining a group's children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "and" | "&&" => Some(Self::And),
            "or" | "||" => Some(Self::Or),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Get the other combinator
    pub fn toggle(&self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a child node
pub type NodeRef = Arc<RuleNode>;

/// Leaf node comparing one field against an operator/value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: RuleValue,
}

impl Rule {
    /// A rule with no field, no operator and a null value
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field: String::new(),
            operator: String::new(),
            value: RuleValue::null(),
        }
    }

    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<RuleValue>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<RuleValue>) -> Self {
        self.value = value.into();
        self
    }
}

impl Identifiable for Rule {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Composite node combining children under one combinator and negation flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub not: bool,
    #[serde(default)]
    pub rules: Vec<NodeRef>,
}

impl RuleGroup {
    /// An empty, non-negated group
    pub fn empty(id: impl Into<String>, combinator: Combinator) -> Self {
        Self {
            id: id.into(),
            combinator,
            not: false,
            rules: vec![],
        }
    }

    pub fn with_not(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    pub fn with_child(mut self, node: impl Into<RuleNode>) -> Self {
        self.rules.push(Arc::new(node.into()));
        self
    }
}

impl Identifiable for RuleGroup {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A child of a group: either a rule or a nested group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleNode {
    Rule(Rule),
    Group(RuleGroup),
}

impl RuleNode {
    pub fn is_rule(&self) -> bool {
        matches!(self, Self::Rule(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Self::Rule(rule) => Some(rule),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&RuleGroup> {
        match self {
            Self::Group(group) => Some(group),
            Self::Rule(_) => None,
        }
    }

    /// Type discriminator as serialized
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rule(_) => "rule",
            Self::Group(_) => "group",
        }
    }
}

impl Identifiable for RuleNode {
    fn id(&self) -> &str {
        match self {
            Self::Rule(rule) => &rule.id,
            Self::Group(group) => &group.id,
        }
    }
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        Self::Group(group)
    }
}

/// Position of a node in the tree: child indices from the root
///
/// The empty path is the root query itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(vec![])
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Path of the `index`-th child of this node
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Parent path and index within the parent, `None` for the root
    pub fn parent(&self) -> Option<(Self, usize)> {
        let (&last, rest) = self.0.split_last()?;
        Some((Self(rest.to_vec()), last))
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

/// The whole filter expression: the root group of a builder
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub not: bool,
    #[serde(default)]
    pub rules: Vec<NodeRef>,
}

impl Query {
    /// An empty, non-negated query
    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            not: false,
            rules: vec![],
        }
    }

    pub fn with_not(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    pub fn with_child(mut self, node: impl Into<RuleNode>) -> Self {
        self.rules.push(Arc::new(node.into()));
        self
    }

    pub fn from_json(json: &str) -> QbResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> QbResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Node at `path`; `None` for the root path or when the path does not resolve
    pub fn node_at(&self, path: &NodePath) -> Option<&NodeRef> {
        let (&first, rest) = path.indices().split_first()?;
        let mut node = self.rules.get(first)?;
        for &index in rest {
            node = node.as_group()?.rules.get(index)?;
        }
        Some(node)
    }

    /// Path of the node with the given id
    pub fn find_path(&self, id: &str) -> Option<NodePath> {
        fn search(rules: &[NodeRef], id: &str, path: &mut Vec<usize>) -> bool {
            for (index, node) in rules.iter().enumerate() {
                path.push(index);
                if node.id() == id {
                    return true;
                }
                if let RuleNode::Group(group) = node.as_ref() {
                    if search(&group.rules, id, path) {
                        return true;
                    }
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        search(&self.rules, id, &mut path).then(|| NodePath(path))
    }

    /// Find a node by id
    pub fn find(&self, id: &str) -> Option<&NodeRef> {
        self.find_path(id).and_then(|path| self.node_at(&path))
    }

    /// Visit every node depth-first, parents before children
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&NodePath, &'a RuleNode)) {
        fn walk_rules<'a>(
            rules: &'a [NodeRef],
            path: &NodePath,
            visit: &mut dyn FnMut(&NodePath, &'a RuleNode),
        ) {
            for (index, node) in rules.iter().enumerate() {
                let child = path.child(index);
                visit(&child, node);
                if let RuleNode::Group(group) = node.as_ref() {
                    walk_rules(&group.rules, &child, visit);
                }
            }
        }

        walk_rules(&self.rules, &NodePath::root(), visit);
    }

    /// Number of rules at any depth
    pub fn rule_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, node| {
            if node.is_rule() {
                count += 1;
            }
        });
        count
    }

    /// Number of nested groups at any depth (the root is not counted)
    pub fn group_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, node| {
            if node.is_group() {
                count += 1;
            }
        });
        count
    }

    /// Nesting depth: 0 for an empty query, 1 for a flat list of rules
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        self.walk(&mut |path, _| depth = depth.max(path.depth()));
        depth
    }

    /// All node ids in depth-first order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(&mut |_, node| ids.push(node.id()));
        ids
    }

    /// Check the id invariant: every node has a non-empty id unique in the tree
    pub fn validate(&self) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        let mut seen = HashSet::new();
        self.walk(&mut |path, node| {
            let id = node.id();
            if id.is_empty() {
                errors.add(format!("{}.id", path), "can't be blank");
            } else if !seen.insert(id) {
                errors.add(format!("{}.id", path), format!("{} is duplicated", id));
            }
        });
        errors.into_result()
    }

    /// New query with the node at `path` replaced
    ///
    /// Only the nodes on the way from the root to `path` are rebuilt; every
    /// other subtree is shared with `self`. Returns `None` if the path does
    /// not resolve (the root path included).
    pub(crate) fn replace_at(&self, path: &NodePath, replacement: RuleNode) -> Option<Query> {
        let rules = replace_in(&self.rules, path.indices(), replacement)?;
        Some(Query {
            combinator: self.combinator,
            not: self.not,
            rules,
        })
    }
}

fn replace_in(rules: &[NodeRef], path: &[usize], replacement: RuleNode) -> Option<Vec<NodeRef>> {
    let (&index, rest) = path.split_first()?;
    let current = rules.get(index)?;
    let node = if rest.is_empty() {
        replacement
    } else {
        let group = current.as_group()?;
        RuleNode::Group(RuleGroup {
            id: group.id.clone(),
            combinator: group.combinator,
            not: group.not,
            rules: replace_in(&group.rules, rest, replacement)?,
        })
    };
    let mut next = rules.to_vec();
    next[index] = Arc::new(node);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Query {
        Query::new(Combinator::And)
            .with_child(Rule::new("r1", "age", "gt", 18))
            .with_child(
                RuleGroup::empty("g1", Combinator::Or)
                    .with_child(Rule::new("r2", "status", "eq", "active"))
                    .with_child(RuleGroup::empty("g2", Combinator::And).with_not(true)),
            )
    }

    #[test]
    fn test_combinator_parsing() {
        assert_eq!(Combinator::from_str("AND"), Some(Combinator::And));
        assert_eq!(Combinator::from_str("or"), Some(Combinator::Or));
        assert_eq!(Combinator::from_str("xor"), None);
        assert_eq!(Combinator::And.toggle(), Combinator::Or);
        assert_eq!(Combinator::Or.to_string(), "or");
    }

    #[test]
    fn test_serialized_shape() {
        let query = sample();
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({
                "combinator": "and",
                "not": false,
                "rules": [
                    {"type": "rule", "id": "r1", "field": "age", "operator": "gt", "value": 18},
                    {
                        "type": "group", "id": "g1", "combinator": "or", "not": false,
                        "rules": [
                            {"type": "rule", "id": "r2", "field": "status", "operator": "eq", "value": "active"},
                            {"type": "group", "id": "g2", "combinator": "and", "not": true, "rules": []}
                        ]
                    }
                ]
            })
        );

        let parsed: Query = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let query = Query::from_json(
            r#"{"rules": [{"type": "rule", "id": "a"}, {"type": "group", "id": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(query.combinator, Combinator::And);
        assert!(!query.not);
        let rule = query.rules[0].as_rule().unwrap();
        assert_eq!(rule, &Rule::empty("a"));
        let group = query.rules[1].as_group().unwrap();
        assert!(group.rules.is_empty());
    }

    #[test]
    fn test_node_at_and_find_path() {
        let query = sample();
        let path = query.find_path("g2").unwrap();
        assert_eq!(path.indices(), &[1, 1]);
        assert_eq!(path.to_string(), "/1/1");
        assert_eq!(query.node_at(&path).unwrap().id(), "g2");

        assert!(query.find_path("missing").is_none());
        assert!(query.node_at(&NodePath::root()).is_none());
        assert!(query.node_at(&NodePath::from(vec![0, 0])).is_none());
        assert_eq!(query.find("r2").and_then(|n| n.as_rule()).unwrap().field, "status");
    }

    #[test]
    fn test_counts() {
        let query = sample();
        assert_eq!(query.rule_count(), 2);
        assert_eq!(query.group_count(), 2);
        assert_eq!(query.depth(), 2);
        assert_eq!(query.ids(), vec!["r1", "g1", "r2", "g2"]);
        assert_eq!(Query::default().depth(), 0);
    }

    #[test]
    fn test_validate_ids() {
        assert!(sample().validate().is_ok());

        let broken = sample()
            .with_child(Rule::empty("r1"))
            .with_child(Rule::empty(""));
        let errors = broken.validate().unwrap_err();
        assert!(errors.has_error("/2.id"));
        assert!(errors.has_error("/3.id"));
    }

    #[test]
    fn test_replace_at_shares_untouched_subtrees() {
        let query = sample();
        let path = NodePath::from(vec![1, 0]);
        let next = query
            .replace_at(&path, Rule::new("r2", "status", "eq", "closed").into())
            .unwrap();

        assert!(Arc::ptr_eq(&query.rules[0], &next.rules[0]));
        assert!(!Arc::ptr_eq(&query.rules[1], &next.rules[1]));

        let old_group = query.rules[1].as_group().unwrap();
        let new_group = next.rules[1].as_group().unwrap();
        assert!(Arc::ptr_eq(&old_group.rules[1], &new_group.rules[1]));
        assert_eq!(
            new_group.rules[0].as_rule().unwrap().value,
            RuleValue::scalar("closed")
        );
        // the old snapshot is untouched
        assert_eq!(
            old_group.rules[0].as_rule().unwrap().value,
            RuleValue::scalar("active")
        );
    }

    #[test]
    fn test_replace_at_invalid_path() {
        let query = sample();
        assert!(query.replace_at(&NodePath::root(), Rule::empty("x").into()).is_none());
        assert!(query
            .replace_at(&NodePath::from(vec![0, 0]), Rule::empty("x").into())
            .is_none());
        assert!(query
            .replace_at(&NodePath::from(vec![7]), Rule::empty("x").into())
            .is_none());
    }

    #[test]
    fn test_node_path_parent() {
        let path = NodePath::root().child(1).child(3);
        let (parent, index) = path.parent().unwrap();
        assert_eq!(parent.indices(), &[1]);
        assert_eq!(index, 3);
        assert!(NodePath::root().parent().is_none());
        assert_eq!(NodePath::root().to_string(), "/");
    }
}
