//! Root builder context

use std::fmt;
use std::sync::Arc;

use qb_core::error::QbError;
use qb_core::result::QbResult;
use qb_core::traits::{IdGenerator, UuidGenerator};
use tracing::{debug, trace};

use crate::config::{QueryBuilderConfig, QueryField, QueryOperator};
use crate::tree::{NodePath, Query, RuleNode};

use super::group::GroupContext;
use super::rule::RuleContext;

/// Callback receiving every new root snapshot
pub type Listener = Box<dyn Fn(&Arc<Query>) + Send + Sync>;

/// Handle returned by [`BuilderContext::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owner of the configuration and the query tree of one builder instance
pub struct BuilderContext {
    config: Arc<QueryBuilderConfig>,
    query: Arc<Query>,
    disabled: bool,
    ids: Arc<dyn IdGenerator>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    revision: u64,
}

impl BuilderContext {
    pub fn new(config: QueryBuilderConfig, query: Query) -> Self {
        Self {
            config: Arc::new(config),
            query: Arc::new(query),
            disabled: false,
            ids: Arc::new(UuidGenerator),
            listeners: vec![],
            next_subscription: 1,
            revision: 0,
        }
    }

    /// Use another source of node ids
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    // -- state

    pub fn config(&self) -> &QueryBuilderConfig {
        &self.config
    }

    /// Current snapshot of the tree
    pub fn query(&self) -> &Arc<Query> {
        &self.query
    }

    /// Whether the presentation layer should render read-only
    ///
    /// The flag is informational: edits through the contexts are still applied.
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Number of changes published so far
    ///
    /// Bumped by every tree edit and by `set_config` / `set_disabled`.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the configuration; the tree is left as is
    ///
    /// Listeners are notified with the unchanged snapshot.
    pub fn set_config(&mut self, config: QueryBuilderConfig) {
        debug!(fields = config.fields.len(), "Replacing builder config");
        self.config = Arc::new(config);
        self.publish("set_config", &NodePath::root());
    }

    /// Listeners are notified with the unchanged snapshot when the flag flips
    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled == disabled {
            return;
        }
        self.disabled = disabled;
        self.publish("set_disabled", &NodePath::root());
    }

    /// Replace the whole tree, e.g. after loading a saved query
    pub fn set_query(&mut self, query: Query) {
        self.commit("set_query", &NodePath::root(), query);
    }

    // -- lookups

    /// Configured field by name
    pub fn get_field(&self, name: &str) -> Option<&QueryField> {
        let field = self.config.field(name);
        if field.is_none() {
            trace!(field = name, "Field not configured");
        }
        field
    }

    /// Configured operator of a field; `None` when either is unknown
    pub fn get_operator(&self, field_name: &str, operator_name: &str) -> Option<&QueryOperator> {
        self.get_field(field_name)?.operator(operator_name)
    }

    pub fn find_path(&self, id: &str) -> Option<NodePath> {
        self.query.find_path(id)
    }

    // -- handles

    /// Handle on the root group
    pub fn root_group(&mut self) -> GroupContext<'_> {
        GroupContext::root(self)
    }

    /// Handle on the group at `path`; the empty path is the root group
    pub fn group_at(&mut self, path: &NodePath) -> QbResult<GroupContext<'_>> {
        if path.is_root() {
            return Ok(self.root_group());
        }
        let group = match self.query.node_at(path) {
            None => return Err(QbError::NodeNotFound { path: path.to_string() }),
            Some(node) => match node.as_ref() {
                RuleNode::Group(group) => group.clone(),
                RuleNode::Rule(_) => return Err(QbError::NotAGroup { path: path.to_string() }),
            },
        };
        Ok(GroupContext::nested(self, path.clone(), group))
    }

    /// Handle on the rule at `path`
    pub fn rule_at(&mut self, path: &NodePath) -> QbResult<RuleContext<'_>> {
        let rule = match self.query.node_at(path) {
            None => return Err(QbError::NodeNotFound { path: path.to_string() }),
            Some(node) => match node.as_ref() {
                RuleNode::Rule(rule) => rule.clone(),
                RuleNode::Group(_) => return Err(QbError::NotARule { path: path.to_string() }),
            },
        };
        Ok(RuleContext::new(self, path.clone(), rule))
    }

    /// Handle on the group with the given id
    pub fn group_by_id(&mut self, id: &str) -> QbResult<GroupContext<'_>> {
        let path = self
            .find_path(id)
            .ok_or_else(|| QbError::UnknownId { id: id.to_string() })?;
        self.group_at(&path)
    }

    /// Handle on the rule with the given id
    pub fn rule_by_id(&mut self, id: &str) -> QbResult<RuleContext<'_>> {
        let path = self
            .find_path(id)
            .ok_or_else(|| QbError::UnknownId { id: id.to_string() })?;
        self.rule_at(&path)
    }

    // -- observers

    /// Register a listener called with every new snapshot
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<Query>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    // -- internals used by the handles

    /// Fresh id not already used in the current tree
    ///
    /// Sequential generators restart at 1 for each context, so a tree loaded
    /// from an earlier run can already hold the next id.
    pub(crate) fn generate_id(&self) -> String {
        loop {
            let id = self.ids.generate();
            if self.query.find_path(&id).is_none() {
                return id;
            }
            trace!(id = %id, "Generated id already in the tree, drawing another");
        }
    }

    /// Replace the node at `path` and publish the new root
    pub(crate) fn replace_node(
        &mut self,
        operation: &'static str,
        path: &NodePath,
        node: RuleNode,
    ) -> QbResult<()> {
        let query = self
            .query
            .replace_at(path, node)
            .ok_or_else(|| QbError::NodeNotFound { path: path.to_string() })?;
        self.commit(operation, path, query);
        Ok(())
    }

    /// Publish a new root snapshot
    pub(crate) fn commit(&mut self, operation: &'static str, path: &NodePath, query: Query) {
        self.query = Arc::new(query);
        self.publish(operation, path);
    }

    fn publish(&mut self, operation: &'static str, path: &NodePath) {
        self.revision += 1;
        debug!(operation, path = %path, revision = self.revision, "Builder state updated");
        for (_, listener) in &self.listeners {
            listener(&self.query);
        }
    }
}

impl fmt::Debug for BuilderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderContext")
            .field("config", &self.config)
            .field("query", &self.query)
            .field("disabled", &self.disabled)
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}
