//! Builder Configuration
//!
//! The static description of what a user may build: the available fields,
//! the operators each field supports, and the combinator new groups start
//! with. Configuration is read-only at runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use qb_core::error::QbError;
use qb_core::result::{QbResult, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use validator::Validate;

use crate::tree::Combinator;
use crate::value::RuleValue;

/// An operator a field can be compared with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryOperator {
    /// Operator identifier referenced by rules
    #[validate(length(min = 1))]
    pub name: String,
    /// Display label
    pub label: String,
    /// Accepts an array of values
    #[serde(default)]
    pub is_multi: bool,
    /// Accepts a `{from, to}` range
    #[serde(default)]
    pub is_range: bool,
    /// Extra metadata for the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl QueryOperator {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            is_multi: false,
            is_range: false,
            meta: None,
        }
    }

    /// Mark as accepting a list of values
    pub fn multi(mut self) -> Self {
        self.is_multi = true;
        self
    }

    /// Mark as accepting a range
    pub fn range(mut self) -> Self {
        self.is_range = true;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Default value computed from the selected operator
#[derive(Clone)]
pub struct ValueFn(Arc<dyn Fn(&QueryOperator) -> Option<RuleValue> + Send + Sync>);

impl ValueFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&QueryOperator) -> Option<RuleValue> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, operator: &QueryOperator) -> Option<RuleValue> {
        (self.0)(operator)
    }
}

impl fmt::Debug for ValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueFn(..)")
    }
}

impl PartialEq for ValueFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// How a field fills in a rule's value once its operator is known
///
/// `None` from [`DefaultValue::resolve`] means "no default": the rule keeps
/// whatever value it had.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultValue {
    /// Same value whatever the operator
    Static(RuleValue),
    /// Value per operator name; operators not listed have no default
    ByOperator(BTreeMap<String, RuleValue>),
    /// Arbitrary function of the operator (code-only, never serialized)
    #[serde(skip)]
    Computed(ValueFn),
}

impl DefaultValue {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&QueryOperator) -> Option<RuleValue> + Send + Sync + 'static,
    {
        Self::Computed(ValueFn::new(f))
    }

    pub fn resolve(&self, operator: &QueryOperator) -> Option<RuleValue> {
        match self {
            Self::Static(value) => Some(value.clone()),
            Self::ByOperator(values) => values.get(&operator.name).cloned(),
            Self::Computed(f) => f.call(operator),
        }
    }
}

/// A field rules can filter on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryField {
    /// Field identifier referenced by rules
    #[validate(length(min = 1))]
    pub name: String,
    /// Display label
    pub label: String,
    /// Kind of data held (string, number, date...)
    #[serde(rename = "type")]
    pub field_type: String,
    /// Operators usable with this field, in display order
    #[serde(default)]
    pub operators: Vec<QueryOperator>,
    /// Operator picked when a rule switches to this field; defaults to the first operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_operator: Option<String>,
    /// Written as a single-key map (`static` or `byOperator`) in JSON and YAML alike
    #[serde(
        default,
        with = "serde_yaml::with::singleton_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<DefaultValue>,
    /// Extra metadata for the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl QueryField {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: field_type.into(),
            operators: vec![],
            default_operator: None,
            default_value: None,
            meta: None,
        }
    }

    /// Find an operator of this field by name
    pub fn operator(&self, name: &str) -> Option<&QueryOperator> {
        self.operators.iter().find(|o| o.name == name)
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.iter().any(|o| o.name == name)
    }

    /// Operator a rule falls back to when its current one is not supported:
    /// the declared default, else the first operator
    pub fn fallback_operator(&self) -> Option<&str> {
        self.default_operator
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.operators.first().map(|o| o.name.as_str()))
    }

    /// Default value for the given operator, if the field declares one
    pub fn default_value_for(&self, operator: &QueryOperator) -> Option<RuleValue> {
        self.default_value.as_ref()?.resolve(operator)
    }
}

/// Everything the builder needs to know about the queryable data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBuilderConfig {
    #[serde(default)]
    pub fields: Vec<QueryField>,
    /// Combinator of newly added groups
    #[serde(default)]
    pub default_combinator: Combinator,
}

impl QueryBuilderConfig {
    pub fn new(default_combinator: Combinator) -> Self {
        Self {
            fields: vec![],
            default_combinator,
        }
    }

    /// Start a fluent configuration builder
    pub fn builder() -> crate::builder::ConfigBuilder {
        crate::builder::ConfigBuilder::new()
    }

    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&QueryField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find an operator of a field; `None` if either is unknown
    pub fn operator(&self, field_name: &str, operator_name: &str) -> Option<&QueryOperator> {
        self.field(field_name)?.operator(operator_name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Run the configuration contract
    pub fn validate(&self) -> ValidationResult {
        use qb_core::traits::Contract;
        crate::contracts::ConfigContract.validate(self)
    }

    pub fn from_json_str(json: &str) -> QbResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> QbResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| QbError::Config(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> QbResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            other => {
                return Err(QbError::Config(format!(
                    "unsupported config format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), fields = config.fields.len(), "Loaded builder config");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> QbResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
