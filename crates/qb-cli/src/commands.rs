//! Subcommand implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use qb_core::traits::{Contract, IdGenerator};
use qb_queries::command::EditCommand;
use qb_queries::config::QueryBuilderConfig;
use qb_queries::context::BuilderContext;
use qb_queries::contracts::QueryContract;
use qb_queries::tree::Query;
use tracing::{debug, info, warn};

fn load_config(path: &Path) -> Result<QueryBuilderConfig> {
    QueryBuilderConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn load_query(path: &Path) -> Result<Query> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query {}", path.display()))?;
    Query::from_json(&json).with_context(|| format!("Failed to parse query {}", path.display()))
}

/// Apply an edit script and return the resulting query as JSON
pub fn apply(
    config_path: &Path,
    query_path: Option<&Path>,
    script_path: &Path,
    ids: Arc<dyn IdGenerator>,
) -> Result<String> {
    let config = load_config(config_path)?;
    if let Err(errors) = config.validate() {
        warn!(errors = %errors, "Config has problems, applying the script anyway");
    }

    let query = match query_path {
        Some(path) => load_query(path)?,
        None => Query::default(),
    };

    let script = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let commands = EditCommand::parse_script(&script)
        .with_context(|| format!("Failed to parse script {}", script_path.display()))?;

    let mut ctx = BuilderContext::new(config, query).with_id_generator(ids);
    for (step, command) in commands.iter().enumerate() {
        let outcome = command
            .apply(&mut ctx)
            .with_context(|| format!("Step {} ({}) failed", step + 1, command.name()))?;
        debug!(step = step + 1, op = command.name(), ?outcome, "Applied");
    }
    info!(
        commands = commands.len(),
        revision = ctx.revision(),
        rules = ctx.query().rule_count(),
        "Script applied"
    );

    Ok(ctx.query().to_json_pretty()?)
}

/// Validate a config, and optionally a query against it
///
/// Returns the problems found; empty when everything is valid.
pub fn validate(config_path: &Path, query_path: Option<&Path>) -> Result<Vec<String>> {
    let config = load_config(config_path)?;
    let mut messages = vec![];

    if let Err(errors) = config.validate() {
        messages.extend(errors.full_messages().into_iter().map(|m| format!("config: {}", m)));
    }

    if let Some(path) = query_path {
        let query = load_query(path)?;
        if let Err(errors) = QueryContract::with_config(&config).validate(&query) {
            messages.extend(errors.full_messages().into_iter().map(|m| format!("query: {}", m)));
        }
    }

    Ok(messages)
}

/// An empty query as JSON
pub fn new_query() -> Result<String> {
    Ok(Query::default().to_json_pretty()?)
}
