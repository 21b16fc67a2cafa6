//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (edges and operations reference existing dependencies)
//! - Validate value ranges (threshold >= 1, cooldown > 0, base <= cap)
//! - Detect dependency cycles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{DependencyConfig, ResilienceConfig};
use crate::health::GraphError;

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.deadlines.operation_ms == 0 {
        errors.push(ValidationError::new("deadlines.operation_ms", "must be greater than 0"));
    }
    if config.cache.backend_timeout_ms == 0 {
        errors.push(ValidationError::new("cache.backend_timeout_ms", "must be greater than 0"));
    }
    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    let mut ids = HashSet::new();
    for (i, dep) in config.dependencies.iter().enumerate() {
        let field = format!("dependencies[{i}]");
        if dep.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.id"), "must not be empty"));
        } else if !ids.insert(dep.id.as_str()) {
            errors.push(ValidationError::new(format!("{field}.id"), format!("duplicate dependency {}", dep.id)));
        }
        validate_dependency(&field, dep, &mut errors);
        let deadline_ms = config.deadlines.operation_ms;
        if dep.endpoint.is_some() && deadline_ms > 0 && dep.request_timeout_ms >= deadline_ms {
            errors.push(ValidationError::new(
                format!("{field}.request_timeout_ms"),
                "must be shorter than deadlines.operation_ms",
            ));
        }
    }

    let mut edge_refs_ok = true;
    for (i, edge) in config.edges.iter().enumerate() {
        for (name, id) in [("upstream", &edge.upstream), ("dependent", &edge.dependent)] {
            if !ids.contains(id.as_str()) {
                edge_refs_ok = false;
                errors.push(ValidationError::new(
                    format!("edges[{i}].{name}"),
                    format!("unknown dependency {id}"),
                ));
            }
        }
        if edge.upstream == edge.dependent {
            edge_refs_ok = false;
            errors.push(ValidationError::new(format!("edges[{i}]"), "a dependency cannot depend on itself"));
        }
    }

    let mut operations = HashSet::new();
    for (i, op) in config.operations.iter().enumerate() {
        let field = format!("operations[{i}]");
        if !operations.insert(op.name.as_str()) {
            errors.push(ValidationError::new(format!("{field}.name"), format!("duplicate operation {}", op.name)));
        }
        match config.dependency(&op.dependency) {
            None => errors.push(ValidationError::new(
                format!("{field}.dependency"),
                format!("unknown dependency {}", op.dependency),
            )),
            Some(dep) if dep.endpoint.is_none() => errors.push(ValidationError::new(
                format!("{field}.dependency"),
                format!("dependency {} has no endpoint", op.dependency),
            )),
            Some(_) => {}
        }
    }

    // Only meaningful once every edge resolves.
    if edge_refs_ok && ids.len() == config.dependencies.len() {
        if let Err(GraphError::Cycle(members)) = config.health_graph() {
            errors.push(ValidationError::new(
                "edges",
                format!("dependency cycle involving {}", members.join(", ")),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_dependency(field: &str, dep: &DependencyConfig, errors: &mut Vec<ValidationError>) {
    if dep.failure_threshold == 0 {
        errors.push(ValidationError::new(format!("{field}.failure_threshold"), "must be at least 1"));
    }
    if dep.cooldown_ms == 0 {
        errors.push(ValidationError::new(format!("{field}.cooldown_ms"), "must be greater than 0"));
    }
    if dep.base_delay_ms > dep.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{field}.base_delay_ms"),
            "must not exceed max_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&dep.jitter_ratio) {
        errors.push(ValidationError::new(format!("{field}.jitter_ratio"), "must be between 0.0 and 1.0"));
    }
    if let Some(endpoint) = &dep.endpoint {
        if let Err(e) = Url::parse(endpoint) {
            errors.push(ValidationError::new(format!("{field}.endpoint"), format!("invalid URL: {e}")));
        }
        if dep.request_timeout_ms == 0 {
            errors.push(ValidationError::new(format!("{field}.request_timeout_ms"), "must be greater than 0"));
        }
    }
}
