//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Value ranges: weights > 0, tolerance in (0, 1), non-zero timings
//! - Referential checks: `fail_server` names a configured port
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::schema::{HarnessConfig, ScenarioConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq)]
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = Url::parse(&config.proxy.url) {
        errors.push(ValidationError::new("proxy.url", e.to_string()));
    }
    if !config.proxy.ready_path.starts_with('/') {
        errors.push(ValidationError::new("proxy.ready_path", "must start with '/'"));
    }

    if config.polling.max_wait_ms == 0 {
        errors.push(ValidationError::new("polling.max_wait_ms", "must be > 0"));
    }
    if config.polling.request_timeout_ms == 0 {
        errors.push(ValidationError::new("polling.request_timeout_ms", "must be > 0"));
    }

    if config.load.concurrency == 0 {
        errors.push(ValidationError::new("load.concurrency", "must be > 0"));
    }
    check_tolerance("load.tolerance", config.load.tolerance, &mut errors);

    let mut names = HashSet::new();
    for (i, scenario) in config.scenarios.iter().enumerate() {
        if !names.insert(scenario.name.as_str()) {
            errors.push(ValidationError::new(
                format!("scenarios[{}].name", i),
                format!("duplicate scenario name '{}'", scenario.name),
            ));
        }
        validate_scenario(i, scenario, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_scenario(i: usize, scenario: &ScenarioConfig, errors: &mut Vec<ValidationError>) {
    let prefix = format!("scenarios[{}]", i);

    if scenario.name.is_empty() {
        errors.push(ValidationError::new(format!("{}.name", prefix), "must not be empty"));
    }
    if scenario.servers.is_empty() {
        errors.push(ValidationError::new(format!("{}.servers", prefix), "must not be empty"));
    }

    for (j, spec) in scenario.servers.iter().enumerate() {
        let weight = spec.resolve_weight(scenario.weights.as_ref().and_then(|w| w.get(j).copied()));
        check_weight(&format!("{}.servers[{}]", prefix, j), weight, errors);
    }

    if let Some(tolerance) = scenario.tolerance {
        check_tolerance(&format!("{}.tolerance", prefix), tolerance, errors);
    }

    if let Some(reweight) = &scenario.reweight {
        if reweight.weights.len() > scenario.servers.len() {
            errors.push(ValidationError::new(
                format!("{}.reweight.weights", prefix),
                "more weights than servers",
            ));
        }
        for (j, weight) in reweight.weights.iter().enumerate() {
            check_weight(&format!("{}.reweight.weights[{}]", prefix, j), *weight, errors);
        }
    }

    if let Some(port) = scenario.fail_server {
        if !scenario.servers.iter().any(|s| s.port() == port) {
            errors.push(ValidationError::new(
                format!("{}.fail_server", prefix),
                format!("port {} is not a member", port),
            ));
        } else if scenario.servers.len() < 2 {
            errors.push(ValidationError::new(
                format!("{}.fail_server", prefix),
                "needs at least one surviving server",
            ));
        }
    }
}

fn check_weight(field: &str, weight: f64, errors: &mut Vec<ValidationError>) {
    if !weight.is_finite() || weight <= 0.0 {
        errors.push(ValidationError::new(field, format!("weight {} must be > 0", weight)));
    }
}

fn check_tolerance(field: &str, tolerance: f64, errors: &mut Vec<ValidationError>) {
    if !(tolerance > 0.0 && tolerance < 1.0) {
        errors.push(ValidationError::new(field, format!("{} is outside (0, 1)", tolerance)));
    }
}
