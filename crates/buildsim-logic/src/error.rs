//! Crate error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by the simulation core.
///
/// Unknown equipment or connection types met in the middle of a run are not
/// errors; they fall back to the defaults in [`crate::constants`].
#[derive(Debug, Error)]
pub enum SimError {
    /// The starting equipment id is not in the catalog. Raised before any
    /// simulation state is touched.
    #[error("equipment not found: {0}")]
    NotFound(String),

    /// One or more configuration values are out of range.
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    /// A seed was requested on a simulator that already holds a failure.
    #[error("simulation already seeded with {0}")]
    AlreadySeeded(String),

    /// Configuration text could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_id() {
        let e = SimError::NotFound("ups-9".into());
        assert_eq!(e.to_string(), "equipment not found: ups-9");
    }

    #[test]
    fn test_invalid_config_lists_every_error() {
        let e = SimError::InvalidConfig(vec![
            ConfigError::NonPositiveTimeStep(0.0),
            ConfigError::EmptyGrid { width: 0, height: 4 },
        ]);
        let msg = e.to_string();
        assert!(msg.contains("time step"));
        assert!(msg.contains("grid"));
    }
}
