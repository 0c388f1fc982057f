//! Run configuration for the particle engine, failure simulator and impact
//! analysis.
//!
//! Every section has a `Default` that reproduces the reference constants, so
//! callers only override what they need. Configs can be loaded from JSON
//! with missing sections filled in from defaults:
//!
//! ```
//! use buildsim_logic::config::{validate_config, BuildSimConfig};
//!
//! let config = BuildSimConfig::from_json(r#"{ "simulation": { "duration": 30.0 } }"#).unwrap();
//! assert_eq!(config.simulation.duration, 30.0);
//! assert_eq!(config.simulation.time_step, 1.0);
//! assert!(validate_config(&config).is_empty());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{failure, impact};
use crate::error::{Result, SimError};
use crate::graph::ConnectionType;

/// Particle plane and physics parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid width in cells (also the plane width in world units).
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// Live particle capacity; spawns beyond it are dropped.
    pub max_particles: usize,
    /// Downward acceleration (y grows downward).
    pub gravity: f32,
    /// Horizontal acceleration applied to every particle.
    pub wind: f32,
    /// Per-tick velocity multiplier.
    pub friction: f32,
    /// World units moved per unit of velocity per time unit.
    pub scale_factor: f32,
    /// Maximum spawn offset from the requested position.
    pub jitter: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 60,
            height: 20,
            max_particles: 2000,
            gravity: 9.8,
            wind: 0.0,
            friction: 0.98,
            scale_factor: 1.0,
            jitter: 0.5,
        }
    }
}

/// Cascading failure run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one simulation step.
    pub time_step: f64,
    /// Total simulated time.
    pub duration: f64,
    /// Decay constant for time since the upstream failure.
    pub time_decay: f64,
    /// Decay length for distance between equipment.
    pub distance_decay: f64,
    /// Resilience per equipment type, overriding the built-in table.
    pub resilience_overrides: BTreeMap<String, f64>,
    /// Base rate per connection type name, overriding the built-in table.
    pub base_rate_overrides: BTreeMap<String, f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0,
            duration: 60.0,
            time_decay: failure::TIME_DECAY,
            distance_decay: failure::DISTANCE_DECAY,
            resilience_overrides: BTreeMap::new(),
            base_rate_overrides: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    /// Resilience for an equipment type, honouring overrides.
    pub fn resilience(&self, equipment_type: &str) -> f64 {
        let key = equipment_type.to_ascii_lowercase();
        self.resilience_overrides
            .get(&key)
            .copied()
            .unwrap_or_else(|| failure::resilience_factor(&key))
            .clamp(0.0, 1.0)
    }

    /// Cascade base rate for a connection type, honouring overrides.
    pub fn base_rate(&self, connection: ConnectionType) -> f64 {
        self.base_rate_overrides
            .get(connection.as_str())
            .copied()
            .unwrap_or_else(|| connection.base_rate())
            .clamp(0.0, 1.0)
    }

    /// Number of steps needed to reach `duration`.
    pub fn step_count(&self) -> u64 {
        if self.time_step <= 0.0 || self.duration <= 0.0 {
            return 0;
        }
        // Tolerance keeps 1.0 / 0.1 at 10 steps rather than 11.
        (self.duration / self.time_step - 1e-9).ceil().max(0.0) as u64
    }
}

/// Severity bucket thresholds for impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Failures before this time (and after t=0) are High.
    pub high_before: f64,
    /// Failures before this time (and at or after `high_before`) are Medium.
    pub medium_before: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            high_before: impact::HIGH_BEFORE,
            medium_before: impact::MEDIUM_BEFORE,
        }
    }
}

/// Complete configuration for one failure/visualization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSimConfig {
    pub engine: EngineConfig,
    pub simulation: SimulationConfig,
    pub impact: ImpactConfig,
}

impl BuildSimConfig {
    /// Parse a JSON config and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validated()
    }

    /// Return `self` if valid, otherwise every problem found.
    pub fn validated(self) -> Result<Self> {
        let errors = validate_config(&self);
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(SimError::InvalidConfig(errors))
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("time step must be positive, got {0}")]
    NonPositiveTimeStep(f64),
    #[error("duration must be positive, got {0}")]
    NonPositiveDuration(f64),
    #[error("decay constants must be positive")]
    NonPositiveDecay,
    #[error("grid must be non-empty, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
    #[error("friction must be within [0, 1], got {0}")]
    FrictionOutOfRange(f32),
    #[error("resilience for {0} must be within [0, 1]")]
    ResilienceOutOfRange(String),
    #[error("base rate for {0} must be within [0, 1]")]
    BaseRateOutOfRange(String),
    #[error("severity thresholds must satisfy 0 < high ({high}) <= medium ({medium})")]
    InvalidSeverityThresholds { high: f64, medium: f64 },
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &BuildSimConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let sim = &config.simulation;
    let engine = &config.engine;

    if !(sim.time_step > 0.0) || !sim.time_step.is_finite() {
        errors.push(ConfigError::NonPositiveTimeStep(sim.time_step));
    }
    if !(sim.duration > 0.0) || !sim.duration.is_finite() {
        errors.push(ConfigError::NonPositiveDuration(sim.duration));
    }
    if !(sim.time_decay > 0.0) || !(sim.distance_decay > 0.0) {
        errors.push(ConfigError::NonPositiveDecay);
    }
    for (kind, r) in &sim.resilience_overrides {
        if !(0.0..=1.0).contains(r) {
            errors.push(ConfigError::ResilienceOutOfRange(kind.clone()));
        }
    }
    for (kind, rate) in &sim.base_rate_overrides {
        if !(0.0..=1.0).contains(rate) {
            errors.push(ConfigError::BaseRateOutOfRange(kind.clone()));
        }
    }

    if engine.width == 0 || engine.height == 0 {
        errors.push(ConfigError::EmptyGrid {
            width: engine.width,
            height: engine.height,
        });
    }
    if !(0.0..=1.0).contains(&engine.friction) {
        errors.push(ConfigError::FrictionOutOfRange(engine.friction));
    }

    let imp = &config.impact;
    if !(imp.high_before > 0.0) || imp.medium_before < imp.high_before {
        errors.push(ConfigError::InvalidSeverityThresholds {
            high: imp.high_before,
            medium: imp.medium_before,
        });
    }

    errors
}
