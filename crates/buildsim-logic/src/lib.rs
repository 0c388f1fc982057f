//! Pure simulation logic for BuildSim.
//!
//! This crate models cascading equipment failures across a facility's
//! connection graph and renders physical phenomena (airflow, water, current,
//! heat, occupancy) as density-mapped character art. Functions take plain
//! data plus an explicit random source and return results, so every run is
//! reproducible and unit-testable. Persistence and transport belong to the
//! caller.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Engine/simulation/impact configuration, JSON loading, validation |
//! | [`constants`] | Base rates, resilience factors, cost tables, glyphs |
//! | [`electrical`] | Ohm's law, conductor resistance, faults, breakers |
//! | [`error`] | Crate error type |
//! | [`graph`] | Connection-graph and equipment-catalog seams, in-memory graph |
//! | [`impact`] | Severity buckets, downtime/cost estimates, critical paths |
//! | [`particles`] | Time-stepped particle engine and density rasterizer |
//! | [`propagation`] | Fixed-step cascading failure simulator |
//! | [`render`] | Bordered text panel with legend and failure timeline |
//! | [`report`] | End-to-end failure report (simulate → analyze → render) |
//! | [`resilience`] | Upstream redundancy scoring and single points of failure |
//! | [`scenes`] | Preset airflow, leak, heat, occupancy and circuit scenes |
//!
//! ```
//! use buildsim_logic::graph::{ConnectionType, Equipment, FacilityGraph};
//! use buildsim_logic::report::simulate_failure;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut graph = FacilityGraph::new();
//! graph.add_equipment(Equipment::new("ups-1", "ups").at(0.0, 0.0));
//! graph.add_equipment(Equipment::new("panel-1", "panel").at(5.0, 0.0));
//! graph.connect("ups-1", "panel-1", ConnectionType::Power);
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let report = simulate_failure(&graph, &graph, "ups-1", &Default::default(), &mut rng).unwrap();
//! assert_eq!(report.initial_failure, "ups-1");
//! assert!(report.total_affected >= 1);
//! ```

pub mod config;
pub mod constants;
pub mod electrical;
pub mod error;
pub mod graph;
pub mod impact;
pub mod particles;
pub mod propagation;
pub mod render;
pub mod report;
pub mod resilience;
pub mod scenes;

pub use error::{Result, SimError};
