//! Fixed-step cascading failure simulator.
//!
//! Nodes live in an arena keyed by equipment id. A node's `cascade_from`
//! holds the id of the node that triggered it, never a reference, so the
//! chain can be walked later without shared ownership.
//!
//! Each step looks only at nodes that were already failed when the step
//! began, so a failure propagates at most one hop per step. Every node is
//! mutated in a single call that also records its event; stopping between
//! steps therefore never leaves a half-failed node behind.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{BuildSimConfig, SimulationConfig};
use crate::error::{Result, SimError};
use crate::graph::{ConnectionGraph, ConnectionType, EquipmentCatalog, Location};

/// Failure state of one node. `Failed` is terminal within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureState {
    NotFailed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Initial,
    Cascading,
}

/// Simulation state for one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentNode {
    pub equipment_id: String,
    pub equipment_type: String,
    pub location: Option<Location>,
    /// Probability with which the node failed (1.0 for the initial node).
    pub failure_probability: f64,
    /// Time at which the node failed.
    pub failure_time: Option<f64>,
    pub state: FailureState,
    /// Id of the node whose failure triggered this one.
    pub cascade_from: Option<String>,
    /// Systems through which this node was affected.
    pub affected_systems: Vec<ConnectionType>,
}

impl EquipmentNode {
    fn new(equipment_id: &str, equipment_type: String, location: Option<Location>) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            equipment_type,
            location,
            failure_probability: 0.0,
            failure_time: None,
            state: FailureState::NotFailed,
            cascade_from: None,
            affected_systems: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == FailureState::Failed
    }
}

/// One entry of the failure timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub time: f64,
    pub equipment_id: String,
    pub kind: FailureKind,
    pub probability: f64,
    pub caused_by: Option<String>,
    /// Link the failure travelled over (`None` for the initial failure).
    pub connection: Option<ConnectionType>,
}

/// Result of a completed (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationOutcome {
    pub initial_failure: String,
    pub timeline: Vec<FailureEvent>,
    /// Failed nodes, including the initial one.
    pub total_affected: usize,
    /// Failed nodes in failure order.
    pub failed_nodes: Vec<EquipmentNode>,
    /// Simulated time reached.
    pub elapsed: f64,
    pub cancelled: bool,
}

/// Cascading failure simulator over an external graph.
pub struct FailureSimulator<'a> {
    graph: &'a dyn ConnectionGraph,
    catalog: &'a dyn EquipmentCatalog,
    config: SimulationConfig,
    nodes: BTreeMap<String, EquipmentNode>,
    /// Failed ids in failure order.
    failed_order: Vec<String>,
    timeline: Vec<FailureEvent>,
    elapsed: f64,
    steps_done: u64,
}

impl<'a> FailureSimulator<'a> {
    /// Create a simulator. The config is validated up front.
    pub fn new(
        graph: &'a dyn ConnectionGraph,
        catalog: &'a dyn EquipmentCatalog,
        config: SimulationConfig,
    ) -> Result<Self> {
        let config = BuildSimConfig {
            simulation: config,
            ..Default::default()
        }
        .validated()?
        .simulation;
        Ok(Self {
            graph,
            catalog,
            config,
            nodes: BTreeMap::new(),
            failed_order: Vec::new(),
            timeline: Vec::new(),
            elapsed: 0.0,
            steps_done: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn timeline(&self) -> &[FailureEvent] {
        &self.timeline
    }

    pub fn node(&self, id: &str) -> Option<&EquipmentNode> {
        self.nodes.get(id)
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(EquipmentNode::is_failed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed_order.len()
    }

    /// Fail `start_id` at t=0 with probability 1.0.
    ///
    /// Fails with [`SimError::NotFound`] before touching any state when the
    /// catalog does not know the id.
    pub fn seed_failure(&mut self, start_id: &str) -> Result<()> {
        let equipment = self
            .catalog
            .equipment(start_id)
            .ok_or_else(|| SimError::NotFound(start_id.to_string()))?;
        if let Some(existing) = self.failed_order.first() {
            return Err(SimError::AlreadySeeded(existing.clone()));
        }

        let mut systems: Vec<ConnectionType> = self
            .graph
            .downstream(start_id)
            .iter()
            .map(|d| self.graph.connection_type(start_id, d))
            .collect();
        systems.sort();
        systems.dedup();

        self.nodes.insert(
            start_id.to_string(),
            EquipmentNode::new(start_id, equipment.equipment_type, equipment.location),
        );
        self.mark_failed(start_id, 0.0, 1.0, None, None);
        if let Some(node) = self.nodes.get_mut(start_id) {
            node.affected_systems = systems;
        }
        info!("Initial failure seeded at {}", start_id);
        Ok(())
    }

    /// Run until `duration` is reached.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> PropagationOutcome {
        self.run_until(rng, |_| false)
    }

    /// Run until `duration` is reached or `cancel(elapsed)` returns true.
    /// The predicate is checked between steps only.
    pub fn run_until<R, F>(&mut self, rng: &mut R, mut cancel: F) -> PropagationOutcome
    where
        R: Rng + ?Sized,
        F: FnMut(f64) -> bool,
    {
        let total_steps = self.config.step_count();
        let mut cancelled = false;
        while self.steps_done < total_steps {
            if cancel(self.elapsed) {
                cancelled = true;
                info!("Simulation cancelled at t={:.2}", self.elapsed);
                break;
            }
            self.step(rng);
        }
        info!(
            "Simulation finished: {} failed over {:.2} time units",
            self.failed_order.len(),
            self.elapsed
        );
        self.outcome(cancelled)
    }

    /// Advance exactly one time step.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.steps_done += 1;
        let t = self.steps_done as f64 * self.config.time_step;
        self.elapsed = t;

        let sources = self.failed_order.clone();
        for source in &sources {
            let source_time = self
                .nodes
                .get(source)
                .and_then(|n| n.failure_time)
                .unwrap_or(0.0);
            for target in self.graph.downstream(source) {
                if self.is_failed(&target) {
                    continue;
                }
                self.ensure_node(&target);
                let connection = self.graph.connection_type(source, &target);
                let p = self.cascade_probability(source, &target, connection, t - source_time);
                if rng.gen::<f64>() < p {
                    self.mark_failed(&target, t, p, Some(source.as_str()), Some(connection));
                }
            }
        }
    }

    /// Probability that `target` fails this step given `source` failed
    /// `since` time units ago. Does not touch simulation state.
    pub fn cascade_probability(
        &self,
        source: &str,
        target: &str,
        connection: ConnectionType,
        since: f64,
    ) -> f64 {
        let base = self.config.base_rate(connection);
        let (target_type, target_loc) = self.describe(target);
        let (_, source_loc) = self.describe(source);
        let resilience = self.config.resilience(&target_type);
        let time_factor = (-since.max(0.0) / self.config.time_decay).exp();

        let distance_factor = match (source_loc, target_loc) {
            (Some(a), Some(b)) => (-a.distance(&b) / self.config.distance_decay).exp(),
            _ => 1.0,
        };

        let p = base * (1.0 - resilience) * time_factor * distance_factor;
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// Equipment type and location from the arena, then the catalog, then
    /// the `"unknown"` default.
    fn describe(&self, id: &str) -> (String, Option<Location>) {
        if let Some(node) = self.nodes.get(id) {
            return (node.equipment_type.clone(), node.location);
        }
        match self.catalog.equipment(id) {
            Some(e) => (e.equipment_type, e.location),
            None => (String::from("unknown"), None),
        }
    }

    fn ensure_node(&mut self, id: &str) {
        if self.nodes.contains_key(id) {
            return;
        }
        let node = match self.catalog.equipment(id) {
            Some(e) => EquipmentNode::new(id, e.equipment_type, e.location),
            None => {
                warn!("Equipment {} missing from catalog, using defaults", id);
                EquipmentNode::new(id, String::from("unknown"), None)
            }
        };
        self.nodes.insert(id.to_string(), node);
    }

    fn mark_failed(
        &mut self,
        id: &str,
        time: f64,
        probability: f64,
        cause: Option<&str>,
        connection: Option<ConnectionType>,
    ) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.is_failed() {
            return;
        }
        node.state = FailureState::Failed;
        node.failure_time = Some(time);
        node.failure_probability = probability;
        node.cascade_from = cause.map(str::to_string);
        if let Some(c) = connection {
            node.affected_systems.push(c);
        }
        self.failed_order.push(id.to_string());

        let kind = if cause.is_some() {
            FailureKind::Cascading
        } else {
            FailureKind::Initial
        };
        debug!(
            "t={:.2} {} failed ({:?}, p={:.3}, from {:?})",
            time, id, kind, probability, cause
        );
        self.timeline.push(FailureEvent {
            time,
            equipment_id: id.to_string(),
            kind,
            probability,
            caused_by: cause.map(str::to_string),
            connection,
        });
    }

    fn outcome(&self, cancelled: bool) -> PropagationOutcome {
        PropagationOutcome {
            initial_failure: self.failed_order.first().cloned().unwrap_or_default(),
            timeline: self.timeline.clone(),
            total_affected: self.failed_order.len(),
            failed_nodes: self
                .failed_order
                .iter()
                .filter_map(|id| self.nodes.get(id).cloned())
                .collect(),
            elapsed: self.elapsed,
            cancelled,
        }
    }
}

/// Seed `start_id` and run to completion.
pub fn propagate<R: Rng + ?Sized>(
    graph: &dyn ConnectionGraph,
    catalog: &dyn EquipmentCatalog,
    start_id: &str,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<PropagationOutcome> {
    let mut sim = FailureSimulator::new(graph, catalog, config.clone())?;
    sim.seed_failure(start_id)?;
    Ok(sim.run(rng))
}
