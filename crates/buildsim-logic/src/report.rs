//! End-to-end failure report: propagate, analyze, visualize.

use std::collections::BTreeMap;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{BuildSimConfig, EngineConfig};
use crate::error::Result;
use crate::graph::{ConnectionGraph, ConnectionType, EquipmentCatalog};
use crate::impact::{analyze_impact, ImpactAnalysis};
use crate::particles::{ParticleEngine, ParticleType};
use crate::propagation::{EquipmentNode, FailureEvent, FailureKind, FailureSimulator, PropagationOutcome};
use crate::render::render_panel;

/// Engine ticks replayed per integer time bucket.
const TICKS_PER_BUCKET: usize = 3;
const TICK: f32 = 0.1;
/// Particles spawned per cascading failure.
const CASCADE_BURST: usize = 5;
/// Cells kept free around mapped equipment.
const MARGIN: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub initial_failure: String,
    pub timeline: Vec<FailureEvent>,
    pub total_affected: usize,
    pub impact_analysis: ImpactAnalysis,
    pub visualization_text: String,
    pub cancelled: bool,
}

impl FailureReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run a full failure scenario from `start_id`.
pub fn simulate_failure<R: Rng + ?Sized>(
    graph: &dyn ConnectionGraph,
    catalog: &dyn EquipmentCatalog,
    start_id: &str,
    config: &BuildSimConfig,
    rng: &mut R,
) -> Result<FailureReport> {
    simulate_failure_until(graph, catalog, start_id, config, rng, |_| false)
}

/// [`simulate_failure`] with a cancellation predicate checked between steps.
pub fn simulate_failure_until<R, F>(
    graph: &dyn ConnectionGraph,
    catalog: &dyn EquipmentCatalog,
    start_id: &str,
    config: &BuildSimConfig,
    rng: &mut R,
    cancel: F,
) -> Result<FailureReport>
where
    R: Rng + ?Sized,
    F: FnMut(f64) -> bool,
{
    let config = config.clone().validated()?;
    let mut sim = FailureSimulator::new(graph, catalog, config.simulation.clone())?;
    sim.seed_failure(start_id)?;
    let outcome = sim.run_until(rng, cancel);

    let impact_analysis = analyze_impact(&outcome.failed_nodes, &config.impact);
    let visualization_text = visualize_outcome(&outcome, &impact_analysis, &config.engine, rng);
    info!(
        "Failure report for {}: {} affected, est. cost {:.0}",
        start_id, outcome.total_affected, impact_analysis.estimated_cost
    );

    Ok(FailureReport {
        initial_failure: outcome.initial_failure,
        timeline: outcome.timeline,
        total_affected: outcome.total_affected,
        impact_analysis,
        visualization_text,
        cancelled: outcome.cancelled,
    })
}

/// Particle type and burst size that visualize one failure event.
pub fn event_particles(event: &FailureEvent) -> Vec<(ParticleType, usize)> {
    match event.kind {
        FailureKind::Initial => vec![(ParticleType::Smoke, 6), (ParticleType::Heat, 4)],
        FailureKind::Cascading => {
            let kind = match event.connection.unwrap_or(ConnectionType::Other) {
                ConnectionType::Power | ConnectionType::Data | ConnectionType::Control => {
                    ParticleType::Electric
                }
                ConnectionType::Hvac => ParticleType::Air,
                ConnectionType::Plumbing => ParticleType::Water,
                ConnectionType::Other => ParticleType::Smoke,
            };
            vec![(kind, CASCADE_BURST)]
        }
    }
}

/// Grid position for every failed node.
///
/// Located equipment is scaled into the grid with a margin; equipment
/// without a location is spread along the middle row.
pub fn layout_nodes(nodes: &[EquipmentNode], engine: &EngineConfig) -> BTreeMap<String, (f32, f32)> {
    let (w, h) = (engine.width as f32, engine.height as f32);
    let located: Vec<(&str, f64, f64)> = nodes
        .iter()
        .filter_map(|n| n.location.map(|l| (n.equipment_id.as_str(), l.x, l.y)))
        .collect();

    let mut positions = BTreeMap::new();
    if !located.is_empty() {
        let min_x = located.iter().map(|l| l.1).fold(f64::INFINITY, f64::min);
        let max_x = located.iter().map(|l| l.1).fold(f64::NEG_INFINITY, f64::max);
        let min_y = located.iter().map(|l| l.2).fold(f64::INFINITY, f64::min);
        let max_y = located.iter().map(|l| l.2).fold(f64::NEG_INFINITY, f64::max);
        let usable_w = (w - 2.0 * MARGIN).max(1.0);
        let usable_h = (h - 2.0 * MARGIN).max(1.0);

        for (id, x, y) in located {
            let fx = if max_x > min_x { ((x - min_x) / (max_x - min_x)) as f32 } else { 0.5 };
            let fy = if max_y > min_y { ((y - min_y) / (max_y - min_y)) as f32 } else { 0.5 };
            let gx = (MARGIN + fx * usable_w).min(w - 0.5).max(0.0);
            let gy = (MARGIN + fy * usable_h).min(h - 0.5).max(0.0);
            positions.insert(id.to_string(), (gx, gy));
        }
    }

    let unlocated: Vec<&EquipmentNode> = nodes.iter().filter(|n| n.location.is_none()).collect();
    let n = unlocated.len() as f32;
    for (i, node) in unlocated.into_iter().enumerate() {
        let x = w * (i as f32 + 1.0) / (n + 1.0);
        positions.insert(node.equipment_id.clone(), (x, h / 2.0));
    }
    positions
}

/// Replay the timeline through a particle engine and render the panel.
pub fn visualize_outcome<R: Rng + ?Sized>(
    outcome: &PropagationOutcome,
    impact: &ImpactAnalysis,
    engine_config: &EngineConfig,
    rng: &mut R,
) -> String {
    let mut engine = ParticleEngine::new(engine_config.clone());
    let positions = layout_nodes(&outcome.failed_nodes, engine_config);

    let mut buckets: BTreeMap<i64, Vec<&FailureEvent>> = BTreeMap::new();
    for e in &outcome.timeline {
        buckets.entry(e.time.floor() as i64).or_default().push(e);
    }
    for events in buckets.values() {
        for event in events {
            if let Some(&(x, y)) = positions.get(&event.equipment_id) {
                for (kind, count) in event_particles(event) {
                    engine.spawn(x, y, kind, count, rng);
                }
            }
        }
        for _ in 0..TICKS_PER_BUCKET {
            engine.update(TICK);
        }
    }

    let mut notes = vec![format!(
        "Affected: {}  Downtime: {:.1} h  Cost: {:.0}",
        outcome.total_affected, impact.estimated_downtime_hours, impact.estimated_cost
    )];
    if !impact.critical_paths.is_empty() {
        notes.push(format!("Critical paths: {}", impact.critical_paths.len()));
        for path in &impact.critical_paths {
            notes.push(format!(
                "  {} (risk {:.2})",
                path.path.join(" -> "),
                path.risk_score
            ));
        }
    }
    if outcome.cancelled {
        notes.push(format!("Cancelled at t={:.2}", outcome.elapsed));
    }

    render_panel(
        &format!("Cascade from {}", outcome.initial_failure),
        &engine,
        Some(outcome.timeline.as_slice()),
        &notes,
    )
}
