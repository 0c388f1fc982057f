//! Integration tests for the full failure pipeline.
//!
//! Exercises: BuildSimConfig → FacilityGraph → FailureSimulator
//! → ImpactAnalysis / ResilienceReport → ParticleEngine → rendered panel
//!
//! All tests are pure logic with injected random sources.

use buildsim_logic::config::{validate_config, BuildSimConfig, ConfigError, SimulationConfig};
use buildsim_logic::electrical::{Conductor, ElectricalComponent, ElectricalFault, ElectricalModel};
use buildsim_logic::graph::{ConnectionType, Equipment, FacilityGraph};
use buildsim_logic::impact::Severity;
use buildsim_logic::particles::{ParticleEngine, ParticleType};
use buildsim_logic::propagation::{propagate, FailureKind};
use buildsim_logic::report::{simulate_failure, FailureReport};
use buildsim_logic::resilience::analyze_resilience;
use buildsim_logic::scenes;
use buildsim_logic::SimError;
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Helpers ────────────────────────────────────────────────────────────

/// Small office: UPS feeds two panels, one panel feeds a network closet.
fn office() -> FacilityGraph {
    FacilityGraph::from_parts(
        [
            Equipment::new("ups-1", "ups").at(0.0, 0.0),
            Equipment::new("panel-a", "panel").at(5.0, 0.0),
            Equipment::new("panel-b", "panel").at(5.0, 10.0),
            Equipment::new("mdf-1", "mdf").at(10.0, 0.0),
            Equipment::new("switch-1", "switch").at(15.0, 0.0),
            Equipment::new("ap-1", "access_point").at(20.0, 2.0),
            Equipment::new("ap-2", "access_point").at(20.0, -2.0),
            Equipment::new("ahu-1", "ahu").at(5.0, 15.0),
            Equipment::new("sink-1", "fixture"),
        ],
        &[
            ("ups-1", "panel-a", ConnectionType::Power),
            ("ups-1", "panel-b", ConnectionType::Power),
            ("panel-a", "mdf-1", ConnectionType::Power),
            ("mdf-1", "switch-1", ConnectionType::Data),
            ("switch-1", "ap-1", ConnectionType::Data),
            ("switch-1", "ap-2", ConnectionType::Data),
            ("panel-b", "ahu-1", ConnectionType::Hvac),
            ("ahu-1", "sink-1", ConnectionType::Plumbing),
        ],
    )
}

fn short_run() -> BuildSimConfig {
    let mut config = BuildSimConfig::default();
    config.simulation.duration = 10.0;
    config
}

fn always_zero() -> StepRng {
    StepRng::new(0, 0)
}

// ── Propagation ────────────────────────────────────────────────────────

#[test]
fn power_chain_fails_one_hop_per_tenth() {
    let g = FacilityGraph::from_parts(
        [
            Equipment::new("A", "outlet"),
            Equipment::new("B", "outlet"),
            Equipment::new("C", "outlet"),
        ],
        &[
            ("A", "B", ConnectionType::Power),
            ("B", "C", ConnectionType::Power),
        ],
    );
    let config = SimulationConfig {
        time_step: 0.1,
        duration: 1.0,
        ..Default::default()
    };
    let outcome = propagate(&g, &g, "A", &config, &mut always_zero()).unwrap();

    assert_eq!(outcome.total_affected, 3);
    assert_eq!(outcome.timeline[0].kind, FailureKind::Initial);
    assert!((outcome.timeline[1].time - 0.1).abs() < 1e-9);
    assert!((outcome.timeline[2].time - 0.2).abs() < 1e-9);
    assert_eq!(outcome.failed_nodes[2].cascade_from.as_deref(), Some("B"));
}

#[test]
fn whole_office_fails_with_certain_draws() {
    let g = office();
    let report = simulate_failure(&g, &g, "ups-1", &short_run(), &mut always_zero()).unwrap();
    assert_eq!(report.total_affected, g.equipment_count());

    let mut ids: Vec<&str> = report.timeline.iter().map(|e| e.equipment_id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), report.timeline.len(), "a node failed twice");
}

#[test]
fn seeded_reports_are_identical() {
    let g = office();
    let a = simulate_failure(&g, &g, "ups-1", &short_run(), &mut StdRng::seed_from_u64(99)).unwrap();
    let b = simulate_failure(&g, &g, "ups-1", &short_run(), &mut StdRng::seed_from_u64(99)).unwrap();
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

#[test]
fn unknown_start_reports_not_found() {
    let g = office();
    let err = simulate_failure(&g, &g, "ghost", &short_run(), &mut always_zero()).unwrap_err();
    assert!(matches!(err, SimError::NotFound(ref id) if id == "ghost"));
}

// ── Impact ─────────────────────────────────────────────────────────────

#[test]
fn impact_covers_every_failed_node() {
    let g = office();
    let report = simulate_failure(&g, &g, "ups-1", &short_run(), &mut always_zero()).unwrap();
    let analysis = &report.impact_analysis;

    let by_type: usize = analysis.by_equipment_type.values().sum();
    let by_severity: usize = analysis.by_severity.values().sum();
    assert_eq!(by_type, report.total_affected);
    assert_eq!(by_severity, report.total_affected);
    assert_eq!(analysis.by_severity[&Severity::Critical], 1);
    assert_eq!(analysis.by_equipment_type["panel"], 2);

    // ups 5000 + 2 panels 3000 + mdf 15000 + switch 2000 + 2 aps 500 + 2 defaults 1000
    assert_eq!(analysis.estimated_cost, 5000.0 + 6000.0 + 15000.0 + 2000.0 + 1000.0 + 2000.0);
    assert!(analysis
        .critical_paths
        .iter()
        .any(|p| p.path == vec!["ups-1", "panel-a", "mdf-1", "switch-1", "ap-1"]));
}

// ── Resilience ─────────────────────────────────────────────────────────

#[test]
fn tree_topology_is_all_single_points() {
    let g = office();
    let report = analyze_resilience(&g, &g);
    assert_eq!(report.overall_score, 0.0);
    assert_eq!(report.vulnerabilities.len(), g.equipment_count());
    assert_eq!(report.redundancy_map["ups-1"], 0);
    assert_eq!(report.recommendations.len(), 2);
}

#[test]
fn dual_feed_raises_score() {
    let mut g = office();
    g.connect("panel-b", "mdf-1", ConnectionType::Power);
    let report = analyze_resilience(&g, &g);
    assert_eq!(report.redundancy_map["mdf-1"], 2);
    assert!(report.overall_score > 0.0);
    assert!(report.vulnerabilities.iter().all(|v| v.equipment_id != "mdf-1"));
}

// ── Electrical ─────────────────────────────────────────────────────────

fn branch_circuit(ampacity: f64) -> ElectricalModel {
    let mut model = ElectricalModel::new(120.0);
    model.add_component(ElectricalComponent::load((40.0, 10.0), 10.0));
    model.add_conductor(Conductor::new((5.0, 10.0), (40.0, 10.0), 14, 30.0).with_ampacity(ampacity));
    model
}

#[test]
fn branch_circuit_within_ampacity() {
    let mut model = branch_circuit(15.0);
    let current = model.calculate_ohms_law();
    assert!((model.total_resistance() - 10.249).abs() < 1e-3);
    assert!((current - 11.71).abs() < 0.01);
    assert!(model
        .detect_faults()
        .iter()
        .all(|f| !matches!(f, ElectricalFault::Overcurrent { .. })));
}

#[test]
fn branch_circuit_overloaded() {
    let mut model = branch_circuit(10.0);
    let faults = model.detect_faults();
    let overload = faults.iter().find_map(|f| match f {
        ElectricalFault::Overcurrent {
            overload_percent, ..
        } => Some(*overload_percent),
        _ => None,
    });
    assert!((overload.unwrap() - 17.1).abs() < 0.1);
}

#[test]
fn breaker_opens_overloaded_circuit() {
    let mut model = branch_circuit(15.0);
    model.add_circuit_breaker((5.0, 10.0), 5.0);
    assert_eq!(model.calculate_ohms_law(), 0.0);
    let mut engine = ParticleEngine::new(Default::default());
    assert_eq!(model.simulate_current_flow(&mut engine, &mut StdRng::seed_from_u64(1)), 0);
}

// ── Visualization ──────────────────────────────────────────────────────

#[test]
fn report_panel_shows_timeline_and_particles() {
    let g = office();
    let report: FailureReport =
        simulate_failure(&g, &g, "ups-1", &short_run(), &mut always_zero()).unwrap();
    let text = &report.visualization_text;
    assert!(text.starts_with("═══ Cascade from ups-1 ═══"));
    assert!(text.contains("ups-1 (initial)"));
    assert!(text.contains("panel-a <- ups-1 (power"));
    assert!(!text.contains("Particles: 0\n"));
}

#[test]
fn scenes_render_panels() {
    let config = BuildSimConfig::default().engine;
    let mut rng = StdRng::seed_from_u64(8);
    let leak = scenes::water_leak(&config, (30.0, 3.0), 4, &mut rng);
    assert!(leak.engine.count_by_type().contains_key(&ParticleType::Water));
    assert!(leak.render().contains("═══ Water Leak ═══"));

    let mut model = branch_circuit(10.0);
    let circuit = scenes::circuit(&config, &mut model, &mut rng);
    assert!(circuit.render().contains("Overcurrent"));
}

// ── Configuration ──────────────────────────────────────────────────────

#[test]
fn json_config_overrides_defaults() {
    let json = r#"{
        "engine": { "width": 40, "height": 12 },
        "simulation": { "time_step": 0.5, "resilience_overrides": { "ahu": 0.6 } },
        "impact": { "high_before": 2.0 }
    }"#;
    let config = BuildSimConfig::from_json(json).unwrap();
    assert_eq!(config.engine.width, 40);
    assert_eq!(config.engine.max_particles, 2000);
    assert_eq!(config.simulation.time_step, 0.5);
    assert_eq!(config.simulation.duration, 60.0);
    assert_eq!(config.simulation.resilience("AHU"), 0.6);
    assert_eq!(config.impact.medium_before, 10.0);
}

#[test]
fn invalid_config_collects_every_error() {
    let json = r#"{
        "engine": { "width": 0 },
        "simulation": { "time_step": -1.0, "base_rate_overrides": { "power": 1.5 } }
    }"#;
    match BuildSimConfig::from_json(json) {
        Err(SimError::InvalidConfig(errors)) => {
            assert_eq!(errors.len(), 3);
            assert!(errors.contains(&ConfigError::NonPositiveTimeStep(-1.0)));
            assert!(errors.contains(&ConfigError::BaseRateOutOfRange("power".into())));
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(BuildSimConfig::from_json("{ nope"), Err(SimError::Json(_))));
    assert!(validate_config(&BuildSimConfig::default()).is_empty());
}
