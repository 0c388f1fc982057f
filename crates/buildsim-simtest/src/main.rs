//! BuildSim Headless Simulation Harness
//!
//! Runs failure propagation, impact and resilience analysis and every
//! visualization against a synthetic campus facility. Runs entirely in-process with no I/O beyond stdout.
//!
//! Usage:
//!   cargo run -p buildsim-simtest
//!   cargo run -p buildsim-simtest -- --verbose
//!   cargo run -p buildsim-simtest -- --seed 7 --json

use buildsim_logic::config::{BuildSimConfig, SimulationConfig};
use buildsim_logic::electrical::{Conductor, ElectricalComponent, ElectricalModel};
use buildsim_logic::graph::{ConnectionType, Equipment, FacilityGraph};
use buildsim_logic::propagation::{propagate, FailureSimulator};
use buildsim_logic::report::simulate_failure;
use buildsim_logic::resilience::analyze_resilience;
use buildsim_logic::scenes::{self, Draft, HeatSource, Vent};
use buildsim_logic::SimError;
use log::info;
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

// ── Facility description ────────────────────────────────────────────────
const FACILITY_JSON: &str = include_str!("../../../data/campus_facility.json");

#[derive(Debug, Deserialize)]
struct FacilitySpec {
    name: String,
    equipment: Vec<EquipmentSpec>,
    connections: Vec<ConnectionSpec>,
}

#[derive(Debug, Deserialize)]
struct EquipmentSpec {
    id: String,
    #[serde(rename = "type")]
    equipment_type: String,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConnectionSpec {
    from: String,
    to: String,
    #[serde(rename = "type")]
    connection_type: String,
}

impl FacilitySpec {
    fn build_graph(&self) -> FacilityGraph {
        let mut graph = FacilityGraph::new();
        for e in &self.equipment {
            let mut equipment = Equipment::new(e.id.as_str(), e.equipment_type.as_str());
            if let (Some(x), Some(y)) = (e.x, e.y) {
                equipment = equipment.at(x, y);
            }
            graph.add_equipment(equipment);
        }
        for c in &self.connections {
            graph.connect(&c.from, &c.to, ConnectionType::parse(&c.connection_type));
        }
        graph
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Options {
    verbose: bool,
    json: bool,
    seed: u64,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut opts = Options {
        verbose: false,
        json: false,
        seed: 42,
    };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--verbose" => opts.verbose = true,
            "--json" => opts.json = true,
            "--seed" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(seed) => opts.seed = seed,
                    None => eprintln!("--seed expects an unsigned integer, keeping {}", opts.seed),
                }
            }
            other => eprintln!("ignoring unknown argument: {}", other),
        }
        i += 1;
    }
    opts
}

fn main() {
    env_logger::init();
    let opts = parse_args();
    println!("=== BuildSim Simulation Harness (seed {}) ===\n", opts.seed);

    let mut results = Vec::new();

    // 1. Facility description
    let facility = match serde_json::from_str::<FacilitySpec>(FACILITY_JSON) {
        Ok(f) => f,
        Err(e) => {
            println!("  ✗ facility_parse: JSON parse error: {}", e);
            std::process::exit(1);
        }
    };
    let graph = facility.build_graph();
    results.extend(validate_facility(&facility, &graph, opts.verbose));

    // 2. Failure propagation
    results.extend(validate_propagation(&graph, opts.seed, opts.verbose));

    // 3. Impact & resilience
    results.extend(validate_analysis(&graph, opts.seed, opts.verbose));

    // 4. Visualization
    results.extend(validate_visualization(&graph, &opts));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || opts.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );
    info!("Harness finished: {}/{} passed", passed, total);

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Facility ─────────────────────────────────────────────────────────

fn validate_facility(facility: &FacilitySpec, graph: &FacilityGraph, verbose: bool) -> Vec<TestResult> {
    println!("--- Facility: {} ---", facility.name);
    let mut results = Vec::new();

    let mut ids: Vec<&str> = facility.equipment.iter().map(|e| e.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    results.push(TestResult {
        name: "facility_unique_ids".into(),
        passed: ids.len() == facility.equipment.len(),
        detail: format!("{} equipment records", facility.equipment.len()),
    });

    let dangling: Vec<_> = facility
        .connections
        .iter()
        .filter(|c| ids.binary_search(&c.from.as_str()).is_err() || ids.binary_search(&c.to.as_str()).is_err())
        .collect();
    results.push(TestResult {
        name: "facility_connections_resolve".into(),
        passed: dangling.is_empty(),
        detail: if dangling.is_empty() {
            format!("{} connections, all endpoints known", graph.connection_count())
        } else {
            format!("{} connections reference unknown equipment", dangling.len())
        },
    });

    let unknown_types: Vec<_> = facility
        .connections
        .iter()
        .filter(|c| ConnectionType::parse(&c.connection_type) == ConnectionType::Other)
        .collect();
    results.push(TestResult {
        name: "facility_connection_types".into(),
        passed: unknown_types.is_empty(),
        detail: format!("{} connections fall back to 'other'", unknown_types.len()),
    });

    if verbose {
        println!("  Connections by type:");
        for kind in ConnectionType::ALL {
            let n = facility
                .connections
                .iter()
                .filter(|c| ConnectionType::parse(&c.connection_type) == kind)
                .count();
            println!("    {:9}: {}", kind.as_str(), n);
        }
    }

    results
}

// ── 2. Failure Propagation ──────────────────────────────────────────────

fn validate_propagation(graph: &FacilityGraph, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Failure Propagation ---");
    let mut results = Vec::new();

    let config = SimulationConfig {
        duration: 30.0,
        ..Default::default()
    };
    let a = propagate(graph, graph, "utility-feed", &config, &mut StdRng::seed_from_u64(seed));
    let b = propagate(graph, graph, "utility-feed", &config, &mut StdRng::seed_from_u64(seed));
    let same = match (&a, &b) {
        (Ok(a), Ok(b)) => serde_json::to_string(&a.timeline).ok() == serde_json::to_string(&b.timeline).ok(),
        _ => false,
    };
    results.push(TestResult {
        name: "propagation_deterministic".into(),
        passed: same,
        detail: format!(
            "{} failures with seed {}",
            a.as_ref().map(|o| o.total_affected).unwrap_or(0),
            seed
        ),
    });

    let monotonic = match FailureSimulator::new(graph, graph, config.clone()) {
        Ok(mut sim) => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ok = sim.seed_failure("utility-feed").is_ok();
            let mut last = sim.failed_count();
            for _ in 0..30 {
                sim.step(&mut rng);
                ok &= sim.failed_count() >= last;
                last = sim.failed_count();
            }
            ok
        }
        Err(_) => false,
    };
    results.push(TestResult {
        name: "propagation_monotonic".into(),
        passed: monotonic,
        detail: "failed set never shrinks".into(),
    });

    let missing = propagate(graph, graph, "no-such-ups", &config, &mut StepRng::new(0, 0));
    results.push(TestResult {
        name: "propagation_unknown_start".into(),
        passed: matches!(missing, Err(SimError::NotFound(_))),
        detail: "unknown start id rejected".into(),
    });

    if verbose {
        if let Ok(outcome) = &a {
            for e in &outcome.timeline {
                println!(
                    "    t={:5.1} {:12} p={:.3} from {}",
                    e.time,
                    e.equipment_id,
                    e.probability,
                    e.caused_by.as_deref().unwrap_or("-")
                );
            }
        }
    }

    results
}

// ── 3. Impact & Resilience ──────────────────────────────────────────────

fn validate_analysis(graph: &FacilityGraph, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Impact & Resilience ---");
    let mut results = Vec::new();

    let mut config = BuildSimConfig::default();
    config.simulation.duration = 20.0;
    match simulate_failure(graph, graph, "ups-1", &config, &mut StdRng::seed_from_u64(seed)) {
        Ok(report) => {
            let counted: usize = report.impact_analysis.by_severity.values().sum();
            results.push(TestResult {
                name: "impact_counts_match".into(),
                passed: counted == report.total_affected,
                detail: format!(
                    "{} affected, {:.1} h downtime, cost {:.0}",
                    report.total_affected,
                    report.impact_analysis.estimated_downtime_hours,
                    report.impact_analysis.estimated_cost
                ),
            });
            let paths_ok = report
                .impact_analysis
                .critical_paths
                .iter()
                .all(|p| p.length > 2 && p.path.first().map(String::as_str) == Some("ups-1"));
            results.push(TestResult {
                name: "impact_critical_paths".into(),
                passed: paths_ok,
                detail: format!("{} critical paths", report.impact_analysis.critical_paths.len()),
            });
        }
        Err(e) => results.push(TestResult {
            name: "impact_counts_match".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    let resilience = analyze_resilience(graph, graph);
    let in_range = (0.0..=1.0).contains(&resilience.overall_score);
    results.push(TestResult {
        name: "resilience_score_range".into(),
        passed: in_range && resilience.redundancy_map.len() == graph.equipment_count(),
        detail: format!(
            "score {:.2}, {} single points of failure",
            resilience.overall_score,
            resilience.vulnerabilities.len()
        ),
    });
    results.push(TestResult {
        name: "resilience_dual_fed_mdf".into(),
        passed: resilience.redundancy_map.get("mdf-1") == Some(&2)
            && resilience
                .vulnerabilities
                .iter()
                .all(|v| v.equipment_id != "mdf-1"),
        detail: "mdf-1 fed from both panels".into(),
    });

    if verbose {
        for r in &resilience.recommendations {
            println!("    recommendation: {}", r);
        }
    }

    results
}

fn branch_circuit(ampacity: f64) -> ElectricalModel {
    let mut model = ElectricalModel::new(120.0);
    model.add_component(ElectricalComponent::load((50.0, 10.0), 10.0));
    model.add_conductor(Conductor::new((5.0, 10.0), (50.0, 10.0), 14, 30.0).with_ampacity(ampacity));
    model
}

// ── 4. Visualization ────────────────────────────────────────────────────

fn validate_visualization(graph: &FacilityGraph, opts: &Options) -> Vec<TestResult> {
    println!("--- Visualization ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let config = BuildSimConfig::default();

    match simulate_failure(graph, graph, "panel-1b", &config, &mut rng) {
        Ok(report) => {
            let text = &report.visualization_text;
            results.push(TestResult {
                name: "visual_report_panel".into(),
                passed: text.contains("Cascade from panel-1b") && text.contains("panel-1b (initial)"),
                detail: format!("{} lines rendered", text.lines().count()),
            });
            if opts.verbose {
                println!("{}", text);
            }
            if opts.json {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("report serialization failed: {}", e),
                }
            }
        }
        Err(e) => results.push(TestResult {
            name: "visual_report_panel".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    let engine = &config.engine;
    let vents = [Vent {
        from: (5.0, 1.0),
        to: (55.0, 1.0),
        rate: 0.5,
    }];
    let drafts = [Draft {
        center: (30.0, 10.0),
        radius: 15.0,
        force: (0.5, 0.5),
    }];
    let rendered = [
        scenes::airflow(engine, &vents, &drafts, &mut rng),
        scenes::water_leak(engine, (20.0, 2.0), 4, &mut rng),
        scenes::heat_map(
            engine,
            &[
                HeatSource {
                    position: (15.0, 17.0),
                    watts: 1500.0,
                },
                HeatSource {
                    position: (45.0, 17.0),
                    watts: 400.0,
                },
            ],
            &mut rng,
        ),
        scenes::occupancy(engine, &[(10.0, 5.0), (12.0, 6.0), (40.0, 12.0)], &mut rng),
        scenes::circuit(engine, &mut branch_circuit(10.0), &mut rng),
    ];
    for scene in &rendered {
        let panel = scene.render();
        results.push(TestResult {
            name: format!("visual_scene_{}", scene.title.to_lowercase().replace(' ', "_")),
            passed: panel.contains(&scene.title) && panel.contains("Legend:"),
            detail: format!("{} particles", scene.engine.particle_count()),
        });
        if opts.verbose {
            println!("{}", panel);
        }
    }

    results
}
