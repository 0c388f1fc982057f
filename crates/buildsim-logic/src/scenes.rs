//! Preset phenomenon scenes built from particle engine primitives.
//!
//! Each builder runs a short fixed animation and returns a [`Scene`] whose
//! engine can be inspected or rendered as a panel.

use log::debug;
use rand::Rng;

use crate::config::EngineConfig;
use crate::electrical::ElectricalModel;
use crate::particles::{ParticleEngine, ParticleType};
use crate::render::render_panel;

/// Ticks each animated scene runs for.
pub const SCENE_TICKS: usize = 10;
pub const SCENE_DT: f32 = 0.1;
/// Heat output represented by one particle per tick.
pub const WATTS_PER_PARTICLE: f64 = 250.0;
pub const MAX_HEAT_PARTICLES_PER_TICK: usize = 20;

/// Supply vent emitting air along a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vent {
    pub from: (f32, f32),
    pub to: (f32, f32),
    /// Emission probability per unit of vent length per tick.
    pub rate: f32,
}

/// Localized push, such as a return grille or fan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draft {
    pub center: (f32, f32),
    pub radius: f32,
    pub force: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatSource {
    pub position: (f32, f32),
    pub watts: f64,
}

/// A finished visualization.
#[derive(Debug, Clone)]
pub struct Scene {
    pub title: String,
    pub engine: ParticleEngine,
    pub notes: Vec<String>,
}

impl Scene {
    fn new(title: &str, config: &EngineConfig) -> Self {
        Self {
            title: title.to_string(),
            engine: ParticleEngine::new(config.clone()),
            notes: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        render_panel(&self.title, &self.engine, None, &self.notes)
    }

    fn note_counts(&mut self) {
        for (kind, count) in self.engine.count_by_type() {
            self.notes.push(format!("{}: {}", kind.profile().label, count));
        }
    }
}

/// Air emitted from vents and pushed around by drafts.
pub fn airflow<R: Rng + ?Sized>(
    config: &EngineConfig,
    vents: &[Vent],
    drafts: &[Draft],
    rng: &mut R,
) -> Scene {
    let mut scene = Scene::new("Airflow", config);
    for _ in 0..SCENE_TICKS {
        for vent in vents {
            scene
                .engine
                .emit_from_line(vent.from, vent.to, ParticleType::Air, vent.rate, rng);
        }
        for draft in drafts {
            scene.engine.add_force(draft.center, draft.radius, draft.force);
        }
        scene.engine.update(SCENE_DT);
    }
    scene.note_counts();
    debug!("Airflow scene: {} vents, {} drafts", vents.len(), drafts.len());
    scene
}

/// Water released at `source`, `flow` particles per tick, falling under
/// gravity.
pub fn water_leak<R: Rng + ?Sized>(
    config: &EngineConfig,
    source: (f32, f32),
    flow: usize,
    rng: &mut R,
) -> Scene {
    let mut scene = Scene::new("Water Leak", config);
    for _ in 0..SCENE_TICKS {
        scene
            .engine
            .spawn(source.0, source.1, ParticleType::Water, flow, rng);
        scene.engine.update(SCENE_DT);
    }
    scene.notes.push(format!("Source: ({:.1}, {:.1})", source.0, source.1));
    scene.note_counts();
    scene
}

/// Heat rising from each source in proportion to its output. Sources with
/// no positive output emit nothing.
pub fn heat_map<R: Rng + ?Sized>(config: &EngineConfig, sources: &[HeatSource], rng: &mut R) -> Scene {
    let mut scene = Scene::new("Heat Map", config);
    for _ in 0..SCENE_TICKS {
        for src in sources {
            let count = ((src.watts.max(0.0) / WATTS_PER_PARTICLE).ceil() as usize)
                .min(MAX_HEAT_PARTICLES_PER_TICK);
            if count == 0 {
                continue;
            }
            scene
                .engine
                .spawn(src.position.0, src.position.1, ParticleType::Heat, count, rng);
        }
        scene.engine.update(SCENE_DT);
    }
    let total: f64 = sources.iter().map(|s| s.watts.max(0.0)).sum();
    scene.notes.push(format!("Sources: {}  Output: {:.0} W", sources.len(), total));
    scene.note_counts();
    scene
}

/// One person per position; positions off the plane are dropped.
pub fn occupancy<R: Rng + ?Sized>(config: &EngineConfig, people: &[(f32, f32)], rng: &mut R) -> Scene {
    let mut scene = Scene::new("Occupancy", config);
    for &(x, y) in people {
        scene.engine.spawn(x, y, ParticleType::People, 1, rng);
    }
    scene.engine.update(SCENE_DT);
    scene
        .notes
        .push(format!("Occupants: {}", scene.engine.particle_count()));
    scene
}

/// Current flow through `model` with any detected faults in the footer.
pub fn circuit<R: Rng + ?Sized>(config: &EngineConfig, model: &mut ElectricalModel, rng: &mut R) -> Scene {
    let mut scene = Scene::new("Circuit", config);
    model.simulate_current_flow(&mut scene.engine, rng);
    scene.notes.push(format!(
        "Source: {:.1} V  Current: {:.2} A  Loop: {:.3} ohm",
        model.source_voltage,
        model.total_current(),
        model.total_resistance()
    ));
    let faults = model.fault_descriptions();
    if faults.is_empty() {
        scene.notes.push("No faults detected".to_string());
    } else {
        scene.notes.push("Faults:".to_string());
        scene.notes.extend(faults.into_iter().map(|f| format!("  {f}")));
    }
    scene
}
