//! Series circuit model: Ohm's law, conductor resistance, voltage drop,
//! fault detection and breakers.
//!
//! The model treats every component and conductor as one series loop fed
//! by `source_voltage`. It also drives Electric particles for circuit
//! visualizations: spawn density follows current, glyphs follow the local
//! voltage band and particles drift upward in proportion to the heat each
//! conductor dissipates.

use std::fmt;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{electrical, glyphs};
use crate::particles::{Particle, ParticleEngine, ParticleType};

/// Conductor material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Material {
    #[default]
    Copper,
    Aluminum,
}

impl Material {
    /// Resistivity relative to copper.
    pub fn resistance_factor(&self) -> f64 {
        match self {
            Material::Copper => 1.0,
            Material::Aluminum => electrical::ALUMINUM_FACTOR,
        }
    }
}

/// A wire run between two points on the visualization plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conductor {
    pub from: (f32, f32),
    pub to: (f32, f32),
    /// American Wire Gauge.
    pub gauge: u8,
    pub length_m: f64,
    pub material: Material,
    /// Continuous current limit in amps.
    pub ampacity: f64,
}

impl Conductor {
    /// Copper conductor with the gauge's table ampacity.
    pub fn new(from: (f32, f32), to: (f32, f32), gauge: u8, length_m: f64) -> Self {
        Self {
            from,
            to,
            gauge,
            length_m,
            material: Material::Copper,
            ampacity: electrical::default_ampacity(gauge),
        }
    }

    /// Override the table ampacity. Non-positive or non-finite limits are
    /// ignored.
    pub fn with_ampacity(mut self, ampacity: f64) -> Self {
        if ampacity.is_finite() && ampacity > 0.0 {
            self.ampacity = ampacity;
        }
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn resistance_per_meter(&self) -> f64 {
        electrical::resistance_per_meter(self.gauge) * self.material.resistance_factor()
    }

    /// Total conductor resistance in ohms.
    pub fn resistance(&self) -> f64 {
        self.resistance_per_meter() * self.length_m
    }
}

/// Protective device state. Trips at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Tripped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComponentKind {
    Load,
    Switch,
    CircuitBreaker { rating: f64, state: BreakerState },
}

/// A lumped element in the series loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalComponent {
    pub position: (f32, f32),
    /// Nominal resistance in ohms.
    pub resistance: f64,
    pub kind: ComponentKind,
    /// Ground fault; the component then behaves as a short.
    pub faulted: bool,
}

impl ElectricalComponent {
    pub fn load(position: (f32, f32), resistance: f64) -> Self {
        Self {
            position,
            resistance,
            kind: ComponentKind::Load,
            faulted: false,
        }
    }

    pub fn is_tripped(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::CircuitBreaker {
                state: BreakerState::Tripped,
                ..
            }
        )
    }

    /// Resistance the component contributes to the loop right now.
    pub fn effective_resistance(&self) -> f64 {
        if self.is_tripped() {
            f64::INFINITY
        } else if self.faulted {
            electrical::SHORT_CIRCUIT_OHMS
        } else {
            self.resistance
        }
    }
}

/// A detected electrical problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElectricalFault {
    Overcurrent {
        conductor: usize,
        current: f64,
        ampacity: f64,
        overload_percent: f64,
    },
    ExcessiveVoltageDrop {
        drop_volts: f64,
        percent_of_source: f64,
    },
    GroundFault {
        component: usize,
        position: (f32, f32),
    },
}

impl fmt::Display for ElectricalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectricalFault::Overcurrent {
                conductor,
                current,
                ampacity,
                overload_percent,
            } => write!(
                f,
                "Overcurrent on conductor {}: {:.2} A exceeds {:.1} A ampacity ({:.1}% overload)",
                conductor, current, ampacity, overload_percent
            ),
            ElectricalFault::ExcessiveVoltageDrop {
                drop_volts,
                percent_of_source,
            } => write!(
                f,
                "Excessive voltage drop: {:.2} V ({:.1}% of source, limit {:.0}%)",
                drop_volts,
                percent_of_source,
                electrical::MAX_VOLTAGE_DROP_FRACTION * 100.0
            ),
            ElectricalFault::GroundFault {
                component,
                position,
            } => write!(
                f,
                "Ground fault at component {} ({:.1}, {:.1})",
                component, position.0, position.1
            ),
        }
    }
}

/// Series circuit fed by a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricalModel {
    pub source_voltage: f64,
    pub components: Vec<ElectricalComponent>,
    pub conductors: Vec<Conductor>,
    total_resistance: f64,
    total_current: f64,
}

impl ElectricalModel {
    pub fn new(source_voltage: f64) -> Self {
        Self {
            source_voltage,
            components: Vec::new(),
            conductors: Vec::new(),
            total_resistance: 0.0,
            total_current: 0.0,
        }
    }

    pub fn add_component(&mut self, component: ElectricalComponent) -> usize {
        self.components.push(component);
        self.components.len() - 1
    }

    pub fn add_conductor(&mut self, conductor: Conductor) -> usize {
        self.conductors.push(conductor);
        self.conductors.len() - 1
    }

    /// Mark a component as ground-faulted.
    pub fn set_fault(&mut self, component: usize, faulted: bool) {
        if let Some(c) = self.components.get_mut(component) {
            c.faulted = faulted;
        }
    }

    /// Last computed loop resistance.
    pub fn total_resistance(&self) -> f64 {
        self.total_resistance
    }

    /// Last computed loop current.
    pub fn total_current(&self) -> f64 {
        self.total_current
    }

    /// Loop resistance from the current component and conductor state.
    pub fn loop_resistance(&self) -> f64 {
        let components: f64 = self
            .components
            .iter()
            .map(ElectricalComponent::effective_resistance)
            .sum();
        let wiring: f64 = self.conductors.iter().map(Conductor::resistance).sum();
        components + wiring
    }

    /// Solve `I = V / R`, trip any overloaded breakers, and return the loop
    /// current. An open or empty loop carries no current.
    pub fn calculate_ohms_law(&mut self) -> f64 {
        self.solve();
        let current = self.total_current;
        let mut tripped = false;
        for (i, c) in self.components.iter_mut().enumerate() {
            if let ComponentKind::CircuitBreaker { rating, state } = &mut c.kind {
                if *state == BreakerState::Closed && current > *rating {
                    *state = BreakerState::Tripped;
                    tripped = true;
                    warn!(
                        "Breaker {} tripped: {:.2} A over {:.1} A rating",
                        i, current, rating
                    );
                }
            }
        }
        if tripped {
            self.solve();
        }
        self.total_current
    }

    fn solve(&mut self) {
        let r = self.loop_resistance();
        self.total_resistance = r;
        self.total_current = if r > 0.0 && r.is_finite() {
            self.source_voltage / r
        } else {
            0.0
        };
    }

    /// Voltage lost across one conductor at `current`.
    pub fn calculate_voltage_drop(conductor: &Conductor, current: f64) -> f64 {
        current * conductor.resistance_per_meter() * conductor.length_m
    }

    /// Voltage lost across all conductors at the last computed current.
    pub fn total_voltage_drop(&self) -> f64 {
        self.conductors
            .iter()
            .map(|c| Self::calculate_voltage_drop(c, self.total_current))
            .sum()
    }

    /// Power dissipated in the whole loop, in watts.
    pub fn power_dissipated(&self) -> f64 {
        if self.total_resistance.is_finite() {
            self.total_current.powi(2) * self.total_resistance
        } else {
            0.0
        }
    }

    /// Add a breaker rated at `rating` amps. It trips immediately if the
    /// loop already carries more than that. Returns the component index.
    pub fn add_circuit_breaker(&mut self, position: (f32, f32), rating: f64) -> usize {
        let idx = self.add_component(ElectricalComponent {
            position,
            resistance: 0.0,
            kind: ComponentKind::CircuitBreaker {
                rating,
                state: BreakerState::Closed,
            },
            faulted: false,
        });
        self.calculate_ohms_law();
        idx
    }

    /// Spawn Electric particles along every conductor. Returns how many
    /// particles were added to `engine`.
    pub fn simulate_current_flow<R: Rng + ?Sized>(
        &mut self,
        engine: &mut ParticleEngine,
        rng: &mut R,
    ) -> usize {
        let current = self.calculate_ohms_law();
        let rate = (current / 10.0).min(electrical::MAX_SPAWN_RATE);
        let per_conductor = (rate * electrical::PARTICLES_PER_RATE).round() as usize;
        let jitter = engine.config().jitter;

        let mut voltage = self.source_voltage;
        let mut spawned = 0;
        for conductor in &self.conductors {
            voltage -= Self::calculate_voltage_drop(conductor, current);
            let glyph = glyphs::voltage_glyph(voltage);
            let heat_watts = current.powi(2) * conductor.resistance();
            let drift = (heat_watts * electrical::HEAT_DRIFT_PER_WATT) as f32;

            for _ in 0..per_conductor {
                let t: f32 = rng.gen();
                let x = conductor.from.0 + (conductor.to.0 - conductor.from.0) * t;
                let y = conductor.from.1 + (conductor.to.1 - conductor.from.1) * t;
                let mut p = Particle::spawn(x, y, ParticleType::Electric, jitter, rng);
                p.glyph = glyph;
                p.vy -= drift;
                if !engine.push(p) {
                    return spawned;
                }
                spawned += 1;
            }
        }
        debug!(
            "Current flow: {:.2} A, {} particles over {} conductors",
            current,
            spawned,
            self.conductors.len()
        );
        spawned
    }

    /// Overcurrent, excessive voltage drop and ground faults. An empty list
    /// means the circuit is healthy.
    pub fn detect_faults(&mut self) -> Vec<ElectricalFault> {
        let current = self.calculate_ohms_law();
        let mut faults = Vec::new();

        for (i, c) in self.conductors.iter().enumerate() {
            // Unrated conductors have no limit to exceed.
            if c.ampacity > 0.0 && current > c.ampacity {
                faults.push(ElectricalFault::Overcurrent {
                    conductor: i,
                    current,
                    ampacity: c.ampacity,
                    overload_percent: (current - c.ampacity) / c.ampacity * 100.0,
                });
            }
        }

        let drop = self.total_voltage_drop();
        let limit = self.source_voltage * electrical::MAX_VOLTAGE_DROP_FRACTION;
        if drop > limit {
            faults.push(ElectricalFault::ExcessiveVoltageDrop {
                drop_volts: drop,
                percent_of_source: drop / self.source_voltage * 100.0,
            });
        }

        for (i, c) in self.components.iter().enumerate() {
            if c.faulted {
                faults.push(ElectricalFault::GroundFault {
                    component: i,
                    position: c.position,
                });
            }
        }

        faults
    }

    /// [`detect_faults`](Self::detect_faults) as display strings.
    pub fn fault_descriptions(&mut self) -> Vec<String> {
        self.detect_faults().iter().map(|f| f.to_string()).collect()
    }
}
