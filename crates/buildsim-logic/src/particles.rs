//! Time-stepped particle engine and density rasterizer.
//!
//! One engine lives for one visualization run: callers spawn particles,
//! advance them with [`ParticleEngine::update`] and rasterize with
//! [`ParticleEngine::render`]. Coordinates are continuous world units on a
//! `width × height` plane with y growing downward, so positive gravity pulls
//! particles toward the bottom row.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::glyphs;

/// Physical phenomenon a particle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticleType {
    Air,
    Water,
    Electric,
    Heat,
    Smoke,
    People,
}

/// Spawn-time behaviour shared by every particle of one type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleProfile {
    /// Multiplier on engine gravity (negative rises).
    pub gravity_scale: f32,
    /// Maximum initial horizontal speed.
    pub spread: f32,
    /// Initial vertical speed.
    pub initial_vy: f32,
    /// Lifetime in time units.
    pub lifetime: f32,
    pub glyph: char,
    pub label: &'static str,
}

impl ParticleType {
    pub const ALL: [ParticleType; 6] = [
        ParticleType::Air,
        ParticleType::Water,
        ParticleType::Electric,
        ParticleType::Heat,
        ParticleType::Smoke,
        ParticleType::People,
    ];

    pub fn profile(&self) -> ParticleProfile {
        match self {
            ParticleType::Air => ParticleProfile {
                gravity_scale: 0.0,
                spread: 2.0,
                initial_vy: 0.0,
                lifetime: 3.0,
                glyph: '~',
                label: "Air",
            },
            ParticleType::Water => ParticleProfile {
                gravity_scale: 1.0,
                spread: 0.5,
                initial_vy: 0.5,
                lifetime: 4.0,
                glyph: '≈',
                label: "Water",
            },
            ParticleType::Electric => ParticleProfile {
                gravity_scale: 0.0,
                spread: 0.3,
                initial_vy: 0.0,
                lifetime: 0.8,
                glyph: '*',
                label: "Electric",
            },
            ParticleType::Heat => ParticleProfile {
                gravity_scale: -0.3,
                spread: 1.0,
                initial_vy: -1.0,
                lifetime: 2.0,
                glyph: '^',
                label: "Heat",
            },
            ParticleType::Smoke => ParticleProfile {
                gravity_scale: -0.1,
                spread: 1.5,
                initial_vy: -0.5,
                lifetime: 5.0,
                glyph: '§',
                label: "Smoke",
            },
            ParticleType::People => ParticleProfile {
                gravity_scale: 0.0,
                spread: 0.2,
                initial_vy: 0.0,
                lifetime: 10.0,
                glyph: '@',
                label: "People",
            },
        }
    }
}

/// A single live particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Remaining life fraction in [0, 1].
    pub life: f32,
    /// Lifetime in time units; `life` falls by `dt / max_life` per update.
    pub max_life: f32,
    pub kind: ParticleType,
    pub glyph: char,
    pub gravity_scale: f32,
}

impl Particle {
    /// Build a particle at `(x, y)` with `jitter` positional noise and the
    /// type's profile velocity.
    pub fn spawn<R: Rng + ?Sized>(x: f32, y: f32, kind: ParticleType, jitter: f32, rng: &mut R) -> Self {
        let profile = kind.profile();
        Self {
            x: x + symmetric(rng) * jitter,
            y: y + symmetric(rng) * jitter,
            vx: symmetric(rng) * profile.spread,
            vy: profile.initial_vy + symmetric(rng) * profile.spread * 0.25,
            life: 1.0,
            max_life: profile.lifetime,
            kind,
            glyph: profile.glyph,
            gravity_scale: profile.gravity_scale,
        }
    }
}

/// Uniform sample in [-1, 1).
fn symmetric<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen::<f32>() * 2.0 - 1.0
}

/// Clip `from → to` to the `[0, w] × [0, h]` rectangle (Liang-Barsky).
fn clip_to_plane(
    from: (f32, f32),
    to: (f32, f32),
    w: f32,
    h: f32,
) -> Option<((f32, f32), (f32, f32))> {
    if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, from.0), (dx, w - from.0), (-dy, from.1), (dy, h - from.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (from.0 + dx * t0, from.1 + dy * t0),
        (from.0 + dx * t1, from.1 + dy * t1),
    ))
}

/// Rasterized particle density.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityGrid {
    pub width: usize,
    pub height: usize,
    /// Row-major glyphs.
    pub cells: Vec<char>,
    /// Row-major particle counts.
    pub density: Vec<u32>,
}

impl DensityGrid {
    /// Glyph at `(x, y)`, or `None` outside the grid.
    pub fn glyph_at(&self, x: usize, y: usize) -> Option<char> {
        self.index(x, y).and_then(|i| self.cells.get(i)).copied()
    }

    /// Particle count at `(x, y)`, or `None` outside the grid.
    pub fn density_at(&self, x: usize, y: usize) -> Option<u32> {
        self.index(x, y).and_then(|i| self.density.get(i)).copied()
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Grid rows as strings, top to bottom.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().collect())
            .collect()
    }
}

/// Particle engine for one run.
#[derive(Debug, Clone)]
pub struct ParticleEngine {
    config: EngineConfig,
    particles: Vec<Particle>,
}

impl ParticleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            particles: Vec::with_capacity(config.max_particles.min(4096)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.config.max_particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Live particles per type.
    pub fn count_by_type(&self) -> BTreeMap<ParticleType, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.particles {
            *counts.entry(p.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Insert a prepared particle. Returns `false` when at capacity.
    pub fn push(&mut self, particle: Particle) -> bool {
        if self.is_full() {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// Spawn `count` particles of `kind` around `(x, y)`.
    ///
    /// Returns how many were created; the rest are dropped once capacity is
    /// reached.
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        x: f32,
        y: f32,
        kind: ParticleType,
        count: usize,
        rng: &mut R,
    ) -> usize {
        let room = self.config.max_particles.saturating_sub(self.particles.len());
        let n = count.min(room);
        for _ in 0..n {
            let p = Particle::spawn(x, y, kind, self.config.jitter, rng);
            self.particles.push(p);
        }
        n
    }

    /// Advance every particle by `dt` and drop dead or escaped ones.
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        let EngineConfig {
            gravity,
            wind,
            friction,
            scale_factor,
            width,
            height,
            ..
        } = self.config;

        for p in &mut self.particles {
            p.vy += gravity * p.gravity_scale * dt;
            p.vx += wind * dt;
            p.vx *= friction;
            p.vy *= friction;
            p.x += p.vx * dt * scale_factor;
            p.y += p.vy * dt * scale_factor;
            p.life -= dt / p.max_life;
        }

        let (w, h) = (width as f32, height as f32);
        self.particles
            .retain(|p| p.life > 0.0 && p.x >= 0.0 && p.x < w && p.y >= 0.0 && p.y < h);
    }

    /// Rasterize live particles onto the grid.
    pub fn render(&self) -> DensityGrid {
        let (width, height) = (self.config.width, self.config.height);
        let mut density = vec![0u32; width * height];
        let mut first_glyph = vec![glyphs::EMPTY; width * height];

        for p in &self.particles {
            if let Some(idx) = self.cell_index(p.x, p.y) {
                if density[idx] == 0 {
                    first_glyph[idx] = p.glyph;
                }
                density[idx] += 1;
            }
        }

        let cells = density
            .iter()
            .zip(&first_glyph)
            .map(|(&count, &glyph)| match count {
                0 => glyphs::EMPTY,
                1 => glyph,
                n => glyphs::density_glyph(n).unwrap_or(glyph),
            })
            .collect();

        DensityGrid {
            width,
            height,
            cells,
            density,
        }
    }

    /// Spawn along the segment `from → to`, one attempt per unit of length,
    /// each succeeding with probability `rate`.
    ///
    /// Only the part of the segment inside the plane is walked, and the walk
    /// stops once the engine is full. Non-finite endpoints spawn nothing.
    pub fn emit_from_line<R: Rng + ?Sized>(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        kind: ParticleType,
        rate: f32,
        rng: &mut R,
    ) -> usize {
        let (w, h) = (self.config.width as f32, self.config.height as f32);
        let Some((from, to)) = clip_to_plane(from, to, w, h) else {
            return 0;
        };
        let rate = rate.clamp(0.0, 1.0);
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = (dx.hypot(dy).ceil() as usize).max(1);
        let mut spawned = 0;
        for i in 0..=steps {
            if self.is_full() {
                break;
            }
            let t = i as f32 / steps as f32;
            if rng.gen::<f32>() < rate {
                spawned += self.spawn(from.0 + dx * t, from.1 + dy * t, kind, 1, rng);
            }
        }
        spawned
    }

    /// Push particles within `radius` of `center` by `force`, scaled by
    /// `1 - distance / radius`.
    pub fn add_force(&mut self, center: (f32, f32), radius: f32, force: (f32, f32)) {
        if !(radius > 0.0) {
            return;
        }
        for p in &mut self.particles {
            let d = (p.x - center.0).hypot(p.y - center.1);
            if d < radius {
                let weight = 1.0 - d / radius;
                p.vx += force.0 * weight;
                p.vy += force.1 * weight;
            }
        }
    }

    fn cell_index(&self, x: f32, y: f32) -> Option<usize> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (cx, cy) = (x as usize, y as usize);
        if cx >= self.config.width || cy >= self.config.height {
            return None;
        }
        Some(cy * self.config.width + cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn still_config() -> EngineConfig {
        EngineConfig {
            width: 10,
            height: 10,
            gravity: 0.0,
            friction: 1.0,
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn particle_at(x: f32, y: f32, kind: ParticleType) -> Particle {
        let profile = kind.profile();
        Particle {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            life: 1.0,
            max_life: profile.lifetime,
            kind,
            glyph: profile.glyph,
            gravity_scale: profile.gravity_scale,
        }
    }

    #[test]
    fn test_spawn_respects_capacity() {
        let mut engine = ParticleEngine::new(EngineConfig {
            max_particles: 5,
            ..still_config()
        });
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(engine.spawn(5.0, 5.0, ParticleType::Air, 3, &mut rng), 3);
        assert_eq!(engine.spawn(5.0, 5.0, ParticleType::Air, 3, &mut rng), 2);
        assert_eq!(engine.spawn(5.0, 5.0, ParticleType::Air, 3, &mut rng), 0);
        assert_eq!(engine.particle_count(), 5);
        assert!(!engine.push(particle_at(1.0, 1.0, ParticleType::Heat)));
    }

    #[test]
    fn test_spawn_uses_type_profile() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StdRng::seed_from_u64(2);
        engine.spawn(5.0, 5.0, ParticleType::Water, 1, &mut rng);
        let p = &engine.particles()[0];
        assert_eq!(p.glyph, '≈');
        assert_eq!(p.max_life, ParticleType::Water.profile().lifetime);
        assert_eq!(p.gravity_scale, 1.0);
        assert_eq!(p.life, 1.0);
    }

    #[test]
    fn test_life_strictly_decreases() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StdRng::seed_from_u64(3);
        for kind in ParticleType::ALL {
            engine.spawn(5.0, 5.0, kind, 4, &mut rng);
        }
        let before: Vec<f32> = engine.particles().iter().map(|p| p.life).collect();
        engine.update(0.1);
        assert_eq!(engine.particle_count(), before.len());
        for (p, b) in engine.particles().iter().zip(before) {
            assert!(p.life < b);
        }
    }

    #[test]
    fn test_dead_particles_removed() {
        let mut engine = ParticleEngine::new(still_config());
        engine.push(particle_at(5.0, 5.0, ParticleType::Electric));
        engine.push(particle_at(5.0, 5.0, ParticleType::People));
        // Electric lives 0.8 time units, People 10.
        engine.update(1.0);
        assert_eq!(engine.particle_count(), 1);
        assert!(engine.particles().iter().all(|p| p.life > 0.0));
        assert_eq!(engine.particles()[0].kind, ParticleType::People);
    }

    #[test]
    fn test_out_of_bounds_removed() {
        let mut engine = ParticleEngine::new(still_config());
        let mut p = particle_at(9.5, 5.0, ParticleType::People);
        p.vx = 2.0;
        engine.push(p);
        engine.update(1.0);
        assert_eq!(engine.particle_count(), 0);
    }

    #[test]
    fn test_non_positive_dt_is_noop() {
        let mut engine = ParticleEngine::new(still_config());
        engine.push(particle_at(5.0, 5.0, ParticleType::Air));
        engine.update(0.0);
        engine.update(-1.0);
        engine.update(f32::NAN);
        assert_eq!(engine.particles()[0].life, 1.0);
    }

    #[test]
    fn test_gravity_and_wind() {
        let mut engine = ParticleEngine::new(EngineConfig {
            gravity: 10.0,
            wind: 2.0,
            ..still_config()
        });
        engine.push(particle_at(5.0, 2.0, ParticleType::Water));
        engine.push(particle_at(5.0, 8.0, ParticleType::Heat));
        engine.update(0.1);
        let water = &engine.particles()[0];
        let heat = &engine.particles()[1];
        assert!((water.vy - 1.0).abs() < 1e-5);
        assert!((water.vx - 0.2).abs() < 1e-5);
        assert!(water.y > 2.0);
        assert!(heat.vy < 0.0, "heat should rise");
    }

    #[test]
    fn test_friction_damps_velocity() {
        let mut engine = ParticleEngine::new(EngineConfig {
            friction: 0.5,
            ..still_config()
        });
        let mut p = particle_at(5.0, 5.0, ParticleType::People);
        p.vx = 1.0;
        engine.push(p);
        engine.update(0.1);
        assert!((engine.particles()[0].vx - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_density_glyph_mapping() {
        let mut engine = ParticleEngine::new(still_config());
        let placements = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 7), (5, 8), (6, 12)];
        for (x, n) in placements {
            for _ in 0..n {
                engine.push(particle_at(x as f32 + 0.5, 0.5, ParticleType::Air));
            }
        }
        let grid = engine.render();
        assert_eq!(grid.glyph_at(0, 0), Some('~'));
        assert_eq!(grid.glyph_at(1, 0), Some(glyphs::LIGHT_SHADE));
        assert_eq!(grid.glyph_at(2, 0), Some(glyphs::LIGHT_SHADE));
        assert_eq!(grid.glyph_at(3, 0), Some(glyphs::MEDIUM_SHADE));
        assert_eq!(grid.glyph_at(4, 0), Some(glyphs::MEDIUM_SHADE));
        assert_eq!(grid.glyph_at(5, 0), Some(glyphs::SOLID_BLOCK));
        assert_eq!(grid.glyph_at(6, 0), Some(glyphs::SOLID_BLOCK));
        assert_eq!(grid.glyph_at(7, 0), Some(glyphs::EMPTY));
        assert_eq!(grid.density_at(6, 0), Some(12));
        assert_eq!(grid.glyph_at(grid.width, 0), None);
        assert_eq!(grid.density_at(0, grid.height), None);
    }

    #[test]
    fn test_single_particle_keeps_own_glyph() {
        let mut engine = ParticleEngine::new(still_config());
        let mut p = particle_at(2.5, 2.5, ParticleType::Electric);
        p.glyph = glyphs::VOLTAGE_HIGH;
        engine.push(p);
        assert_eq!(engine.render().glyph_at(2, 2), Some(glyphs::VOLTAGE_HIGH));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut engine = ParticleEngine::new(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(4);
        engine.spawn(30.0, 10.0, ParticleType::Smoke, 50, &mut rng);
        engine.update(0.1);
        assert_eq!(engine.render(), engine.render());
    }

    #[test]
    fn test_emit_from_line_with_certain_rate() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StepRng::new(0, 0);
        let n = engine.emit_from_line((0.0, 5.0), (4.0, 5.0), ParticleType::Air, 1.0, &mut rng);
        assert_eq!(n, 5);
        assert_eq!(engine.particle_count(), 5);
    }

    #[test]
    fn test_emit_from_line_with_zero_rate() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StdRng::seed_from_u64(5);
        let n = engine.emit_from_line((0.0, 5.0), (9.0, 5.0), ParticleType::Air, 0.0, &mut rng);
        assert_eq!(n, 0);
    }

    /// Counts every draw so tests can see how much work a call did.
    struct CountingRng {
        inner: StdRng,
        draws: usize,
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.draws += 1;
            self.inner.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.draws += 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    #[test]
    fn test_emit_from_long_line_stops_when_full() {
        let mut engine = ParticleEngine::new(EngineConfig {
            max_particles: 5,
            ..EngineConfig::default()
        });
        let mut rng = CountingRng {
            inner: StdRng::seed_from_u64(7),
            draws: 0,
        };
        let n = engine.emit_from_line((0.0, 5.0), (2e7, 5.0), ParticleType::Air, 1.0, &mut rng);
        assert_eq!(n, 5);
        assert!(engine.is_full());
        assert!(rng.draws < 1000, "{} draws", rng.draws);
    }

    #[test]
    fn test_emit_from_line_clips_to_plane() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StepRng::new(0, 0);
        let n = engine.emit_from_line((-6.0, 5.0), (26.0, 5.0), ParticleType::Air, 1.0, &mut rng);
        assert_eq!(n, 11);
        assert!(engine.particles().iter().all(|p| p.x >= 0.0 && p.x <= 10.0));

        let outside = engine.emit_from_line((-5.0, -5.0), (-1.0, -1.0), ParticleType::Air, 1.0, &mut rng);
        assert_eq!(outside, 0);
        let unbounded = engine.emit_from_line((0.0, 5.0), (f32::INFINITY, 5.0), ParticleType::Air, 1.0, &mut rng);
        assert_eq!(unbounded, 0);
    }

    #[test]
    fn test_add_force_falls_off_with_distance() {
        let mut engine = ParticleEngine::new(still_config());
        engine.push(particle_at(5.0, 5.0, ParticleType::Air));
        engine.push(particle_at(6.0, 5.0, ParticleType::Air));
        engine.push(particle_at(9.0, 9.0, ParticleType::Air));
        engine.add_force((5.0, 5.0), 2.0, (1.0, 0.0));
        let vx: Vec<f32> = engine.particles().iter().map(|p| p.vx).collect();
        assert!((vx[0] - 1.0).abs() < 1e-6);
        assert!((vx[1] - 0.5).abs() < 1e-6);
        assert_eq!(vx[2], 0.0);
    }

    #[test]
    fn test_count_by_type() {
        let mut engine = ParticleEngine::new(still_config());
        let mut rng = StdRng::seed_from_u64(6);
        engine.spawn(5.0, 5.0, ParticleType::Heat, 3, &mut rng);
        engine.spawn(5.0, 5.0, ParticleType::People, 2, &mut rng);
        let counts = engine.count_by_type();
        assert_eq!(counts[&ParticleType::Heat], 3);
        assert_eq!(counts[&ParticleType::People], 2);
        assert!(!counts.contains_key(&ParticleType::Water));
    }
}
