//! Text panel rendering.
//!
//! ```text
//! ═══ Cascade from ups-1 ═══
//! ┌──────────┐
//! │  ~~░ ^   │
//! └──────────┘
//! Legend: ~ Air  ≈ Water  * Electric  ^ Heat  § Smoke  @ People  ░ 2-3  ▒ 4-7  █ 8+
//! Particles: 5
//! Timeline:
//!   t=0  ups-1 (initial)
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::constants::glyphs;
use crate::particles::{ParticleEngine, ParticleType};
use crate::propagation::{FailureEvent, FailureKind};

const HEADER_RULE: &str = "═══";

/// The fixed legend line.
pub fn legend() -> String {
    let mut line = String::from("Legend:");
    for kind in ParticleType::ALL {
        let profile = kind.profile();
        let _ = write!(line, " {} {} ", profile.glyph, profile.label);
    }
    let _ = write!(
        line,
        " {} 2-3  {} 4-7  {} 8+",
        glyphs::LIGHT_SHADE,
        glyphs::MEDIUM_SHADE,
        glyphs::SOLID_BLOCK
    );
    line
}

/// Group events into integer time buckets (`floor(t)`), one line each.
pub fn format_timeline(events: &[FailureEvent]) -> Vec<String> {
    let mut buckets: BTreeMap<i64, Vec<&FailureEvent>> = BTreeMap::new();
    for e in events {
        buckets.entry(e.time.floor() as i64).or_default().push(e);
    }
    buckets
        .into_iter()
        .map(|(t, group)| {
            let entries: Vec<String> = group
                .iter()
                .map(|e| match (e.kind, &e.caused_by) {
                    (FailureKind::Initial, _) => format!("{} (initial)", e.equipment_id),
                    (FailureKind::Cascading, Some(cause)) => format!(
                        "{} <- {} ({}, p={:.2})",
                        e.equipment_id,
                        cause,
                        e.connection.map(|c| c.as_str()).unwrap_or("other"),
                        e.probability
                    ),
                    (FailureKind::Cascading, None) => e.equipment_id.clone(),
                })
                .collect();
            format!("  t={:<3} {}", t, entries.join(", "))
        })
        .collect()
}

/// Render the engine grid as a bordered, titled panel.
///
/// `timeline` adds the failure timeline section; `notes` are appended
/// verbatim at the bottom.
pub fn render_panel(
    title: &str,
    engine: &ParticleEngine,
    timeline: Option<&[FailureEvent]>,
    notes: &[String],
) -> String {
    let grid = engine.render();
    let horizontal = "─".repeat(grid.width);
    let mut out = String::new();

    let _ = writeln!(out, "{HEADER_RULE} {title} {HEADER_RULE}");
    let _ = writeln!(out, "┌{horizontal}┐");
    for row in grid.rows() {
        let _ = writeln!(out, "│{row}│");
    }
    let _ = writeln!(out, "└{horizontal}┘");
    let _ = writeln!(out, "{}", legend());
    let _ = writeln!(out, "Particles: {}", engine.particle_count());

    if let Some(events) = timeline {
        let _ = writeln!(out, "Timeline:");
        if events.is_empty() {
            let _ = writeln!(out, "  (no failures)");
        }
        for line in format_timeline(events) {
            let _ = writeln!(out, "{line}");
        }
    }
    for note in notes {
        let _ = writeln!(out, "{note}");
    }
    out
}
