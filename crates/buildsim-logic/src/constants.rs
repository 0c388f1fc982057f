//! Simulation constants: failure rates, resilience, costs, glyphs.
//!
//! Equipment types are matched case-insensitively as plain strings because
//! they come from the caller's catalog. Unknown types always resolve to the
//! `DEFAULT_*` value of the relevant table instead of failing the run.

pub mod failure {
    /// Decay time constant for time since the source failed (time units).
    pub const TIME_DECAY: f64 = 10.0;
    /// Decay length for physical distance between equipment (meters).
    pub const DISTANCE_DECAY: f64 = 20.0;

    /// Cascade base rate per connection type.
    pub const POWER_RATE: f64 = 0.8;
    pub const CONTROL_RATE: f64 = 0.6;
    pub const HVAC_RATE: f64 = 0.4;
    pub const DATA_RATE: f64 = 0.3;
    pub const PLUMBING_RATE: f64 = 0.2;
    pub const OTHER_RATE: f64 = 0.1;

    /// Resilience for equipment types missing from [`resilience_factor`].
    pub const DEFAULT_RESILIENCE: f64 = 0.3;

    /// Robustness of an equipment type against induced failure, in [0, 1].
    pub fn resilience_factor(equipment_type: &str) -> f64 {
        match equipment_type.to_ascii_lowercase().as_str() {
            "ups" => 0.9,
            "mdf" => 0.8,
            "panel" => 0.7,
            "server" => 0.4,
            "switch" => 0.3,
            "access_point" => 0.2,
            "outlet" => 0.1,
            _ => DEFAULT_RESILIENCE,
        }
    }
}

pub mod impact {
    /// Downtime for equipment types missing from [`downtime_hours`].
    pub const DEFAULT_DOWNTIME_HOURS: f64 = 2.0;
    /// Replacement cost for equipment types missing from [`replacement_cost`].
    pub const DEFAULT_COST: f64 = 1000.0;

    /// Default severity thresholds (time units since the initial failure).
    pub const HIGH_BEFORE: f64 = 5.0;
    pub const MEDIUM_BEFORE: f64 = 10.0;

    /// Expected restoration time in hours.
    pub fn downtime_hours(equipment_type: &str) -> f64 {
        match equipment_type.to_ascii_lowercase().as_str() {
            "ups" => 4.0,
            "mdf" => 8.0,
            "panel" => 6.0,
            "server" => 4.0,
            "switch" => 2.0,
            "access_point" => 1.0,
            "outlet" => 0.5,
            _ => DEFAULT_DOWNTIME_HOURS,
        }
    }

    /// Repair or replacement cost in currency units.
    pub fn replacement_cost(equipment_type: &str) -> f64 {
        match equipment_type.to_ascii_lowercase().as_str() {
            "ups" => 5000.0,
            "mdf" => 15000.0,
            "panel" => 3000.0,
            "server" => 10000.0,
            "switch" => 2000.0,
            "access_point" => 500.0,
            "outlet" => 100.0,
            _ => DEFAULT_COST,
        }
    }
}

pub mod electrical {
    /// Resistance a faulted (shorted) component contributes, in ohms.
    pub const SHORT_CIRCUIT_OHMS: f64 = 0.001;
    /// Maximum aggregate voltage drop as a fraction of source voltage.
    pub const MAX_VOLTAGE_DROP_FRACTION: f64 = 0.03;
    /// Upper bound on the per-conductor spawn rate.
    pub const MAX_SPAWN_RATE: f64 = 5.0;
    /// Particles emitted per unit of spawn rate on each conductor.
    pub const PARTICLES_PER_RATE: f64 = 4.0;
    /// Upward drift per watt dissipated in a conductor.
    pub const HEAT_DRIFT_PER_WATT: f64 = 0.05;
    /// Aluminum resistivity relative to copper.
    pub const ALUMINUM_FACTOR: f64 = 1.64;
    /// Gauge used when a conductor's AWG is not in the table.
    pub const DEFAULT_GAUGE: u8 = 14;

    /// Copper resistance in ohms per meter by AWG.
    pub fn resistance_per_meter(gauge: u8) -> f64 {
        match gauge {
            10 => 0.003277,
            12 => 0.005211,
            14 => 0.008286,
            16 => 0.013170,
            18 => 0.020950,
            _ => resistance_per_meter(DEFAULT_GAUGE),
        }
    }

    /// Continuous ampacity in amps by AWG (60 °C copper).
    pub fn default_ampacity(gauge: u8) -> f64 {
        match gauge {
            10 => 30.0,
            12 => 20.0,
            14 => 15.0,
            16 => 10.0,
            18 => 7.0,
            _ => default_ampacity(DEFAULT_GAUGE),
        }
    }
}

pub mod glyphs {
    /// Cell holding 2–3 particles.
    pub const LIGHT_SHADE: char = '░';
    /// Cell holding 4–7 particles.
    pub const MEDIUM_SHADE: char = '▒';
    /// Cell holding 8 or more particles.
    pub const SOLID_BLOCK: char = '█';
    /// Empty cell.
    pub const EMPTY: char = ' ';

    /// Electric particle glyphs by local voltage band.
    pub const VOLTAGE_HIGH: char = '!';
    pub const VOLTAGE_MEDIUM: char = '*';
    pub const VOLTAGE_LOW: char = '+';
    pub const VOLTAGE_MINIMAL: char = '.';

    /// Select the electric glyph for a local voltage.
    pub fn voltage_glyph(volts: f64) -> char {
        if volts > 200.0 {
            VOLTAGE_HIGH
        } else if volts > 100.0 {
            VOLTAGE_MEDIUM
        } else if volts > 50.0 {
            VOLTAGE_LOW
        } else {
            VOLTAGE_MINIMAL
        }
    }

    /// Density shade for a cell count; `None` for 0 and 1.
    pub fn density_glyph(count: u32) -> Option<char> {
        match count {
            0 | 1 => None,
            2..=3 => Some(LIGHT_SHADE),
            4..=7 => Some(MEDIUM_SHADE),
            _ => Some(SOLID_BLOCK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resilience_table_in_unit_range() {
        for t in ["ups", "mdf", "panel", "server", "switch", "access_point", "outlet", "?"] {
            let r = failure::resilience_factor(t);
            assert!((0.0..=1.0).contains(&r), "{t} -> {r}");
        }
    }

    #[test]
    fn test_unknown_types_use_defaults() {
        assert_eq!(failure::resilience_factor("chiller"), failure::DEFAULT_RESILIENCE);
        assert_eq!(impact::downtime_hours("chiller"), impact::DEFAULT_DOWNTIME_HOURS);
        assert_eq!(impact::replacement_cost("chiller"), impact::DEFAULT_COST);
    }

    #[test]
    fn test_type_lookup_ignores_case() {
        assert_eq!(failure::resilience_factor("UPS"), 0.9);
        assert_eq!(impact::replacement_cost("Server"), 10000.0);
    }

    #[test]
    fn test_unknown_gauge_falls_back_to_14_awg() {
        assert_eq!(
            electrical::resistance_per_meter(8),
            electrical::resistance_per_meter(14)
        );
        assert_eq!(electrical::default_ampacity(4), 15.0);
    }

    #[test]
    fn test_voltage_bands() {
        assert_eq!(glyphs::voltage_glyph(240.0), glyphs::VOLTAGE_HIGH);
        assert_eq!(glyphs::voltage_glyph(120.0), glyphs::VOLTAGE_MEDIUM);
        assert_eq!(glyphs::voltage_glyph(60.0), glyphs::VOLTAGE_LOW);
        assert_eq!(glyphs::voltage_glyph(12.0), glyphs::VOLTAGE_MINIMAL);
    }

    #[test]
    fn test_density_shades() {
        assert_eq!(glyphs::density_glyph(1), None);
        assert_eq!(glyphs::density_glyph(2), Some(glyphs::LIGHT_SHADE));
        assert_eq!(glyphs::density_glyph(3), Some(glyphs::LIGHT_SHADE));
        assert_eq!(glyphs::density_glyph(4), Some(glyphs::MEDIUM_SHADE));
        assert_eq!(glyphs::density_glyph(7), Some(glyphs::MEDIUM_SHADE));
        assert_eq!(glyphs::density_glyph(8), Some(glyphs::SOLID_BLOCK));
        assert_eq!(glyphs::density_glyph(500), Some(glyphs::SOLID_BLOCK));
    }
}
