//! Connection graph and equipment catalog seams.
//!
//! The simulator never owns the facility graph. It asks a [`ConnectionGraph`]
//! for neighbours and connection types, and an [`EquipmentCatalog`] for each
//! node's type and location. [`FacilityGraph`] is an in-memory implementation
//! of both, built from an edge list.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::constants::failure;

/// Kind of link between two pieces of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Power,
    Data,
    Control,
    Hvac,
    Plumbing,
    Other,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 6] = [
        ConnectionType::Power,
        ConnectionType::Data,
        ConnectionType::Control,
        ConnectionType::Hvac,
        ConnectionType::Plumbing,
        ConnectionType::Other,
    ];

    /// Parse a connection name; anything unrecognised is `Other`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "power" | "electrical" => ConnectionType::Power,
            "data" | "network" => ConnectionType::Data,
            "control" => ConnectionType::Control,
            "hvac" => ConnectionType::Hvac,
            "plumbing" => ConnectionType::Plumbing,
            _ => ConnectionType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Power => "power",
            ConnectionType::Data => "data",
            ConnectionType::Control => "control",
            ConnectionType::Hvac => "hvac",
            ConnectionType::Plumbing => "plumbing",
            ConnectionType::Other => "other",
        }
    }

    /// Built-in cascade base rate.
    pub fn base_rate(&self) -> f64 {
        match self {
            ConnectionType::Power => failure::POWER_RATE,
            ConnectionType::Control => failure::CONTROL_RATE,
            ConnectionType::Hvac => failure::HVAC_RATE,
            ConnectionType::Data => failure::DATA_RATE,
            ConnectionType::Plumbing => failure::PLUMBING_RATE,
            ConnectionType::Other => failure::OTHER_RATE,
        }
    }
}

/// Planar location in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn distance(&self, other: &Location) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Catalog record for one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    /// Free-form type name (`"ups"`, `"panel"`, ...).
    pub equipment_type: String,
    /// `None` when the catalog has no position for it.
    pub location: Option<Location>,
}

impl Equipment {
    pub fn new(id: impl Into<String>, equipment_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            equipment_type: equipment_type.into(),
            location: None,
        }
    }

    /// Builder-style location setter.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.location = Some(Location { x, y });
        self
    }
}

/// Directed connection graph between equipment ids.
pub trait ConnectionGraph {
    /// Equipment fed by `id`.
    fn downstream(&self, id: &str) -> Vec<String>;
    /// Equipment feeding `id`.
    fn upstream(&self, id: &str) -> Vec<String>;
    /// Type of the `from → to` link; `Other` when unknown.
    fn connection_type(&self, from: &str, to: &str) -> ConnectionType;
}

/// Equipment lookup by id.
pub trait EquipmentCatalog {
    fn equipment(&self, id: &str) -> Option<Equipment>;
    /// Every known id, in a stable order.
    fn equipment_ids(&self) -> Vec<String>;
}

/// In-memory facility graph with insertion-ordered adjacency.
#[derive(Debug, Clone, Default)]
pub struct FacilityGraph {
    equipment: BTreeMap<String, Equipment>,
    downstream: HashMap<String, Vec<String>>,
    upstream: HashMap<String, Vec<String>>,
    edges: HashMap<(String, String), ConnectionType>,
}

impl FacilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an equipment record.
    pub fn add_equipment(&mut self, equipment: Equipment) {
        self.equipment.insert(equipment.id.clone(), equipment);
    }

    /// Add a directed link. Re-adding an existing link only updates its type.
    pub fn connect(&mut self, from: &str, to: &str, connection: ConnectionType) {
        let key = (from.to_string(), to.to_string());
        if self.edges.insert(key, connection).is_some() {
            return;
        }
        self.downstream
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.upstream
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
    }

    /// Build a graph from equipment records and `(from, to, type)` edges.
    pub fn from_parts(
        equipment: impl IntoIterator<Item = Equipment>,
        edges: &[(&str, &str, ConnectionType)],
    ) -> Self {
        let mut graph = Self::new();
        for e in equipment {
            graph.add_equipment(e);
        }
        for (from, to, kind) in edges {
            graph.connect(from, to, *kind);
        }
        graph
    }

    pub fn equipment_count(&self) -> usize {
        self.equipment.len()
    }

    pub fn connection_count(&self) -> usize {
        self.edges.len()
    }
}

impl ConnectionGraph for FacilityGraph {
    fn downstream(&self, id: &str) -> Vec<String> {
        self.downstream.get(id).cloned().unwrap_or_default()
    }

    fn upstream(&self, id: &str) -> Vec<String> {
        self.upstream.get(id).cloned().unwrap_or_default()
    }

    fn connection_type(&self, from: &str, to: &str) -> ConnectionType {
        self.edges
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .unwrap_or(ConnectionType::Other)
    }
}

impl EquipmentCatalog for FacilityGraph {
    fn equipment(&self, id: &str) -> Option<Equipment> {
        self.equipment.get(id).cloned()
    }

    fn equipment_ids(&self) -> Vec<String> {
        self.equipment.keys().cloned().collect()
    }
}
