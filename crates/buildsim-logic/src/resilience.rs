//! Redundancy scoring: how many independent feeds each node has.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::graph::{ConnectionGraph, EquipmentCatalog};
use crate::impact::Severity;

/// Minimum upstream connections for a node to count as redundant.
pub const REDUNDANT_UPSTREAM: usize = 2;
/// Overall score below which redundant power is recommended.
pub const LOW_SCORE: f64 = 0.5;
/// Vulnerability count above which redundant connections are recommended.
pub const MANY_VULNERABILITIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub equipment_id: String,
    pub kind: String,
    pub severity: Severity,
    pub upstream_count: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceReport {
    /// Fraction of nodes with at least two upstream connections.
    pub overall_score: f64,
    pub vulnerabilities: Vec<Vulnerability>,
    pub recommendations: Vec<String>,
    /// Upstream connection count per equipment id.
    pub redundancy_map: BTreeMap<String, usize>,
}

/// Score every equipment id the catalog knows, plus any id reachable from
/// them through the graph that the catalog is missing.
pub fn analyze_resilience(
    graph: &dyn ConnectionGraph,
    catalog: &dyn EquipmentCatalog,
) -> ResilienceReport {
    analyze_nodes(graph, &node_universe(graph, catalog.equipment_ids()))
}

/// Catalog ids in catalog order, then graph-only neighbours in discovery
/// order.
fn node_universe(graph: &dyn ConnectionGraph, catalog_ids: Vec<String>) -> Vec<String> {
    let mut seen: BTreeSet<String> = catalog_ids.iter().cloned().collect();
    let mut ids = catalog_ids;
    let mut next = 0;
    while next < ids.len() {
        let id = ids[next].clone();
        next += 1;
        for neighbour in graph.upstream(&id).into_iter().chain(graph.downstream(&id)) {
            if seen.insert(neighbour.clone()) {
                ids.push(neighbour);
            }
        }
    }
    ids
}

/// Score an explicit set of node ids. An empty set scores 1.0.
pub fn analyze_nodes(graph: &dyn ConnectionGraph, node_ids: &[String]) -> ResilienceReport {
    let mut redundancy_map = BTreeMap::new();
    let mut vulnerabilities = Vec::new();
    let mut redundant = 0usize;

    for id in node_ids {
        let upstream = graph.upstream(id).len();
        redundancy_map.insert(id.clone(), upstream);
        if upstream >= REDUNDANT_UPSTREAM {
            redundant += 1;
        } else {
            vulnerabilities.push(Vulnerability {
                equipment_id: id.clone(),
                kind: "Single Point of Failure".to_string(),
                severity: Severity::High,
                upstream_count: upstream,
                description: format!(
                    "{} depends on {} upstream connection{}",
                    id,
                    upstream,
                    if upstream == 1 { "" } else { "s" },
                ),
            });
        }
    }

    let overall_score = if node_ids.is_empty() {
        1.0
    } else {
        redundant as f64 / node_ids.len() as f64
    };

    let mut recommendations = Vec::new();
    if overall_score < LOW_SCORE {
        recommendations.push(
            "Add redundant power sources (dual-fed panels, secondary UPS) to critical equipment"
                .to_string(),
        );
    }
    if vulnerabilities.len() > MANY_VULNERABILITIES {
        recommendations.push(format!(
            "Add redundant connections: {} single points of failure found",
            vulnerabilities.len()
        ));
    }

    info!(
        "Resilience: score {:.2}, {} vulnerabilities over {} nodes",
        overall_score,
        vulnerabilities.len(),
        node_ids.len()
    );

    ResilienceReport {
        overall_score,
        vulnerabilities,
        recommendations,
        redundancy_map,
    }
}
