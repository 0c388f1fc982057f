//! Impact analysis over a failure run: severity buckets, downtime and
//! cost estimates, and critical cascade paths.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::ImpactConfig;
use crate::constants::impact;
use crate::propagation::EquipmentNode;

/// Severity derived from how soon after the initial failure a node failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Bucket a failure time: `t ≤ 0` Critical, then High / Medium / Low by
    /// the configured thresholds.
    pub fn from_failure_time(time: f64, config: &ImpactConfig) -> Self {
        if time <= 0.0 {
            Severity::Critical
        } else if time < config.high_before {
            Severity::High
        } else if time < config.medium_before {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Ordered chain of cascading failures from its root to `path.last()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    pub path: Vec<String>,
    pub length: usize,
    /// Failure probability of the terminal node.
    pub risk_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub by_equipment_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub estimated_downtime_hours: f64,
    pub estimated_cost: f64,
    pub critical_paths: Vec<CriticalPath>,
}

/// Analyze failed nodes (any order; non-failed nodes are ignored).
pub fn analyze_impact(nodes: &[EquipmentNode], config: &ImpactConfig) -> ImpactAnalysis {
    let failed: Vec<&EquipmentNode> = nodes.iter().filter(|n| n.is_failed()).collect();
    let mut analysis = ImpactAnalysis::default();

    for node in &failed {
        let kind = node.equipment_type.to_ascii_lowercase();
        *analysis.by_equipment_type.entry(kind.clone()).or_insert(0) += 1;

        let time = node.failure_time.unwrap_or(0.0);
        *analysis
            .by_severity
            .entry(Severity::from_failure_time(time, config))
            .or_insert(0) += 1;

        analysis.estimated_downtime_hours += impact::downtime_hours(&kind);
        analysis.estimated_cost += impact::replacement_cost(&kind);
    }

    analysis.critical_paths = critical_paths(&failed);
    analysis
}

/// Walk every `cascade_from` chain back to its root and keep chains longer
/// than two nodes.
///
/// A visited set stops the walk if the links ever form a cycle, and a
/// missing parent simply ends the chain.
pub fn critical_paths(failed: &[&EquipmentNode]) -> Vec<CriticalPath> {
    let by_id: HashMap<&str, &EquipmentNode> = failed
        .iter()
        .map(|n| (n.equipment_id.as_str(), *n))
        .collect();

    let mut paths = Vec::new();
    for node in failed {
        if node.cascade_from.is_none() {
            continue;
        }
        let mut path = vec![node.equipment_id.as_str()];
        let mut visited: HashSet<&str> = HashSet::from([node.equipment_id.as_str()]);
        let mut current = *node;
        while let Some(parent_id) = current.cascade_from.as_deref() {
            if !visited.insert(parent_id) {
                break;
            }
            path.push(parent_id);
            match by_id.get(parent_id) {
                Some(&parent) => current = parent,
                None => break,
            }
        }

        if path.len() > 2 {
            path.reverse();
            paths.push(CriticalPath {
                length: path.len(),
                path: path.into_iter().map(str::to_string).collect(),
                risk_score: node.failure_probability,
            });
        }
    }
    paths
}
