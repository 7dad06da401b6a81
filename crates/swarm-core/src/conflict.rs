//! Pairwise separation monitoring.
//!
//! The detector is a pure function of one snapshot and the safety thresholds.
//! It compares every unordered pair of drones exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DroneId, LocalPosition};
use crate::rules::SafetyConfig;

/// Severity of a proximity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Inside the warning band
    Warning,
    /// At or below the critical distance
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// All drones' positions at one simulated instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub simulation_time: f64,
    /// Wall-clock instant the snapshot stands for
    pub timestamp: DateTime<Utc>,
    pub positions: BTreeMap<DroneId, LocalPosition>,
    /// Plan index each drone is flying toward, when it has one
    #[serde(default)]
    pub waypoint_indices: BTreeMap<DroneId, usize>,
}

impl Snapshot {
    /// Empty snapshot at `simulation_time` seconds after `epoch`.
    pub fn at(epoch: DateTime<Utc>, simulation_time: f64) -> Self {
        let offset = TimeDelta::microseconds((simulation_time * 1_000_000.0).round() as i64);
        Self {
            simulation_time,
            timestamp: epoch + offset,
            positions: BTreeMap::new(),
            waypoint_indices: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, drone: DroneId, position: LocalPosition, waypoint_index: Option<usize>) {
        self.positions.insert(drone, position);
        match waypoint_index {
            Some(index) => {
                self.waypoint_indices.insert(drone, index);
            }
            None => {
                self.waypoint_indices.remove(&drone);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A detected proximity event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub timestamp: DateTime<Utc>,
    pub simulation_time: f64,
    pub drone1: DroneId,
    pub drone2: DroneId,
    pub distance: f64,
    pub severity: Severity,
    pub position1: LocalPosition,
    pub position2: LocalPosition,
    #[serde(default)]
    pub waypoint1_index: Option<usize>,
    #[serde(default)]
    pub waypoint2_index: Option<usize>,
}

/// Stateless pairwise separation checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionDetector;

impl CollisionDetector {
    /// Severity for a separation, or `None` when outside the warning band.
    pub fn classify(distance: f64, config: &SafetyConfig) -> Option<Severity> {
        if distance <= config.critical_distance {
            Some(Severity::Critical)
        } else if distance <= config.warning_distance {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    /// One event per unordered pair within the warning band, `drone1 < drone2`.
    pub fn check(snapshot: &Snapshot, config: &SafetyConfig) -> Vec<CollisionEvent> {
        let entries: Vec<(&DroneId, &LocalPosition)> = snapshot.positions.iter().collect();
        let mut events = Vec::new();

        for (i, (id1, pos1)) in entries.iter().enumerate() {
            for (id2, pos2) in &entries[i + 1..] {
                let distance = pos1.distance_to(pos2);
                let Some(severity) = Self::classify(distance, config) else {
                    continue;
                };
                events.push(CollisionEvent {
                    timestamp: snapshot.timestamp,
                    simulation_time: snapshot.simulation_time,
                    drone1: **id1,
                    drone2: **id2,
                    distance,
                    severity,
                    position1: **pos1,
                    position2: **pos2,
                    waypoint1_index: snapshot.waypoint_indices.get(*id1).copied(),
                    waypoint2_index: snapshot.waypoint_indices.get(*id2).copied(),
                });
            }
        }

        events
    }

    /// Events at or below `safety_distance`: the pairs that must be resolved.
    pub fn violations(snapshot: &Snapshot, config: &SafetyConfig) -> Vec<CollisionEvent> {
        Self::check(snapshot, config)
            .into_iter()
            .filter(|event| event.distance <= config.safety_distance)
            .collect()
    }
}
