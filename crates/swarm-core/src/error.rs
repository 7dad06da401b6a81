//! Error taxonomy for the swarm simulation core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DroneId;

/// A drone pair still in conflict when resolution gave up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictPair {
    pub priority: DroneId,
    pub waiting: DroneId,
    pub simulation_time: f64,
    pub distance: f64,
}

impl std::fmt::Display for ConflictPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} <-> {} at {:.1}s ({:.2}m)",
            self.priority, self.waiting, self.simulation_time, self.distance
        )
    }
}

/// Errors raised by the simulation core.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("coordinate out of range: lat {latitude}, lon {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },

    #[error("malformed waypoint at line {line}: {reason}")]
    MalformedWaypoint { line: usize, reason: String },

    #[error(
        "unresolvable conflict between {priority} and {waiting} at {simulation_time:.1}s \
         (no hold up to {max_hold:.1}s clears it)"
    )]
    UnresolvableConflict {
        priority: DroneId,
        waiting: DroneId,
        simulation_time: f64,
        max_hold: f64,
    },

    #[error("conflict resolution did not converge after {iterations} iterations ({} unresolved)", .unresolved.len())]
    ConflictResolutionDiverged {
        iterations: usize,
        unresolved: Vec<ConflictPair>,
    },

    #[error("failed to write {}: {source}", .path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwarmError>;
