//! Takeoff formation slots.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DroneId, GeoPoint, LocalPosition};
use crate::rules::TakeoffConfig;
use crate::spatial::CoordinateSystem;

/// Number of grid columns in the takeoff formation.
pub const FORMATION_COLUMNS: usize = 2;

/// Ground position assigned to one drone for takeoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormationSlot {
    pub drone_id: DroneId,
    pub row: usize,
    pub column: usize,
    /// Ground position in the local frame (z = 0)
    pub position: LocalPosition,
}

impl FormationSlot {
    pub fn geodetic(&self, frame: &CoordinateSystem) -> Result<GeoPoint> {
        frame.to_geodetic(self.position)
    }
}

/// Assigns grid slots east of a shared base coordinate.
#[derive(Debug, Clone, Copy)]
pub struct FormationPlanner {
    spacing: f64,
    east_offset: f64,
    base: LocalPosition,
}

impl FormationPlanner {
    /// Planner whose base is the local frame origin.
    pub fn new(config: &TakeoffConfig) -> Self {
        Self {
            spacing: config.formation_spacing,
            east_offset: config.east_offset,
            base: LocalPosition::default(),
        }
    }

    pub fn with_base(mut self, base: LocalPosition) -> Self {
        self.base = base.with_z(0.0);
        self
    }

    /// One slot per drone, filled row by row in ascending id order.
    ///
    /// Slot `i` sits at column `i % 2`, row `i / 2`; columns step east and rows
    /// step north by the formation spacing, so slots never coincide.
    pub fn assign(&self, drone_ids: &[DroneId]) -> Vec<FormationSlot> {
        let mut ids = drone_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        ids.into_iter()
            .enumerate()
            .map(|(index, drone_id)| {
                let row = index / FORMATION_COLUMNS;
                let column = index % FORMATION_COLUMNS;
                FormationSlot {
                    drone_id,
                    row,
                    column,
                    position: LocalPosition {
                        x: self.base.x + self.east_offset + column as f64 * self.spacing,
                        y: self.base.y + row as f64 * self.spacing,
                        z: 0.0,
                    },
                }
            })
            .collect()
    }
}
