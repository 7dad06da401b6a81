//! Core data models for the swarm simulator.

use serde::{Deserialize, Serialize};

use crate::flight::FlightTimeline;
use crate::formation::FormationSlot;

/// Drone identifier. Lower ids take off with higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DroneId(pub u32);

impl std::fmt::Display for DroneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Drone_{}", self.0)
    }
}

/// Position in the local East-North-Up frame (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LocalPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &LocalPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear interpolation, `ratio` clamped to [0, 1].
    pub fn lerp(&self, other: &LocalPosition, ratio: f64) -> LocalPosition {
        let r = ratio.clamp(0.0, 1.0);
        LocalPosition {
            x: self.x + (other.x - self.x) * r,
            y: self.y + (other.y - self.y) * r,
            z: self.z + (other.z - self.z) * r,
        }
    }

    pub fn with_z(self, z: f64) -> LocalPosition {
        LocalPosition { z, ..self }
    }
}

/// Geodetic coordinate in decimal degrees and meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Mission item command, numbered as MAVLink `MAV_CMD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum CommandKind {
    Nav,
    Loiter,
    Rtl,
    Land,
    Takeoff,
    Other(u16),
}

impl CommandKind {
    pub const NAV_WAYPOINT: u16 = 16;
    pub const LOITER_TIME: u16 = 19;
    pub const RETURN_TO_LAUNCH: u16 = 20;
    pub const LAND: u16 = 21;
    pub const TAKEOFF: u16 = 22;

    pub fn code(self) -> u16 {
        match self {
            CommandKind::Nav => Self::NAV_WAYPOINT,
            CommandKind::Loiter => Self::LOITER_TIME,
            CommandKind::Rtl => Self::RETURN_TO_LAUNCH,
            CommandKind::Land => Self::LAND,
            CommandKind::Takeoff => Self::TAKEOFF,
            CommandKind::Other(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            Self::NAV_WAYPOINT => CommandKind::Nav,
            Self::LOITER_TIME => CommandKind::Loiter,
            Self::RETURN_TO_LAUNCH => CommandKind::Rtl,
            Self::LAND => CommandKind::Land,
            Self::TAKEOFF => CommandKind::Takeoff,
            other => CommandKind::Other(other),
        }
    }
}

impl From<u16> for CommandKind {
    fn from(code: u16) -> Self {
        CommandKind::from_code(code)
    }
}

impl From<CommandKind> for u16 {
    fn from(kind: CommandKind) -> Self {
        kind.code()
    }
}

/// A parsed mission item. Never mutated after parsing; plans are rebuilt instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub command: CommandKind,
    /// MAVLink param1..param4 (param1 is the hold time for LOITER)
    #[serde(default)]
    pub params: [f64; 4],
}

impl Waypoint {
    pub fn nav(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            command: CommandKind::Nav,
            params: [0.0; 4],
        }
    }

    /// Hold-in-place item for `seconds` at the given point.
    pub fn loiter(point: GeoPoint, seconds: f64) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            altitude: point.altitude,
            command: CommandKind::Loiter,
            params: [seconds, 0.0, 0.0, 0.0],
        }
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude, self.altitude)
    }

    /// Hold duration in seconds for LOITER items.
    pub fn hold_duration(&self) -> Option<f64> {
        match self.command {
            CommandKind::Loiter => Some(self.params[0].max(0.0)),
            _ => None,
        }
    }
}

/// Drone lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneState {
    #[default]
    Ground,
    Taxi,
    Takeoff,
    Hover,
    Mission,
    LoiterHold,
    Rtl,
    Landed,
}

impl DroneState {
    /// Next lifecycle state for simulated time `t` against the drone's timeline.
    ///
    /// Pure: the result depends only on the timeline and `t`. A landed drone
    /// stays landed.
    pub fn advance(self, timeline: &FlightTimeline, t: f64) -> DroneState {
        if self == DroneState::Landed {
            return self;
        }
        timeline.state_at(t)
    }
}

impl std::fmt::Display for DroneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DroneState::Ground => "GROUND",
            DroneState::Taxi => "TAXI",
            DroneState::Takeoff => "TAKEOFF",
            DroneState::Hover => "HOVER",
            DroneState::Mission => "MISSION",
            DroneState::LoiterHold => "LOITER_HOLD",
            DroneState::Rtl => "RTL",
            DroneState::Landed => "LANDED",
        };
        f.write_str(label)
    }
}

/// A drone owned by one simulation session.
#[derive(Debug, Clone)]
pub struct Drone {
    pub id: DroneId,
    pub slot: FormationSlot,
    /// Planned mission items (finalized plan once resolution has run)
    pub plan: Vec<Waypoint>,
    pub timeline: FlightTimeline,
    pub position: LocalPosition,
    /// Plan index of the item currently being flown toward
    pub waypoint_index: Option<usize>,
    pub state: DroneState,
}

impl Drone {
    pub fn new(id: DroneId, slot: FormationSlot, plan: Vec<Waypoint>, timeline: FlightTimeline) -> Self {
        let position = timeline.position_at(0.0);
        Self {
            id,
            slot,
            plan,
            timeline,
            position,
            waypoint_index: None,
            state: DroneState::Ground,
        }
    }

    /// Move the drone to simulated time `t`.
    pub fn advance_to(&mut self, t: f64) {
        self.position = self.timeline.position_at(t);
        self.waypoint_index = self.timeline.waypoint_index_at(t);
        self.state = self.state.advance(&self.timeline, t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_round_trip_through_kind() {
        for code in [16u16, 19, 20, 21, 22, 178] {
            assert_eq!(CommandKind::from_code(code).code(), code);
        }
        assert_eq!(CommandKind::from_code(178), CommandKind::Other(178));
    }

    #[test]
    fn loiter_carries_hold_time_in_param1() {
        let wp = Waypoint::loiter(GeoPoint::new(24.0, 121.0, 10.0), 4.5);
        assert_eq!(wp.hold_duration(), Some(4.5));
        assert_eq!(Waypoint::nav(24.0, 121.0, 10.0).hold_duration(), None);
    }

    #[test]
    fn drone_id_displays_with_prefix() {
        assert_eq!(DroneId(3).to_string(), "Drone_3");
        assert_eq!(serde_json::to_string(&DroneId(3)).unwrap(), "3");
    }

    #[test]
    fn waypoint_serializes_command_as_code() {
        let json = serde_json::to_value(Waypoint::nav(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json["command"], 16);
    }

    #[test]
    fn lerp_clamps_ratio() {
        let a = LocalPosition::new(0.0, 0.0, 0.0);
        let b = LocalPosition::new(10.0, 0.0, 0.0);
        assert_eq!(a.lerp(&b, 2.0), b);
        assert_eq!(a.lerp(&b, 0.5).x, 5.0);
    }
}
