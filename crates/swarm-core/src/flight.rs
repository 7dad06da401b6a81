//! Flight sequence construction.
//!
//! Each drone's plan expands into a timed list of straight-line segments:
//! taxi, climb, hover, the mission items, then return-to-launch. Positions
//! are interpolated directly against simulated time.
//!
//! LOITER items at the head of a plan that sit on the drone's own slot at
//! ground level are departure holds: the drone waits on the ground before
//! taxi instead of flying to them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};
use crate::formation::{FormationPlanner, FormationSlot};
use crate::models::{CommandKind, DroneId, DroneState, GeoPoint, LocalPosition, Waypoint};
use crate::rules::{SimulationConfig, TakeoffConfig};
use crate::spatial::CoordinateSystem;

/// Distance (meters) within which a LOITER counts as sitting on the slot at ground level.
pub const GROUND_HOLD_TOLERANCE: f64 = 0.5;

/// One straight-line piece of a flight, flown at constant velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub state: DroneState,
    pub start_time: f64,
    pub end_time: f64,
    pub from: LocalPosition,
    pub to: LocalPosition,
    /// Plan index of the item this segment serves; `None` before the mission
    pub waypoint_index: Option<usize>,
}

impl FlightSegment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    fn position_at(&self, t: f64) -> LocalPosition {
        let span = self.duration();
        if span <= 0.0 {
            return self.to;
        }
        self.from.lerp(&self.to, (t - self.start_time) / span)
    }
}

/// Timed flight of one drone, from taxi to landing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightTimeline {
    segments: Vec<FlightSegment>,
    rest: LocalPosition,
}

impl FlightTimeline {
    pub fn segments(&self) -> &[FlightSegment] {
        &self.segments
    }

    /// Simulated time at which the drone has landed.
    pub fn duration(&self) -> f64 {
        self.segments.last().map(|s| s.end_time).unwrap_or(0.0)
    }

    /// Segment active at `t`, if the flight is in progress.
    pub fn segment_at(&self, t: f64) -> Option<&FlightSegment> {
        if t < 0.0 {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.end_time <= t);
        self.segments.get(idx)
    }

    pub fn position_at(&self, t: f64) -> LocalPosition {
        if t <= 0.0 {
            return self.segments.first().map(|s| s.from).unwrap_or(self.rest);
        }
        match self.segment_at(t) {
            Some(segment) => segment.position_at(t),
            None => self.rest,
        }
    }

    pub fn state_at(&self, t: f64) -> DroneState {
        if t < 0.0 {
            return DroneState::Ground;
        }
        match self.segment_at(t) {
            Some(segment) => segment.state,
            None => DroneState::Landed,
        }
    }

    pub fn waypoint_index_at(&self, t: f64) -> Option<usize> {
        self.segment_at(t).and_then(|s| s.waypoint_index)
    }

    /// Plan index of the first item flown after the hover, if any.
    pub fn departure_index(&self) -> Option<usize> {
        self.segments
            .iter()
            .find(|s| s.state > DroneState::Hover)
            .and_then(|s| s.waypoint_index)
    }

    /// Total time spent in LOITER holds, on the ground or in the air.
    pub fn hold_time(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| {
                s.state == DroneState::LoiterHold
                    || (s.state == DroneState::Ground && s.waypoint_index.is_some())
            })
            .map(FlightSegment::duration)
            .sum()
    }

    fn push(&mut self, state: DroneState, to: LocalPosition, duration: f64, waypoint_index: Option<usize>) {
        let from = self.rest;
        if duration > 0.0 {
            let start_time = self.duration();
            self.segments.push(FlightSegment {
                state,
                start_time,
                end_time: start_time + duration,
                from,
                to,
                waypoint_index,
            });
        }
        self.rest = to;
    }
}

/// A drone's finalized mission: its slot plus the ordered items it will fly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub drone_id: DroneId,
    pub slot: FormationSlot,
    pub waypoints: Vec<Waypoint>,
}

impl FlightPlan {
    /// Sum of LOITER hold durations in the plan.
    pub fn total_hold(&self) -> f64 {
        self.waypoints.iter().filter_map(Waypoint::hold_duration).sum()
    }

    /// Copy of this plan with `hold` inserted before item `index`.
    pub fn with_hold(&self, index: usize, hold: Waypoint) -> FlightPlan {
        let mut waypoints = self.waypoints.clone();
        waypoints.insert(index.min(waypoints.len()), hold);
        FlightPlan {
            drone_id: self.drone_id,
            slot: self.slot,
            waypoints,
        }
    }
}

/// Builds per-drone flight sequences and owns conflict resolution.
#[derive(Debug, Clone)]
pub struct FlightManager {
    pub(crate) frame: CoordinateSystem,
    pub(crate) config: SimulationConfig,
}

impl FlightManager {
    pub fn new(frame: CoordinateSystem, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { frame, config })
    }

    pub fn frame(&self) -> &CoordinateSystem {
        &self.frame
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Nominal plans: one formation slot per drone, mission items unchanged.
    pub fn nominal_plans(&self, missions: Vec<(DroneId, Vec<Waypoint>)>) -> Result<Vec<FlightPlan>> {
        let mut seen = BTreeSet::new();
        for (id, waypoints) in &missions {
            if !seen.insert(*id) {
                return Err(SwarmError::InvalidConfig(format!("duplicate drone id {id}")));
            }
            for wp in waypoints {
                crate::spatial::validate_coordinates(wp.latitude, wp.longitude)?;
            }
        }

        let ids: Vec<DroneId> = seen.into_iter().collect();
        let slots = FormationPlanner::new(&self.config.takeoff).assign(&ids);

        let mut missions = missions;
        missions.sort_by_key(|(id, _)| *id);

        let plans: Vec<FlightPlan> = missions
            .into_iter()
            .zip(slots)
            .map(|((drone_id, waypoints), slot)| FlightPlan {
                drone_id,
                slot,
                waypoints,
            })
            .collect();

        tracing::info!(drones = plans.len(), "built nominal flight plans");
        Ok(plans)
    }

    /// Expand a plan into its timed flight sequence.
    pub fn timeline(&self, plan: &FlightPlan) -> Result<FlightTimeline> {
        build_timeline(&self.frame, &self.config.takeoff, plan)
    }

    /// Where a departure hold waits: the slot at ground level.
    pub fn ground_point(&self, slot: &FormationSlot) -> LocalPosition {
        slot.position.with_z(0.0)
    }

    /// Hover point above the drone's slot.
    pub fn hover_point(&self, slot: &FormationSlot) -> LocalPosition {
        slot.position.with_z(self.config.takeoff.takeoff_altitude)
    }

    pub(crate) fn to_geodetic(&self, position: LocalPosition) -> Result<GeoPoint> {
        self.frame.to_geodetic(position)
    }
}

/// Expand `plan` into segments using the takeoff kinematics in `takeoff`.
pub fn build_timeline(
    frame: &CoordinateSystem,
    takeoff: &TakeoffConfig,
    plan: &FlightPlan,
) -> Result<FlightTimeline> {
    let ground = plan.slot.position.with_z(0.0);
    let hover = ground.with_z(takeoff.takeoff_altitude);

    let mut timeline = FlightTimeline {
        segments: Vec::new(),
        rest: ground,
    };

    let mut departure = 0;
    for (index, wp) in plan.waypoints.iter().enumerate() {
        match wp.command {
            CommandKind::Takeoff | CommandKind::Other(_) => {}
            CommandKind::Loiter if is_ground_hold(frame, ground, wp) => {
                let hold = wp.hold_duration().unwrap_or(0.0);
                timeline.push(DroneState::Ground, ground, hold, Some(index));
            }
            _ => break,
        }
        departure = index + 1;
    }

    timeline.push(DroneState::Taxi, ground, takeoff.taxi_time, None);
    timeline.push(
        DroneState::Takeoff,
        hover,
        takeoff.takeoff_altitude / takeoff.climb_rate,
        None,
    );
    timeline.push(DroneState::Hover, hover, takeoff.hover_time, None);

    let mut return_index = plan.waypoints.len();
    for (index, wp) in plan.waypoints.iter().enumerate().skip(departure) {
        match wp.command {
            CommandKind::Takeoff | CommandKind::Other(_) => continue,
            CommandKind::Rtl => {
                return_index = index;
                break;
            }
            CommandKind::Nav => {
                let target = frame.to_local(wp.geo())?;
                fly(&mut timeline, takeoff, target, index);
            }
            CommandKind::Loiter => {
                let target = frame.to_local(wp.geo())?;
                fly(&mut timeline, takeoff, target, index);
                let hold = wp.hold_duration().unwrap_or(0.0);
                timeline.push(DroneState::LoiterHold, target, hold, Some(index));
            }
            CommandKind::Land => {
                let target = frame.to_local(wp.geo())?;
                fly(&mut timeline, takeoff, target, index);
                let touchdown = target.with_z(0.0);
                timeline.push(
                    DroneState::Rtl,
                    touchdown,
                    target.z.max(0.0) / takeoff.descent_rate,
                    Some(index),
                );
                return Ok(timeline);
            }
        }
    }

    let cruise = timeline.rest;
    let above_slot = ground.with_z(cruise.z);
    timeline.push(
        DroneState::Rtl,
        above_slot,
        cruise.distance_to(&above_slot) / takeoff.cruise_speed,
        Some(return_index),
    );
    timeline.push(
        DroneState::Rtl,
        ground,
        above_slot.z.max(0.0) / takeoff.descent_rate,
        Some(return_index),
    );

    Ok(timeline)
}

fn is_ground_hold(frame: &CoordinateSystem, ground: LocalPosition, wp: &Waypoint) -> bool {
    frame.to_local(wp.geo()).is_ok_and(|p| {
        p.z.abs() <= GROUND_HOLD_TOLERANCE && p.with_z(0.0).distance_to(&ground) <= GROUND_HOLD_TOLERANCE
    })
}

fn fly(timeline: &mut FlightTimeline, takeoff: &TakeoffConfig, target: LocalPosition, index: usize) {
    let distance = timeline.rest.distance_to(&target);
    timeline.push(
        DroneState::Mission,
        target,
        distance / takeoff.cruise_speed,
        Some(index),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CoordinateSystem {
        CoordinateSystem::new(GeoPoint::new(24.0, 121.0, 0.0)).unwrap()
    }

    fn manager() -> FlightManager {
        FlightManager::new(frame(), SimulationConfig::default()).unwrap()
    }

    fn waypoint_at(x: f64, y: f64, z: f64) -> Waypoint {
        let geo = frame().to_geodetic(LocalPosition::new(x, y, z)).unwrap();
        Waypoint::nav(geo.latitude, geo.longitude, geo.altitude)
    }

    fn single_plan(waypoints: Vec<Waypoint>) -> FlightPlan {
        let manager = manager();
        manager
            .nominal_plans(vec![(DroneId(1), waypoints)])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn phases_follow_takeoff_sequence() {
        let manager = manager();
        let plan = single_plan(vec![waypoint_at(50.0, 80.0, 10.0)]);
        let timeline = manager.timeline(&plan).unwrap();

        assert_eq!(timeline.state_at(-1.0), DroneState::Ground);
        assert_eq!(timeline.state_at(1.0), DroneState::Taxi);
        assert_eq!(timeline.state_at(4.0), DroneState::Takeoff);
        assert_eq!(timeline.state_at(8.0), DroneState::Hover);
        assert_eq!(timeline.state_at(10.0), DroneState::Mission);
        // 80 m at 8 m/s from t=9 s, then 80 m back and a 5 s descent
        assert!((timeline.duration() - 34.0).abs() < 1e-6);
        assert_eq!(timeline.state_at(30.0), DroneState::Rtl);
        assert_eq!(timeline.state_at(34.5), DroneState::Landed);
    }

    #[test]
    fn interpolates_along_mission_leg() {
        let manager = manager();
        let plan = single_plan(vec![waypoint_at(50.0, 80.0, 10.0)]);
        let timeline = manager.timeline(&plan).unwrap();

        let mid = timeline.position_at(14.0);
        assert!((mid.x - 50.0).abs() < 1e-6);
        assert!((mid.y - 40.0).abs() < 1e-6);
        assert!((mid.z - 10.0).abs() < 1e-6);

        assert_eq!(timeline.position_at(0.0), plan.slot.position);
        assert_eq!(timeline.position_at(1000.0), plan.slot.position);
    }

    #[test]
    fn loiter_item_holds_in_place() {
        let manager = manager();
        let geo = frame().to_geodetic(LocalPosition::new(50.0, 80.0, 10.0)).unwrap();
        let plan = single_plan(vec![Waypoint::loiter(geo, 6.0)]);
        let timeline = manager.timeline(&plan).unwrap();

        assert_eq!(timeline.state_at(20.0), DroneState::LoiterHold);
        assert_eq!(timeline.waypoint_index_at(20.0), Some(0));
        assert!((timeline.hold_time() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn leading_ground_loiter_delays_departure() {
        let manager = manager();
        let nominal = single_plan(vec![waypoint_at(50.0, 80.0, 10.0)]);
        let ground = manager.to_geodetic(manager.ground_point(&nominal.slot)).unwrap();
        let plan = nominal.with_hold(0, Waypoint::loiter(ground, 3.0));
        let timeline = manager.timeline(&plan).unwrap();

        assert_eq!(timeline.state_at(1.0), DroneState::Ground);
        assert_eq!(timeline.waypoint_index_at(1.0), Some(0));
        assert_eq!(timeline.position_at(2.5), nominal.slot.position);
        assert_eq!(timeline.state_at(4.0), DroneState::Taxi);
        assert_eq!(timeline.departure_index(), Some(1));
        assert!((timeline.hold_time() - 3.0).abs() < 1e-9);
        assert!((timeline.duration() - 37.0).abs() < 1e-6);
        assert!((plan.total_hold() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rtl_item_ends_mission() {
        let manager = manager();
        let mut rtl = waypoint_at(0.0, 0.0, 0.0);
        rtl.command = CommandKind::Rtl;
        let plan = single_plan(vec![
            waypoint_at(50.0, 40.0, 10.0),
            rtl,
            waypoint_at(500.0, 500.0, 10.0),
        ]);
        let timeline = manager.timeline(&plan).unwrap();
        let return_legs: Vec<_> = timeline
            .segments()
            .iter()
            .filter(|s| s.state == DroneState::Rtl)
            .collect();
        assert_eq!(return_legs.len(), 2);
        assert!(return_legs.iter().all(|s| s.waypoint_index == Some(1)));
        assert!(timeline.duration() < 30.0);
    }

    #[test]
    fn land_item_descends_in_place() {
        let manager = manager();
        let mut land = waypoint_at(50.0, 40.0, 10.0);
        land.command = CommandKind::Land;
        let plan = single_plan(vec![land]);
        let timeline = manager.timeline(&plan).unwrap();
        let end = timeline.position_at(timeline.duration() + 1.0);
        assert!((end.y - 40.0).abs() < 1e-6);
        assert!(end.z.abs() < 1e-9);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let manager = manager();
        let result = manager.nominal_plans(vec![(DroneId(1), vec![]), (DroneId(1), vec![])]);
        assert!(matches!(result, Err(SwarmError::InvalidConfig(_))));
    }

    #[test]
    fn out_of_range_waypoint_rejected() {
        let manager = manager();
        let result = manager.nominal_plans(vec![(DroneId(1), vec![Waypoint::nav(95.0, 0.0, 10.0)])]);
        assert!(matches!(result, Err(SwarmError::OutOfRange { .. })));
    }

    #[test]
    fn lifecycle_advance_is_monotonic_to_landed() {
        let manager = manager();
        let plan = single_plan(vec![waypoint_at(50.0, 80.0, 10.0)]);
        let timeline = manager.timeline(&plan).unwrap();

        let mut state = DroneState::Ground;
        let mut seen = vec![state];
        for step in 0..500 {
            state = state.advance(&timeline, step as f64 * 0.1);
            if seen.last() != Some(&state) {
                seen.push(state);
            }
        }
        assert_eq!(
            seen,
            vec![
                DroneState::Ground,
                DroneState::Taxi,
                DroneState::Takeoff,
                DroneState::Hover,
                DroneState::Mission,
                DroneState::Rtl,
                DroneState::Landed,
            ]
        );
    }
}
