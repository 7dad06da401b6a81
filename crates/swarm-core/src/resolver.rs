//! Priority-based conflict resolution.
//!
//! Nominal plans are flown forward at the collision check interval. The
//! earliest separation violation delays the lower-priority drone (larger id)
//! with a LOITER hold inserted before the item it was flying toward. A drone
//! that has not yet reached its first mission item waits on the ground at its
//! slot, so the hold never sits in the departure path of its neighbours. Each
//! pass works on fresh plan versions; the loop ends when a full pass is clean
//! or the iteration cap is reached.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{CollisionDetector, Snapshot};
use crate::error::{ConflictPair, Result, SwarmError};
use crate::flight::{FlightManager, FlightPlan, FlightTimeline};
use crate::models::{DroneId, DroneState, Waypoint};

/// One LOITER hold added to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldInsertion {
    pub drone: DroneId,
    /// Plan index the hold was inserted at (the delayed item moves to index + 1)
    pub before_index: usize,
    /// Hold time in seconds
    pub duration: f64,
    pub conflict_time: f64,
    /// Higher-priority drone the hold yields to
    pub against: DroneId,
}

/// Outcome of a successful resolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub nominal: Vec<FlightPlan>,
    /// Finalized plans, ordered by drone id
    pub plans: Vec<FlightPlan>,
    pub holds: Vec<HoldInsertion>,
    /// Forward passes that inserted a hold
    pub iterations: usize,
    /// Conflicting pairs found in the nominal plans
    pub initial_conflicts: Vec<ConflictPair>,
}

impl ResolutionReport {
    /// Total hold time added to `drone`.
    pub fn wait_time(&self, drone: DroneId) -> f64 {
        self.holds
            .iter()
            .filter(|h| h.drone == drone)
            .map(|h| h.duration)
            .sum()
    }

    pub fn plan(&self, drone: DroneId) -> Option<&FlightPlan> {
        self.plans.iter().find(|p| p.drone_id == drone)
    }

    pub fn is_modified(&self, drone: DroneId) -> bool {
        self.holds.iter().any(|h| h.drone == drone)
    }
}

struct Flight<'a> {
    id: DroneId,
    timeline: &'a FlightTimeline,
}

impl FlightManager {
    /// Rewrite `nominal` until a forward simulation shows no separation violations.
    pub fn resolve(&self, nominal: Vec<FlightPlan>) -> Result<ResolutionReport> {
        let limits = self.config.resolution;
        let mut plans = nominal.clone();
        let mut timelines = self.timelines(&plans)?;
        let initial_conflicts = self.scan(&plans, &timelines, false);

        tracing::info!(
            drones = plans.len(),
            conflicts = initial_conflicts.len(),
            "starting conflict resolution"
        );

        let mut holds = Vec::new();
        let mut iterations = 0;

        loop {
            let Some(conflict) = self.scan(&plans, &timelines, true).into_iter().next() else {
                break;
            };

            if iterations >= limits.max_iterations {
                let unresolved = self.scan(&plans, &timelines, false);
                tracing::warn!(
                    iterations,
                    unresolved = unresolved.len(),
                    "conflict resolution did not converge"
                );
                return Err(SwarmError::ConflictResolutionDiverged {
                    iterations,
                    unresolved,
                });
            }
            iterations += 1;

            tracing::warn!(
                priority = %conflict.priority,
                waiting = %conflict.waiting,
                t = conflict.simulation_time,
                distance = conflict.distance,
                "separation violation"
            );

            let waiting = index_of(&plans, conflict.waiting)?;
            let priority = index_of(&plans, conflict.priority)?;
            let (plan, hold) = self.insert_hold(
                &plans[waiting],
                &timelines[waiting],
                &timelines[priority],
                &conflict,
            )?;

            tracing::warn!(
                drone = %hold.drone,
                before_index = hold.before_index,
                duration = hold.duration,
                against = %hold.against,
                "inserted loiter hold"
            );

            timelines[waiting] = self.timeline(&plan)?;
            plans[waiting] = plan;
            holds.push(hold);
            tracing::debug!(iteration = iterations, holds = holds.len(), "resolution pass complete");
        }

        tracing::info!(iterations, holds = holds.len(), "conflict resolution finished");

        Ok(ResolutionReport {
            nominal,
            plans,
            holds,
            iterations,
            initial_conflicts,
        })
    }

    /// Every conflicting pair in `plans`, first occurrence each, in time order.
    pub fn conflicts(&self, plans: &[FlightPlan]) -> Result<Vec<ConflictPair>> {
        let timelines = self.timelines(plans)?;
        Ok(self.scan(plans, &timelines, false))
    }

    fn timelines(&self, plans: &[FlightPlan]) -> Result<Vec<FlightTimeline>> {
        plans.iter().map(|plan| self.timeline(plan)).collect()
    }

    fn tick_count(&self, horizon: f64) -> usize {
        (horizon / self.config.safety.collision_check_interval).ceil() as usize
    }

    fn scan(&self, plans: &[FlightPlan], timelines: &[FlightTimeline], first_only: bool) -> Vec<ConflictPair> {
        let flights: Vec<Flight<'_>> = plans
            .iter()
            .zip(timelines)
            .map(|(plan, timeline)| Flight {
                id: plan.drone_id,
                timeline,
            })
            .collect();

        let horizon = timelines.iter().map(FlightTimeline::duration).fold(0.0, f64::max);
        let interval = self.config.safety.collision_check_interval;
        let mut found: BTreeSet<(DroneId, DroneId)> = BTreeSet::new();
        let mut ordered = Vec::new();

        for tick in 0..=self.tick_count(horizon) {
            let t = tick as f64 * interval;
            let snapshot = snapshot_of(&flights, t);
            for event in CollisionDetector::violations(&snapshot, &self.config.safety) {
                if !found.insert((event.drone1, event.drone2)) {
                    continue;
                }
                let pair = ConflictPair {
                    priority: event.drone1,
                    waiting: event.drone2,
                    simulation_time: t,
                    distance: event.distance,
                };
                ordered.push(pair);
                if first_only {
                    return ordered;
                }
            }
        }

        ordered
    }

    /// Smallest hold before the waiting drone's current item that clears the pair.
    ///
    /// Up to and including the first mission leg the hold is taken on the
    /// ground before taxi; later it is flown at the start of the current leg.
    fn insert_hold(
        &self,
        plan: &FlightPlan,
        waiting: &FlightTimeline,
        priority: &FlightTimeline,
        conflict: &ConflictPair,
    ) -> Result<(FlightPlan, HoldInsertion)> {
        let limits = self.config.resolution;
        let interval = self.config.safety.collision_check_interval;
        let t = conflict.simulation_time;

        let unresolvable = || SwarmError::UnresolvableConflict {
            priority: conflict.priority,
            waiting: conflict.waiting,
            simulation_time: t,
            max_hold: limits.max_hold,
        };

        if waiting.state_at(t) == DroneState::Landed {
            return Err(unresolvable());
        }
        let departure = waiting
            .departure_index()
            .unwrap_or(plan.waypoints.len());

        let (index, hold_point) = match waiting.waypoint_index_at(t) {
            Some(index) if index > departure => {
                let point = waiting
                    .segments()
                    .iter()
                    .find(|s| s.waypoint_index.is_some_and(|i| i >= index))
                    .map(|s| s.from)
                    .unwrap_or_else(|| self.hover_point(&plan.slot));
                (index, point)
            }
            _ => (departure, self.ground_point(&plan.slot)),
        };
        let hold_geo = self.to_geodetic(hold_point)?;

        let max_steps = (limits.max_hold / interval + 1e-9).floor() as usize;
        for step in 1..=max_steps {
            let duration = ((step as f64 * interval) * 1e6).round() / 1e6;
            let candidate = plan.with_hold(index, Waypoint::loiter(hold_geo, duration));
            let timeline = self.timeline(&candidate)?;
            if self.pair_clear(priority, &timeline, index) {
                let hold = HoldInsertion {
                    drone: conflict.waiting,
                    before_index: index,
                    duration,
                    conflict_time: t,
                    against: conflict.priority,
                };
                return Ok((candidate, hold));
            }
        }

        tracing::warn!(
            priority = %conflict.priority,
            waiting = %conflict.waiting,
            t,
            max_hold = limits.max_hold,
            "no hold within the cap clears the conflict"
        );
        Err(unresolvable())
    }

    /// Separation check for the delayed drone up to the end of its approach leg.
    ///
    /// Through the hold (plan index <= `hold_index`) the pair must stay outside
    /// `safety_distance`; on the approach to the delayed item it must also keep
    /// the resolution margin.
    fn pair_clear(
        &self,
        priority: &FlightTimeline,
        waiting: &FlightTimeline,
        hold_index: usize,
    ) -> bool {
        let safety = self.config.safety.safety_distance;
        let margin = self.config.resolution.margin;
        let interval = self.config.safety.collision_check_interval;
        let horizon = priority.duration().max(waiting.duration());

        for tick in 0..=self.tick_count(horizon) {
            let t = tick as f64 * interval;
            if waiting.state_at(t) == DroneState::Landed {
                return true;
            }
            let required = match waiting.waypoint_index_at(t) {
                None => safety,
                Some(i) if i <= hold_index => safety,
                Some(i) if i == hold_index + 1 => safety + margin,
                Some(_) => return true,
            };
            let separation = priority.position_at(t).distance_to(&waiting.position_at(t));
            if separation <= required {
                return false;
            }
        }
        true
    }
}

fn index_of(plans: &[FlightPlan], drone: DroneId) -> Result<usize> {
    plans
        .iter()
        .position(|p| p.drone_id == drone)
        .ok_or_else(|| SwarmError::InvalidConfig(format!("no plan for {drone}")))
}

fn snapshot_of(flights: &[Flight<'_>], t: f64) -> Snapshot {
    let mut snapshot = Snapshot::at(DateTime::<Utc>::default(), t);
    for flight in flights {
        snapshot.insert(
            flight.id,
            flight.timeline.position_at(t),
            flight.timeline.waypoint_index_at(t),
        );
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, LocalPosition};
    use crate::rules::SimulationConfig;
    use crate::spatial::CoordinateSystem;

    fn manager(config: SimulationConfig) -> FlightManager {
        let frame = CoordinateSystem::new(GeoPoint::new(24.0, 121.0, 0.0)).unwrap();
        FlightManager::new(frame, config).unwrap()
    }

    fn nav(manager: &FlightManager, x: f64, y: f64) -> Waypoint {
        let geo = manager.frame().to_geodetic(LocalPosition::new(x, y, 10.0)).unwrap();
        Waypoint::nav(geo.latitude, geo.longitude, geo.altitude)
    }

    #[test]
    fn separated_plans_need_no_holds() {
        let manager = manager(SimulationConfig::default());
        let plans = manager
            .nominal_plans(vec![
                (DroneId(1), vec![nav(&manager, 0.0, 80.0)]),
                (DroneId(2), vec![nav(&manager, 120.0, 80.0)]),
            ])
            .unwrap();
        let report = manager.resolve(plans.clone()).unwrap();
        assert!(report.holds.is_empty());
        assert_eq!(report.iterations, 0);
        assert_eq!(report.plans, plans);
    }

    #[test]
    fn crossing_pair_delays_larger_id() {
        let manager = manager(SimulationConfig::default());
        let cross_y = (28.0f64 * 28.0 - 9.0).sqrt();
        let plans = manager
            .nominal_plans(vec![
                (DroneId(2), vec![nav(&manager, 53.0, cross_y), nav(&manager, 90.0, 60.0)]),
                (DroneId(1), vec![nav(&manager, 53.0, cross_y), nav(&manager, 20.0, 60.0)]),
            ])
            .unwrap();

        let report = manager.resolve(plans.clone()).unwrap();
        assert_eq!(report.initial_conflicts.len(), 1);
        assert_eq!(report.holds.len(), 1);

        let hold = report.holds[0];
        assert_eq!(hold.drone, DroneId(2));
        assert_eq!(hold.against, DroneId(1));
        assert_eq!(hold.before_index, 0);
        assert!(hold.duration > 0.0);
        assert!((report.wait_time(DroneId(2)) - hold.duration).abs() < 1e-9);

        assert_eq!(report.plan(DroneId(1)), Some(&plans[0]));
        let delayed = report.plan(DroneId(2)).unwrap();
        assert_eq!(delayed.waypoints.len(), 3);
        assert_eq!(delayed.waypoints[0].hold_duration(), Some(hold.duration));

        assert!(manager.conflicts(&report.plans).unwrap().is_empty());
    }

    #[test]
    fn neighbours_departing_across_each_other_wait_on_the_ground() {
        let manager = manager(SimulationConfig::default());
        let plans = manager
            .nominal_plans(vec![
                (DroneId(1), vec![nav(&manager, 120.0, 0.0)]),
                (DroneId(2), vec![nav(&manager, -10.0, 0.0)]),
            ])
            .unwrap();
        assert!(!manager.conflicts(&plans).unwrap().is_empty());

        let report = manager.resolve(plans.clone()).unwrap();
        assert_eq!(report.holds.len(), 1);
        let hold = report.holds[0];
        assert_eq!((hold.drone, hold.before_index), (DroneId(2), 0));
        assert_eq!(report.plan(DroneId(1)), Some(&plans[0]));

        let delayed = report.plan(DroneId(2)).unwrap();
        let timeline = manager.timeline(delayed).unwrap();
        assert_eq!(timeline.state_at(hold.duration / 2.0), DroneState::Ground);
        assert_eq!(timeline.position_at(hold.duration / 2.0), delayed.slot.position);
        assert_eq!(timeline.departure_index(), Some(1));

        assert!(manager.conflicts(&report.plans).unwrap().is_empty());
    }

    #[test]
    fn cap_of_one_diverges_on_two_independent_conflicts() {
        let config = SimulationConfig {
            resolution: crate::rules::ResolutionConfig {
                max_iterations: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let manager = manager(config);
        let cross_y = (28.0f64 * 28.0 - 9.0).sqrt();
        let plans = manager
            .nominal_plans(vec![
                (DroneId(1), vec![nav(&manager, 53.0, cross_y), nav(&manager, 20.0, 60.0)]),
                (DroneId(2), vec![nav(&manager, 53.0, cross_y), nav(&manager, 90.0, 60.0)]),
                (DroneId(3), vec![nav(&manager, 53.0, cross_y + 6.0), nav(&manager, 20.0, 66.0)]),
                (DroneId(4), vec![nav(&manager, 53.0, cross_y + 6.0), nav(&manager, 90.0, 66.0)]),
            ])
            .unwrap();

        match manager.resolve(plans) {
            Err(SwarmError::ConflictResolutionDiverged {
                iterations,
                unresolved,
            }) => {
                assert_eq!(iterations, 1);
                assert!(!unresolved.is_empty());
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn hold_cap_below_interval_is_unresolvable() {
        let config = SimulationConfig {
            resolution: crate::rules::ResolutionConfig {
                max_hold: 0.05,
                ..Default::default()
            },
            ..Default::default()
        };
        let manager = manager(config);
        let cross_y = (28.0f64 * 28.0 - 9.0).sqrt();
        let plans = manager
            .nominal_plans(vec![
                (DroneId(1), vec![nav(&manager, 53.0, cross_y), nav(&manager, 20.0, 60.0)]),
                (DroneId(2), vec![nav(&manager, 53.0, cross_y), nav(&manager, 90.0, 60.0)]),
            ])
            .unwrap();

        let err = manager.resolve(plans).unwrap_err();
        match err {
            SwarmError::UnresolvableConflict { priority, waiting, .. } => {
                assert_eq!((priority, waiting), (DroneId(1), DroneId(2)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
