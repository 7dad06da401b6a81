//! Tick-driven playback of finalized plans.
//!
//! A session owns its drones and collision log. Resolution runs once as a
//! pre-pass; playback then advances one logical clock at the collision check
//! interval, snapshots every drone at the same instant and logs what the
//! detector reports. Nothing here blocks on real time.

use chrono::{DateTime, Utc};

use crate::conflict::{CollisionDetector, CollisionEvent, Snapshot};
use crate::error::Result;
use crate::flight::{FlightManager, FlightPlan};
use crate::logger::CollisionLogger;
use crate::models::{Drone, DroneId, GeoPoint, Waypoint};
use crate::resolver::ResolutionReport;
use crate::rules::SimulationConfig;
use crate::spatial::CoordinateSystem;

/// Fixed-step logical clock. Time is `tick * interval`, never accumulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    tick: u64,
    interval: f64,
}

impl SimulationClock {
    pub fn new(interval: f64) -> Self {
        Self { tick: 0, interval }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn now(&self) -> f64 {
        self.tick as f64 * self.interval
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn reset(&mut self) {
        self.tick = 0;
    }
}

pub struct SimulationSession {
    manager: FlightManager,
    plans: Vec<FlightPlan>,
    drones: Vec<Drone>,
    logger: CollisionLogger,
    clock: SimulationClock,
    epoch: DateTime<Utc>,
    report: Option<ResolutionReport>,
}

impl SimulationSession {
    /// Session flying the nominal plans for `missions` around `origin`.
    pub fn new(
        origin: GeoPoint,
        config: SimulationConfig,
        missions: Vec<(DroneId, Vec<Waypoint>)>,
    ) -> Result<Self> {
        let frame = CoordinateSystem::new(origin)?;
        let manager = FlightManager::new(frame, config)?;
        let plans = manager.nominal_plans(missions)?;
        let drones = build_drones(&manager, &plans)?;

        Ok(Self {
            manager,
            plans,
            drones,
            logger: CollisionLogger::new(),
            clock: SimulationClock::new(config.safety.collision_check_interval),
            epoch: Utc::now(),
            report: None,
        })
    }

    /// Wall-clock instant corresponding to simulated time zero.
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Run resolution over the nominal plans and load the finalized plans.
    ///
    /// Playback restarts from time zero with an empty log. On error the
    /// session keeps its current plans.
    pub fn resolve_conflicts(&mut self) -> Result<&ResolutionReport> {
        let nominal = match &self.report {
            Some(report) => report.nominal.clone(),
            None => self.plans.clone(),
        };
        let report = self.manager.resolve(nominal)?;
        self.drones = build_drones(&self.manager, &report.plans)?;
        self.plans = report.plans.clone();
        self.reset();
        Ok(&*self.report.insert(report))
    }

    /// Advance one step: move every drone, check the snapshot, log events.
    pub fn tick(&mut self) -> Vec<CollisionEvent> {
        let t = self.clock.now();
        for drone in &mut self.drones {
            drone.advance_to(t);
        }
        let snapshot = self.snapshot();
        let events = CollisionDetector::check(&snapshot, &self.manager.config().safety);
        self.logger.extend(events.iter().cloned());
        self.clock.advance();
        events
    }

    /// Play back until every drone has landed. Returns the number of ticks run.
    pub fn run_to_end(&mut self) -> u64 {
        let start = self.clock.tick();
        while !self.is_finished() {
            self.tick();
        }
        let ticks = self.clock.tick() - start;
        tracing::info!(
            ticks,
            events = self.logger.len(),
            horizon = self.horizon(),
            "playback finished"
        );
        ticks
    }

    /// Discard playback state: clock, drone states and the collision log.
    ///
    /// The log is replaced, never emptied in place.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.logger = CollisionLogger::new();
        for drone in &mut self.drones {
            *drone = Drone::new(drone.id, drone.slot, drone.plan.clone(), drone.timeline.clone());
        }
    }

    /// Time at which the last drone lands.
    pub fn horizon(&self) -> f64 {
        self.drones
            .iter()
            .map(|d| d.timeline.duration())
            .fold(0.0, f64::max)
    }

    pub fn is_finished(&self) -> bool {
        let last_tick = (self.horizon() / self.clock.interval()).ceil() as u64;
        self.clock.tick() > last_tick
    }

    pub fn simulation_time(&self) -> f64 {
        self.clock.now()
    }

    /// Read-only view of all drones at the last processed instant.
    pub fn snapshot(&self) -> Snapshot {
        let t = self.clock.now();
        let mut snapshot = Snapshot::at(self.epoch, t);
        for drone in &self.drones {
            snapshot.insert(drone.id, drone.position, drone.waypoint_index);
        }
        snapshot
    }

    /// Where every drone would be at `t`, without touching session state.
    pub fn positions_at(&self, t: f64) -> Snapshot {
        let mut snapshot = Snapshot::at(self.epoch, t);
        for drone in &self.drones {
            snapshot.insert(
                drone.id,
                drone.timeline.position_at(t),
                drone.timeline.waypoint_index_at(t),
            );
        }
        snapshot
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.drones.iter().find(|d| d.id == id)
    }

    /// Plans currently flown: nominal until resolution succeeds, finalized after.
    pub fn plans(&self) -> &[FlightPlan] {
        &self.plans
    }

    pub fn report(&self) -> Option<&ResolutionReport> {
        self.report.as_ref()
    }

    pub fn logger(&self) -> &CollisionLogger {
        &self.logger
    }

    pub fn manager(&self) -> &FlightManager {
        &self.manager
    }
}

fn build_drones(manager: &FlightManager, plans: &[FlightPlan]) -> Result<Vec<Drone>> {
    plans
        .iter()
        .map(|plan| {
            let timeline = manager.timeline(plan)?;
            Ok(Drone::new(plan.drone_id, plan.slot, plan.waypoints.clone(), timeline))
        })
        .collect()
}
