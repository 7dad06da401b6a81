pub mod conflict;
pub mod error;
pub mod flight;
pub mod formation;
pub mod logger;
pub mod mission;
pub mod models;
pub mod resolver;
pub mod rules;
pub mod simulation;
pub mod spatial;

pub use conflict::{CollisionDetector, CollisionEvent, Severity, Snapshot};
pub use error::{ConflictPair, Result, SwarmError};
pub use flight::{build_timeline, FlightManager, FlightPlan, FlightSegment, FlightTimeline};
pub use formation::{FormationPlanner, FormationSlot};
pub use logger::{
    CollisionLogExport, CollisionLogger, ExportMetadata, LogStatistics, SeverityCounts,
    SIMULATION_VERSION,
};
pub use mission::{render_plan, render_qgc};
pub use models::{
    CommandKind, Drone, DroneId, DroneState, GeoPoint, LocalPosition, Waypoint,
};
pub use resolver::{HoldInsertion, ResolutionReport};
pub use rules::{ResolutionConfig, SafetyConfig, SimulationConfig, TakeoffConfig};
pub use simulation::{SimulationClock, SimulationSession};
pub use spatial::{
    bearing, destination_point, haversine_distance, to_geodetic, to_local, CoordinateSystem,
};
