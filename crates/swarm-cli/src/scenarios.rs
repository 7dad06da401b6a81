//! Built-in mission sets for running the simulator without input files.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swarm_core::{CoordinateSystem, DroneId, GeoPoint, LocalPosition, Result, Waypoint};

/// Base coordinate for built-in scenarios.
pub const BASE_LAT: f64 = 24.0;
pub const BASE_LON: f64 = 121.0;

/// Side length of the rectangular test pattern (meters).
const TEST_BOX_SIZE: f64 = 80.0;
const TEST_ALTITUDE: f64 = 15.0;

/// Region corners for the four test drones: SW, SE, NW, NE.
const TEST_REGIONS: [(f64, f64); 4] = [(-100.0, -50.0), (100.0, -50.0), (-100.0, 50.0), (100.0, 50.0)];

/// A named set of missions around a shared origin.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub origin: GeoPoint,
    pub missions: Vec<(DroneId, Vec<Waypoint>)>,
}

pub const SCENARIO_NAMES: [&str; 3] = ["test", "crossing", "random"];

/// Look up a scenario by name. `drones` and `seed` only affect `random`.
pub fn by_name(name: &str, drones: usize, seed: u64) -> Option<Result<Scenario>> {
    match name {
        "test" => Some(create_test_scenario()),
        "crossing" => Some(create_crossing_scenario()),
        "random" => Some(create_random_scenario(drones, seed)),
        _ => None,
    }
}

fn base() -> GeoPoint {
    GeoPoint::new(BASE_LAT, BASE_LON, 0.0)
}

fn nav(frame: &CoordinateSystem, x: f64, y: f64, z: f64) -> Result<Waypoint> {
    let geo = frame.to_geodetic(LocalPosition::new(x, y, z))?;
    Ok(Waypoint::nav(geo.latitude, geo.longitude, geo.altitude))
}

/// Closed rectangle starting and ending at its south-west corner.
fn box_mission(frame: &CoordinateSystem, x: f64, y: f64, size: f64, z: f64) -> Result<Vec<Waypoint>> {
    [
        (x, y),
        (x + size, y),
        (x + size, y + size),
        (x, y + size),
        (x, y),
    ]
    .into_iter()
    .map(|(px, py)| nav(frame, px, py, z))
    .collect()
}

/// Four drones in the 2x2 formation, each flying an 80 m box in its own region.
pub fn create_test_scenario() -> Result<Scenario> {
    let frame = CoordinateSystem::new(base())?;
    let missions = TEST_REGIONS
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            let mission = box_mission(&frame, x, y, TEST_BOX_SIZE, TEST_ALTITUDE)?;
            Ok((DroneId(i as u32 + 1), mission))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Scenario {
        name: "test".to_string(),
        origin: frame.origin(),
        missions,
    })
}

/// Two drones from neighbouring slots meeting at one point at the same time.
///
/// Both slots sit 28 m from the meeting point, so without resolution the
/// drones arrive together at t = 12.5 s with the default kinematics.
pub fn create_crossing_scenario() -> Result<Scenario> {
    let frame = CoordinateSystem::new(base())?;
    let meet_y = (28.0f64 * 28.0 - 9.0).sqrt();

    let missions = vec![
        (
            DroneId(1),
            vec![nav(&frame, 53.0, meet_y, 10.0)?, nav(&frame, 20.0, 60.0, 10.0)?],
        ),
        (
            DroneId(2),
            vec![nav(&frame, 53.0, meet_y, 10.0)?, nav(&frame, 90.0, 60.0, 10.0)?],
        ),
    ];

    Ok(Scenario {
        name: "crossing".to_string(),
        origin: frame.origin(),
        missions,
    })
}

/// `drones` random box missions. The same seed always gives the same missions.
pub fn create_random_scenario(drones: usize, seed: u64) -> Result<Scenario> {
    let frame = CoordinateSystem::new(base())?;
    let mut rng = StdRng::seed_from_u64(seed);

    let missions = (0..drones)
        .map(|i| {
            let x = rng.random_range(-150.0..150.0);
            let y = rng.random_range(-150.0..150.0);
            let size = rng.random_range(40.0..100.0);
            let z = rng.random_range(10.0..30.0_f64).round();
            Ok((DroneId(i as u32 + 1), box_mission(&frame, x, y, size, z)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Scenario {
        name: "random".to_string(),
        origin: frame.origin(),
        missions,
    })
}
