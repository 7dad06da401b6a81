//! Output files: modified missions and the collision log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use swarm_core::{
    mission, CollisionLogger, CoordinateSystem, DroneId, ResolutionReport, Result, SwarmError,
};

/// Timestamp format used in every exported file name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const MISSION_FILE_TAG: &str = "modified";

pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `{DroneID}_modified_{timestamp}.waypoints`
pub fn mission_file_name(drone: DroneId, at: DateTime<Utc>) -> String {
    format!("{drone}_{MISSION_FILE_TAG}_{}.waypoints", file_stamp(at))
}

/// `{prefix}_{timestamp}.json`
pub fn collision_log_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}.json", file_stamp(at))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| SwarmError::ExportIo {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write one QGC file for every drone whose plan gained a hold.
pub fn write_modified_missions(
    dir: &Path,
    frame: &CoordinateSystem,
    report: &ResolutionReport,
    at: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;

    let mut written = Vec::new();
    for plan in report.plans.iter().filter(|p| report.is_modified(p.drone_id)) {
        let path = dir.join(mission_file_name(plan.drone_id, at));
        let body = mission::render_plan(frame, plan)?;
        std::fs::write(&path, body).map_err(|source| SwarmError::ExportIo {
            path: path.clone(),
            source,
        })?;
        tracing::info!(
            drone = %plan.drone_id,
            path = %path.display(),
            wait = report.wait_time(plan.drone_id),
            loiter_total = plan.total_hold(),
            "exported modified mission"
        );
        written.push(path);
    }
    Ok(written)
}

/// Export the log as `{prefix}_{timestamp}.json` under `dir`.
pub fn write_collision_log(
    dir: &Path,
    prefix: &str,
    logger: &CollisionLogger,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    ensure_dir(dir)?;
    logger.export_json(dir.join(collision_log_name(prefix, at)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::create_crossing_scenario;
    use chrono::TimeZone;
    use swarm_core::{SimulationConfig, SimulationSession};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 30).unwrap()
    }

    #[test]
    fn file_names_follow_convention() {
        assert_eq!(
            mission_file_name(DroneId(2), at()),
            "Drone_2_modified_20240309_140530.waypoints"
        );
        assert_eq!(
            collision_log_name("collision_log", at()),
            "collision_log_20240309_140530.json"
        );
    }

    #[test]
    fn only_delayed_drones_are_written() {
        let scenario = create_crossing_scenario().unwrap();
        let mut session =
            SimulationSession::new(scenario.origin, SimulationConfig::default(), scenario.missions)
                .unwrap();
        let report = session.resolve_conflicts().unwrap().clone();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missions");
        let written =
            write_modified_missions(&out, session.manager().frame(), &report, at()).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("Drone_2_modified_20240309_140530.waypoints"));
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with("QGC WPL 110"));

        let parsed = crate::parser::parse_qgc(&text).unwrap();
        assert_eq!(parsed.waypoints.len(), report.plan(DroneId(2)).unwrap().waypoints.len());
    }

    #[test]
    fn collision_log_lands_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_collision_log(dir.path(), "collision_log", &CollisionLogger::new(), at())
            .unwrap();
        assert_eq!(path, dir.path().join("collision_log_20240309_140530.json"));
        assert!(path.exists());
    }
}
