//! Append-only collision event log and its JSON export.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{CollisionEvent, Severity};
use crate::error::{Result, SwarmError};
use crate::models::DroneId;

/// Version string written into exported logs.
pub const SIMULATION_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub warning: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.warning + self.critical
    }
}

/// Event counts by severity and by participating drone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatistics {
    pub by_severity: SeverityCounts,
    /// Number of events each drone took part in
    pub by_drone: BTreeMap<DroneId, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub total_events: usize,
    pub export_time: DateTime<Utc>,
    pub simulation_version: String,
    pub statistics: LogStatistics,
}

/// Top-level shape of an exported collision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionLogExport {
    pub metadata: ExportMetadata,
    pub collision_events: Vec<CollisionEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionLogger {
    events: Vec<CollisionEvent>,
}

impl CollisionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Repeated events for the same pair are all kept.
    pub fn record(&mut self, event: CollisionEvent) {
        if event.severity == Severity::Critical {
            tracing::warn!(
                drone1 = %event.drone1,
                drone2 = %event.drone2,
                distance = event.distance,
                t = event.simulation_time,
                "critical proximity"
            );
        }
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = CollisionEvent>) {
        for event in events {
            self.record(event);
        }
    }

    pub fn events(&self) -> &[CollisionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn statistics(&self) -> LogStatistics {
        let mut stats = LogStatistics::default();
        for event in &self.events {
            match event.severity {
                Severity::Warning => stats.by_severity.warning += 1,
                Severity::Critical => stats.by_severity.critical += 1,
            }
            *stats.by_drone.entry(event.drone1).or_insert(0) += 1;
            *stats.by_drone.entry(event.drone2).or_insert(0) += 1;
        }
        stats
    }

    /// Event with the smallest separation; the earliest one wins ties.
    pub fn closest_approach(&self) -> Option<&CollisionEvent> {
        self.events.iter().fold(None, |best: Option<&CollisionEvent>, event| match best {
            Some(b) if b.distance <= event.distance => Some(b),
            _ => Some(event),
        })
    }

    pub fn export(&self, export_time: DateTime<Utc>) -> CollisionLogExport {
        CollisionLogExport {
            metadata: ExportMetadata {
                total_events: self.events.len(),
                export_time,
                simulation_version: SIMULATION_VERSION.to_string(),
                statistics: self.statistics(),
            },
            collision_events: self.events.clone(),
        }
    }

    pub fn to_json_string(&self, export_time: DateTime<Utc>) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export(export_time))?)
    }

    /// Write the log to `path`. I/O failures are returned as `ExportIo`, never retried.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        let body = self.to_json_string(Utc::now())?;
        std::fs::write(&path, body).map_err(|source| SwarmError::ExportIo {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), events = self.events.len(), "collision log exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalPosition;

    fn event(t: f64, a: u32, b: u32, distance: f64, severity: Severity) -> CollisionEvent {
        CollisionEvent {
            timestamp: DateTime::<Utc>::default(),
            simulation_time: t,
            drone1: DroneId(a),
            drone2: DroneId(b),
            distance,
            severity,
            position1: LocalPosition::default(),
            position2: LocalPosition::new(distance, 0.0, 0.0),
            waypoint1_index: None,
            waypoint2_index: Some(0),
        }
    }

    #[test]
    fn keeps_duplicates_in_order() {
        let mut log = CollisionLogger::new();
        log.record(event(1.0, 1, 2, 4.0, Severity::Warning));
        log.record(event(1.1, 1, 2, 4.0, Severity::Warning));
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1].simulation_time, 1.1);
    }

    #[test]
    fn counts_by_severity_and_drone() {
        let mut log = CollisionLogger::new();
        log.record(event(1.0, 1, 2, 4.0, Severity::Warning));
        log.record(event(1.1, 1, 2, 2.0, Severity::Critical));
        log.record(event(1.2, 2, 3, 7.0, Severity::Warning));

        let stats = log.statistics();
        assert_eq!(stats.by_severity, SeverityCounts { warning: 2, critical: 1 });
        assert_eq!(stats.by_severity.total(), 3);
        assert_eq!(stats.by_drone[&DroneId(1)], 2);
        assert_eq!(stats.by_drone[&DroneId(2)], 3);
        assert_eq!(stats.by_drone[&DroneId(3)], 1);
    }

    #[test]
    fn closest_approach_prefers_earliest_tie() {
        let mut log = CollisionLogger::new();
        assert!(log.closest_approach().is_none());
        log.record(event(1.0, 1, 2, 2.0, Severity::Critical));
        log.record(event(2.0, 1, 3, 2.0, Severity::Critical));
        log.record(event(3.0, 2, 3, 6.0, Severity::Warning));
        assert_eq!(log.closest_approach().unwrap().simulation_time, 1.0);
    }

    #[test]
    fn json_keeps_field_order() {
        let mut log = CollisionLogger::new();
        log.record(event(12.5, 1, 2, 0.0, Severity::Critical));
        let json = log.to_json_string(DateTime::<Utc>::default()).unwrap();

        let keys = [
            "\"timestamp\"",
            "\"simulation_time\"",
            "\"drone1\"",
            "\"drone2\"",
            "\"distance\"",
            "\"severity\"",
            "\"position1\"",
            "\"position2\"",
            "\"waypoint1_index\": null",
            "\"waypoint2_index\": 0",
        ];
        let events_at = json.find("\"collision_events\"").unwrap();
        let mut cursor = events_at;
        for key in keys {
            let at = json[cursor..].find(key).map(|i| i + cursor).unwrap();
            assert!(at >= cursor, "{key} out of order");
            cursor = at;
        }
        assert!(json.contains("\"severity\": \"critical\""));
        assert!(json.find("\"metadata\"").unwrap() < events_at);
    }

    #[test]
    fn export_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.json");
        let err = CollisionLogger::new().export_json(&path).unwrap_err();
        assert!(matches!(err, SwarmError::ExportIo { .. }));
    }
}
