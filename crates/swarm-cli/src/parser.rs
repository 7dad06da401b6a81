//! Mission file parsing: QGC `.waypoints` and CSV.

use std::path::{Path, PathBuf};

use anyhow::Context;
use swarm_core::{CommandKind, DroneId, GeoPoint, Result, SwarmError, Waypoint};

/// Waypoints read from one mission file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMission {
    /// Home row (QGC row 0), when the format carries one
    pub home: Option<GeoPoint>,
    pub waypoints: Vec<Waypoint>,
}

/// Parse a mission file, choosing the format from its extension.
///
/// `.csv` files are read as CSV; everything else must be QGC WPL text.
pub fn parse_mission_file(path: &Path) -> anyhow::Result<ParsedMission> {
    let text = std::fs::read_to_string(path)?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let mission = if is_csv { parse_csv(&text)? } else { parse_qgc(&text)? };
    tracing::debug!(
        path = %path.display(),
        waypoints = mission.waypoints.len(),
        "parsed mission file"
    );
    Ok(mission)
}

/// Load one mission per file, numbering drones 1..N in argument order.
///
/// The origin is the home row of the first file that has one, otherwise the
/// first waypoint of the first file, at altitude zero.
pub fn load_missions(paths: &[PathBuf]) -> anyhow::Result<(GeoPoint, Vec<(DroneId, Vec<Waypoint>)>)> {
    let mut home = None;
    let mut missions = Vec::with_capacity(paths.len());

    for (i, path) in paths.iter().enumerate() {
        let mission = parse_mission_file(path)
            .with_context(|| format!("loading mission {}", path.display()))?;
        if home.is_none() {
            home = mission.home;
        }
        missions.push((DroneId(i as u32 + 1), mission.waypoints));
    }

    let origin = home
        .or_else(|| {
            missions
                .iter()
                .flat_map(|(_, waypoints)| waypoints.first())
                .next()
                .map(Waypoint::geo)
        })
        .map(|p| GeoPoint::new(p.latitude, p.longitude, 0.0))
        .context("no home position or waypoint to anchor the local frame")?;

    tracing::info!(files = paths.len(), "loaded mission files");
    Ok((origin, missions))
}

fn malformed(line: usize, reason: impl Into<String>) -> SwarmError {
    SwarmError::MalformedWaypoint {
        line,
        reason: reason.into(),
    }
}

fn number<T: std::str::FromStr>(field: &str, name: &str, line: usize) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| malformed(line, format!("invalid {name} '{}'", field.trim())))
}

/// Parse QGC WPL 110 text. Row 0 is returned as the home position.
pub fn parse_qgc(text: &str) -> Result<ParsedMission> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    match lines.next() {
        Some((_, header)) if header.starts_with("QGC WPL") => {}
        Some((line, _)) => return Err(malformed(line, "missing QGC WPL header")),
        None => return Err(malformed(1, "empty mission file")),
    }

    let mut home = None;
    let mut waypoints = Vec::new();

    for (line, row) in lines {
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.len() < 12 {
            return Err(malformed(
                line,
                format!("expected 12 columns, found {}", fields.len()),
            ));
        }

        let index: usize = number(fields[0], "index", line)?;
        let command: u16 = number(fields[3], "command", line)?;
        let mut params = [0.0; 4];
        for (slot, field) in params.iter_mut().zip(&fields[4..8]) {
            *slot = number(field, "param", line)?;
        }
        let latitude: f64 = number(fields[8], "latitude", line)?;
        let longitude: f64 = number(fields[9], "longitude", line)?;
        let altitude: f64 = number(fields[10], "altitude", line)?;

        if index == 0 {
            home = Some(GeoPoint::new(latitude, longitude, altitude));
            continue;
        }

        waypoints.push(Waypoint {
            latitude,
            longitude,
            altitude,
            command: CommandKind::from_code(command),
            params,
        });
    }

    Ok(ParsedMission { home, waypoints })
}

const LAT_ALIASES: [&str; 3] = ["latitude", "lat", "y"];
const LON_ALIASES: [&str; 3] = ["longitude", "lon", "x"];
const ALT_ALIASES: [&str; 3] = ["altitude", "alt", "z"];
const COMMAND_ALIASES: [&str; 2] = ["command", "cmd"];
const HOLD_ALIASES: [&str; 3] = ["param1", "hold", "hold_time"];

fn column(header: &[String], aliases: &[&str]) -> Option<usize> {
    header.iter().position(|name| aliases.contains(&name.as_str()))
}

/// Parse CSV with a header row naming latitude, longitude and altitude columns.
///
/// Recognized headers (case-insensitive): latitude/lat/y, longitude/lon/x,
/// altitude/alt/z, optional command/cmd and param1/hold. Rows default to
/// NAV_WAYPOINT.
pub fn parse_csv(text: &str) -> Result<ParsedMission> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let Some((header_line, header)) = rows.next() else {
        return Err(malformed(1, "empty mission file"));
    };
    let header: Vec<String> = header
        .split(',')
        .map(|h| h.trim().trim_matches('"').to_ascii_lowercase())
        .collect();

    let lat = column(&header, &LAT_ALIASES)
        .ok_or_else(|| malformed(header_line, "no latitude column"))?;
    let lon = column(&header, &LON_ALIASES)
        .ok_or_else(|| malformed(header_line, "no longitude column"))?;
    let alt = column(&header, &ALT_ALIASES)
        .ok_or_else(|| malformed(header_line, "no altitude column"))?;
    let cmd = column(&header, &COMMAND_ALIASES);
    let hold = column(&header, &HOLD_ALIASES);

    let mut waypoints = Vec::new();
    for (line, row) in rows {
        let fields: Vec<&str> = row.split(',').map(|f| f.trim().trim_matches('"')).collect();
        let field = |idx: usize, name: &str| {
            fields
                .get(idx)
                .copied()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| malformed(line, format!("missing {name}")))
        };

        let command = match cmd {
            Some(idx) => CommandKind::from_code(number(field(idx, "command")?, "command", line)?),
            None => CommandKind::Nav,
        };
        let mut params = [0.0; 4];
        if let Some(idx) = hold {
            if let Some(value) = fields.get(idx).filter(|f| !f.is_empty()) {
                params[0] = number(value, "param1", line)?;
            }
        }

        waypoints.push(Waypoint {
            latitude: number(field(lat, "latitude")?, "latitude", line)?,
            longitude: number(field(lon, "longitude")?, "longitude", line)?,
            altitude: number(field(alt, "altitude")?, "altitude", line)?,
            command,
            params,
        });
    }

    Ok(ParsedMission {
        home: None,
        waypoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QGC: &str = "QGC WPL 110
0\t1\t0\t16\t0\t0\t0\t0\t24.000000\t121.000000\t0.000000\t1
1\t0\t3\t22\t0\t0\t0\t0\t24.000000\t121.000000\t10.000000\t1
2\t0\t3\t16\t0\t0\t0\t0\t24.000500\t121.000400\t15.000000\t1
3\t0\t3\t19\t4.5\t0\t0\t0\t24.000600\t121.000400\t15.000000\t1
4 0 3 20 0 0 0 0 0 0 0 1
";

    #[test]
    fn qgc_splits_home_row() {
        let mission = parse_qgc(QGC).unwrap();
        assert_eq!(mission.home, Some(GeoPoint::new(24.0, 121.0, 0.0)));
        assert_eq!(mission.waypoints.len(), 4);
        assert_eq!(mission.waypoints[0].command, CommandKind::Takeoff);
        assert_eq!(mission.waypoints[2].hold_duration(), Some(4.5));
        assert_eq!(mission.waypoints[3].command, CommandKind::Rtl);
    }

    #[test]
    fn qgc_requires_header() {
        let err = parse_qgc("1\t0\t3\t16").unwrap_err();
        assert!(matches!(err, SwarmError::MalformedWaypoint { line: 1, .. }));
    }

    #[test]
    fn qgc_reports_line_of_bad_row() {
        let text = "QGC WPL 110\n\n1\t0\t3\t16\t0\t0\t0\t0\tnorth\t121.0\t10\t1\n";
        match parse_qgc(text).unwrap_err() {
            SwarmError::MalformedWaypoint { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("latitude"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn qgc_rejects_short_rows() {
        let err = parse_qgc("QGC WPL 110\n1 0 3 16 0 0\n").unwrap_err();
        assert!(matches!(err, SwarmError::MalformedWaypoint { line: 2, .. }));
    }

    #[test]
    fn csv_accepts_column_aliases() {
        let text = "x,y,z\n121.0004,24.0005,15\n121.0008,24.0010,20\n";
        let mission = parse_csv(text).unwrap();
        assert_eq!(mission.home, None);
        assert_eq!(mission.waypoints.len(), 2);
        assert_eq!(mission.waypoints[0].latitude, 24.0005);
        assert_eq!(mission.waypoints[0].longitude, 121.0004);
        assert_eq!(mission.waypoints[1].altitude, 20.0);
        assert_eq!(mission.waypoints[1].command, CommandKind::Nav);
    }

    #[test]
    fn csv_reads_optional_command_and_hold() {
        let text = "Latitude, Longitude, Altitude, cmd, hold\n24.0,121.0,10,19,6\n24.1,121.1,10,16,\n";
        let mission = parse_csv(text).unwrap();
        assert_eq!(mission.waypoints[0].hold_duration(), Some(6.0));
        assert_eq!(mission.waypoints[1].command, CommandKind::Nav);
    }

    #[test]
    fn csv_missing_column_is_malformed() {
        let err = parse_csv("lat,lon\n24.0,121.0\n").unwrap_err();
        assert!(matches!(err, SwarmError::MalformedWaypoint { line: 1, .. }));

        let err = parse_csv("lat,lon,alt\n24.0,,10\n").unwrap_err();
        assert!(matches!(err, SwarmError::MalformedWaypoint { line: 2, .. }));
    }

    #[test]
    fn load_missions_anchors_on_first_home() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("a.csv");
        std::fs::write(&csv, "lat,lon,alt\n24.5,121.5,10\n").unwrap();
        let qgc = dir.path().join("b.waypoints");
        std::fs::write(&qgc, QGC).unwrap();

        let (origin, missions) = load_missions(&[csv.clone(), qgc]).unwrap();
        assert_eq!(origin, GeoPoint::new(24.0, 121.0, 0.0));
        assert_eq!(missions[0].0, DroneId(1));
        assert_eq!(missions[1].0, DroneId(2));

        let (origin, _) = load_missions(&[csv]).unwrap();
        assert_eq!(origin, GeoPoint::new(24.5, 121.5, 0.0));
    }

    #[test]
    fn load_missions_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.waypoints");
        std::fs::write(&bad, "not a mission").unwrap();
        let err = load_missions(&[bad]).unwrap_err();
        assert!(err.to_string().contains("bad.waypoints"));
        assert!(matches!(
            err.downcast_ref::<SwarmError>(),
            Some(SwarmError::MalformedWaypoint { line: 1, .. })
        ));
    }

    #[test]
    fn reads_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("drone.CSV");
        std::fs::write(&csv, "lat,lon,alt\n24.0,121.0,10\n").unwrap();
        assert_eq!(parse_mission_file(&csv).unwrap().waypoints.len(), 1);

        let qgc = dir.path().join("drone.waypoints");
        std::fs::write(&qgc, QGC).unwrap();
        assert!(parse_mission_file(&qgc).unwrap().home.is_some());
    }
}
