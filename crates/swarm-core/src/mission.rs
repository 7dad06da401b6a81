//! QGroundControl WPL 110 rendering of finalized plans.

use std::fmt::Write as _;

use crate::error::Result;
use crate::flight::FlightPlan;
use crate::models::{CommandKind, GeoPoint, Waypoint};
use crate::spatial::CoordinateSystem;

pub const QGC_HEADER: &str = "QGC WPL 110";

/// MAV_FRAME_GLOBAL, used for the home row.
pub const FRAME_GLOBAL: u8 = 0;
/// MAV_FRAME_GLOBAL_RELATIVE_ALT, used for mission items.
pub const FRAME_GLOBAL_RELATIVE_ALT: u8 = 3;

/// Render `waypoints` as a `.waypoints` file with `home` as row 0.
///
/// Columns are tab separated: index, current, frame, command, param1-4,
/// latitude, longitude, altitude, autocontinue.
pub fn render_qgc(home: GeoPoint, waypoints: &[Waypoint]) -> String {
    let mut out = String::with_capacity(64 * (waypoints.len() + 2));
    out.push_str(QGC_HEADER);
    out.push('\n');

    let home_row = Waypoint {
        latitude: home.latitude,
        longitude: home.longitude,
        altitude: home.altitude,
        command: CommandKind::Nav,
        params: [0.0; 4],
    };
    push_row(&mut out, 0, true, FRAME_GLOBAL, &home_row);

    for (i, wp) in waypoints.iter().enumerate() {
        push_row(&mut out, i + 1, false, FRAME_GLOBAL_RELATIVE_ALT, wp);
    }
    out
}

/// Render a plan with its formation slot as the home position.
///
/// Item altitudes are written relative to the frame origin, as
/// `FRAME_GLOBAL_RELATIVE_ALT` expects.
pub fn render_plan(frame: &CoordinateSystem, plan: &FlightPlan) -> Result<String> {
    let home = plan.slot.geodetic(frame)?;
    let base = frame.origin().altitude;
    let items: Vec<Waypoint> = plan
        .waypoints
        .iter()
        .map(|wp| Waypoint {
            altitude: wp.altitude - base,
            ..*wp
        })
        .collect();
    Ok(render_qgc(home, &items))
}

fn push_row(out: &mut String, index: usize, current: bool, frame: u8, wp: &Waypoint) {
    let [p1, p2, p3, p4] = wp.params;
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{index}\t{}\t{frame}\t{}\t{p1}\t{p2}\t{p3}\t{p4}\t{:.8}\t{:.8}\t{:.6}\t1",
        u8::from(current),
        wp.command.code(),
        wp.latitude,
        wp.longitude,
        wp.altitude,
    );
}
