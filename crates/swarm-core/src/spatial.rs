//! Geodetic to local-frame conversion and great-circle helpers.
//!
//! The local frame is East-North-Up in meters, anchored at an origin. It uses
//! a flat-earth approximation: latitude degrees scale by a constant, longitude
//! degrees additionally by `cos(origin latitude)`. Valid away from the poles
//! and within ~100 km of the origin.

use crate::error::{Result, SwarmError};
use crate::models::{GeoPoint, LocalPosition};

/// Meters per degree of latitude.
pub const METERS_PER_DEG_LAT: f64 = 111_111.0;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Smallest usable longitude scale; anything below means the origin sits on a pole.
const MIN_LON_SCALE: f64 = 1e-9;

/// Reject latitudes outside [-90, 90] and longitudes outside [-180, 180].
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    let lat_ok = (-90.0..=90.0).contains(&latitude);
    let lon_ok = (-180.0..=180.0).contains(&longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(SwarmError::OutOfRange {
            latitude,
            longitude,
        })
    }
}

/// Local ENU frame anchored at a geodetic origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSystem {
    origin: GeoPoint,
    meters_per_deg_lon: f64,
}

impl CoordinateSystem {
    pub fn new(origin: GeoPoint) -> Result<Self> {
        validate_coordinates(origin.latitude, origin.longitude)?;
        let meters_per_deg_lon = METERS_PER_DEG_LAT * origin.latitude.to_radians().cos();
        if meters_per_deg_lon < MIN_LON_SCALE {
            return Err(SwarmError::OutOfRange {
                latitude: origin.latitude,
                longitude: origin.longitude,
            });
        }
        tracing::debug!(
            lat = origin.latitude,
            lon = origin.longitude,
            meters_per_deg_lon,
            "coordinate origin set"
        );
        Ok(Self {
            origin,
            meters_per_deg_lon,
        })
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    pub fn to_local(&self, point: GeoPoint) -> Result<LocalPosition> {
        validate_coordinates(point.latitude, point.longitude)?;
        Ok(LocalPosition {
            x: (point.longitude - self.origin.longitude) * self.meters_per_deg_lon,
            y: (point.latitude - self.origin.latitude) * METERS_PER_DEG_LAT,
            z: point.altitude - self.origin.altitude,
        })
    }

    pub fn to_geodetic(&self, position: LocalPosition) -> Result<GeoPoint> {
        let point = GeoPoint {
            latitude: self.origin.latitude + position.y / METERS_PER_DEG_LAT,
            longitude: self.origin.longitude + position.x / self.meters_per_deg_lon,
            altitude: self.origin.altitude + position.z,
        };
        validate_coordinates(point.latitude, point.longitude)?;
        Ok(point)
    }
}

/// Convert `point` into the local frame anchored at `origin`.
pub fn to_local(origin: GeoPoint, point: GeoPoint) -> Result<LocalPosition> {
    CoordinateSystem::new(origin)?.to_local(point)
}

/// Convert local offsets from `origin` back to a geodetic point.
pub fn to_geodetic(origin: GeoPoint, x: f64, y: f64, z: f64) -> Result<GeoPoint> {
    CoordinateSystem::new(origin)?.to_geodetic(LocalPosition::new(x, y, z))
}

/// Great-circle distance in meters (Haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from point 1 to point 2 in degrees, 0 = north, clockwise, [0, 360).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Point reached travelling `distance_m` along `bearing_deg` from (lat, lon).
pub fn destination_point(lat: f64, lon: f64, distance_m: f64, bearing_deg: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let bearing_rad = bearing_deg.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    (lat2.to_degrees(), lon2.to_degrees())
}
