//! Safety rules, takeoff parameters and resolution limits.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};

/// Separation thresholds used by the collision detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Separation at or below which a pair must be resolved (meters)
    pub safety_distance: f64,
    /// Upper bound of the warning band (meters)
    pub warning_distance: f64,
    /// Separation at or below which an event is critical (meters)
    pub critical_distance: f64,
    /// Simulated seconds between collision checks
    pub collision_check_interval: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            safety_distance: 5.0,
            warning_distance: 8.0,
            critical_distance: 3.0,
            collision_check_interval: 0.1,
        }
    }
}

impl SafetyConfig {
    /// Enforce `critical < safety <= warning` and a positive check interval.
    pub fn validate(&self) -> Result<()> {
        if !(self.critical_distance >= 0.0 && self.critical_distance < self.safety_distance) {
            return Err(SwarmError::InvalidConfig(format!(
                "critical_distance ({}) must be non-negative and below safety_distance ({})",
                self.critical_distance, self.safety_distance
            )));
        }
        if self.safety_distance > self.warning_distance {
            return Err(SwarmError::InvalidConfig(format!(
                "safety_distance ({}) must not exceed warning_distance ({})",
                self.safety_distance, self.warning_distance
            )));
        }
        if !(self.collision_check_interval > 0.0 && self.collision_check_interval.is_finite()) {
            return Err(SwarmError::InvalidConfig(format!(
                "collision_check_interval must be positive, got {}",
                self.collision_check_interval
            )));
        }
        Ok(())
    }
}

/// Formation and takeoff kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeoffConfig {
    /// Grid spacing between formation slots (meters)
    pub formation_spacing: f64,
    /// Altitude reached by the vertical climb (meters)
    pub takeoff_altitude: f64,
    /// Hover wait after the climb (seconds)
    pub hover_time: f64,
    /// Formation offset east of the base coordinate (meters)
    pub east_offset: f64,
    /// Ground time before the climb starts (seconds)
    pub taxi_time: f64,
    /// Vertical climb rate (m/s)
    pub climb_rate: f64,
    /// Horizontal cruise speed for mission legs (m/s)
    pub cruise_speed: f64,
    /// Vertical descent rate when landing (m/s)
    pub descent_rate: f64,
}

impl Default for TakeoffConfig {
    fn default() -> Self {
        Self {
            formation_spacing: 6.0,
            takeoff_altitude: 10.0,
            hover_time: 2.0,
            east_offset: 50.0,
            taxi_time: 2.0,
            climb_rate: 2.0,
            cruise_speed: 8.0,
            descent_rate: 2.0,
        }
    }
}

impl TakeoffConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("formation_spacing", self.formation_spacing),
            ("climb_rate", self.climb_rate),
            ("cruise_speed", self.cruise_speed),
            ("descent_rate", self.descent_rate),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SwarmError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("takeoff_altitude", self.takeoff_altitude),
            ("hover_time", self.hover_time),
            ("taxi_time", self.taxi_time),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SwarmError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if !self.east_offset.is_finite() {
            return Err(SwarmError::InvalidConfig("east_offset must be finite".into()));
        }
        Ok(())
    }
}

/// Limits for the offline conflict resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Extra clearance beyond `safety_distance` required on the delayed leg (meters)
    pub margin: f64,
    /// Longest single hold the resolver may insert (seconds)
    pub max_hold: f64,
    /// Full forward passes allowed before giving up
    pub max_iterations: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            margin: 2.0,
            max_hold: 120.0,
            max_iterations: 64,
        }
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.margin >= 0.0 && self.margin.is_finite()) {
            return Err(SwarmError::InvalidConfig(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        if !(self.max_hold > 0.0 && self.max_hold.is_finite()) {
            return Err(SwarmError::InvalidConfig(format!(
                "max_hold must be positive, got {}",
                self.max_hold
            )));
        }
        if self.max_iterations == 0 {
            return Err(SwarmError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// All tunables for one simulation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub safety: SafetyConfig,
    pub takeoff: TakeoffConfig,
    pub resolution: ResolutionConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.safety.validate()?;
        self.takeoff.validate()?;
        self.resolution.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn critical_must_be_below_safety() {
        let config = SafetyConfig {
            critical_distance: 5.0,
            ..SafetyConfig::default()
        };
        assert!(matches!(config.validate(), Err(SwarmError::InvalidConfig(_))));
    }

    #[test]
    fn safety_may_equal_warning() {
        let config = SafetyConfig {
            safety_distance: 8.0,
            ..SafetyConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = SafetyConfig {
            safety_distance: 9.0,
            ..SafetyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_spacing_rejected() {
        let config = TakeoffConfig {
            formation_spacing: 0.0,
            ..TakeoffConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = ResolutionConfig {
            max_iterations: 0,
            ..ResolutionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"safety": {"safety_distance": 4.0}}"#).unwrap();
        assert_eq!(config.safety.safety_distance, 4.0);
        assert_eq!(config.safety.warning_distance, 8.0);
        assert_eq!(config.takeoff, TakeoffConfig::default());
    }
}
