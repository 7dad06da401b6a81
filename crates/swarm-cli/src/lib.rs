//! Swarm CLI - file handling and scenarios around the simulator core.
//!
//! - parser: QGC `.waypoints` and CSV mission files
//! - scenarios: built-in test, crossing and random mission sets
//! - export: modified mission files and collision log output
//! - config: environment and JSON configuration

pub mod config;
pub mod export;
pub mod parser;
pub mod scenarios;

pub use config::Config;
pub use parser::{load_missions, parse_csv, parse_mission_file, parse_qgc, ParsedMission};
pub use scenarios::Scenario;
