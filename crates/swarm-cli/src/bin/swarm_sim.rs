//! Drone swarm takeoff simulator.
//!
//! Loads missions (files or a built-in scenario), resolves conflicts by
//! delaying lower-priority drones, plays the result back and exports the
//! collision log plus any modified missions.
//!
//! Usage:
//!   swarm-sim --scenario crossing
//!   swarm-sim drone1.waypoints drone2.csv --safety-distance 6

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use swarm_cli::{export, load_missions, scenarios, Config};
use swarm_core::{SimulationConfig, SimulationSession};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-drone takeoff and conflict resolution simulator")]
struct Args {
    /// Mission files (.waypoints or .csv), one per drone
    missions: Vec<PathBuf>,

    /// Built-in scenario when no files are given: test, crossing, random
    #[arg(long, default_value = "test")]
    scenario: String,

    /// Drone count for the random scenario
    #[arg(long, default_value_t = 4)]
    drones: usize,

    /// Seed for the random scenario
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON file with safety/takeoff/resolution settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    safety_distance: Option<f64>,

    #[arg(long)]
    warning_distance: Option<f64>,

    #[arg(long)]
    critical_distance: Option<f64>,

    /// Simulated seconds per tick
    #[arg(long)]
    interval: Option<f64>,

    /// Formation grid spacing (meters)
    #[arg(long)]
    spacing: Option<f64>,

    #[arg(long)]
    takeoff_altitude: Option<f64>,

    #[arg(long)]
    hover_time: Option<f64>,

    #[arg(long)]
    east_offset: Option<f64>,

    #[arg(long)]
    cruise_speed: Option<f64>,

    /// Extra clearance on the delayed leg (meters)
    #[arg(long)]
    margin: Option<f64>,

    /// Longest hold the resolver may insert (seconds)
    #[arg(long)]
    max_hold: Option<f64>,

    #[arg(long)]
    max_iterations: Option<usize>,

    /// Output directory (overrides SWARM_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Play back the nominal plans without resolving conflicts
    #[arg(long)]
    no_resolve: bool,

    /// Skip writing the collision log and mission files
    #[arg(long)]
    no_export: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn simulation_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => swarm_cli::config::load_simulation_config(path)?,
            None => SimulationConfig::default(),
        };

        let overrides = [
            (self.safety_distance, &mut config.safety.safety_distance),
            (self.warning_distance, &mut config.safety.warning_distance),
            (self.critical_distance, &mut config.safety.critical_distance),
            (self.interval, &mut config.safety.collision_check_interval),
            (self.spacing, &mut config.takeoff.formation_spacing),
            (self.takeoff_altitude, &mut config.takeoff.takeoff_altitude),
            (self.hover_time, &mut config.takeoff.hover_time),
            (self.east_offset, &mut config.takeoff.east_offset),
            (self.cruise_speed, &mut config.takeoff.cruise_speed),
            (self.margin, &mut config.resolution.margin),
            (self.max_hold, &mut config.resolution.max_hold),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(max_iterations) = self.max_iterations {
            config.resolution.max_iterations = max_iterations;
        }

        config.validate().context("invalid simulation config")?;
        Ok(config)
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "swarm_cli={default_level},swarm_core={default_level},swarm_sim={default_level}"
        ))
    })?;

    let fmt = tracing_subscriber::fmt::layer();
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt).init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let env_config = Config::from_env();
    let output_dir = args.output_dir.clone().unwrap_or(env_config.output_dir);
    let config = args.simulation_config()?;

    let (name, origin, missions) = if args.missions.is_empty() {
        let scenario = match scenarios::by_name(&args.scenario, args.drones, args.seed) {
            Some(scenario) => scenario?,
            None => bail!(
                "unknown scenario '{}', expected one of {:?}",
                args.scenario,
                scenarios::SCENARIO_NAMES
            ),
        };
        (scenario.name, scenario.origin, scenario.missions)
    } else {
        let (origin, missions) = load_missions(&args.missions)?;
        ("files".to_string(), origin, missions)
    };

    tracing::info!(
        scenario = %name,
        drones = missions.len(),
        lat = origin.latitude,
        lon = origin.longitude,
        "starting simulation"
    );

    let mut session = SimulationSession::new(origin, config, missions)?;

    let nominal_conflicts = session.manager().conflicts(session.plans())?;
    for pair in &nominal_conflicts {
        tracing::warn!(%pair, "nominal plans conflict");
    }

    if !args.no_resolve {
        let report = session
            .resolve_conflicts()
            .context("conflict resolution failed")?;
        for hold in &report.holds {
            println!(
                "{} waits {:.1}s before item {} (yields to {} at t={:.1}s)",
                hold.drone, hold.duration, hold.before_index, hold.against, hold.conflict_time
            );
        }
    }

    session.run_to_end();

    let logger = session.logger();
    let stats = logger.statistics();
    println!("Simulation: {name}");
    println!("  Drones:            {}", session.drones().len());
    println!("  Duration:          {:.1}s", session.horizon());
    println!("  Nominal conflicts: {}", nominal_conflicts.len());
    println!(
        "  Events:            {} ({} critical, {} warning)",
        logger.len(),
        stats.by_severity.critical,
        stats.by_severity.warning
    );
    if let Some(closest) = logger.closest_approach() {
        println!(
            "  Closest approach:  {:.2}m between {} and {} at t={:.1}s",
            closest.distance, closest.drone1, closest.drone2, closest.simulation_time
        );
    }
    if let Some(report) = session.report() {
        for plan in &report.plans {
            println!(
                "  {} wait time:  {:.1}s",
                plan.drone_id,
                report.wait_time(plan.drone_id)
            );
        }
    }

    if args.no_export {
        return Ok(());
    }

    let now = Utc::now();
    let log_path = export::write_collision_log(&output_dir, &env_config.log_prefix, logger, now)
        .context("exporting collision log")?;
    println!("Collision log: {}", log_path.display());

    if let Some(report) = session.report() {
        let written =
            export::write_modified_missions(&output_dir, session.manager().frame(), report, now)
                .context("exporting modified missions")?;
        for path in written {
            println!("Modified mission: {}", path.display());
        }
    }

    Ok(())
}
