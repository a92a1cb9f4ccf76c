//! # schedule-stated — schedule-state daemon
//!
//! Composition root that wires the port implementations into one sensor per
//! configured schedule and ticks them on a timer.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialise logging from the configured filter
//! - Construct sensors, injecting the in-process template and condition ports
//! - Tick every sensor with the local wall clock and log state transitions
//! - Apply JSON commands read line by line from standard input
//! - Print one JSON report per schedule and exit with `--once`
//! - Stop on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that reads a clock or the environment.
//! It is the wiring layer — no domain logic belongs here.

mod command;
mod config;
mod daemon;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, Offset};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use schedule_state_app::builtin::{LiteralRenderer, StaticConditions};
use schedule_state_app::sensor::ScheduleSensor;

use crate::config::Config;
use crate::daemon::Daemon;

#[derive(Debug, Parser)]
#[command(version, about = "Time-of-day schedule sensors")]
struct Cli {
    /// Config file (defaults to `schedule-state.toml`).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every schedule's current state as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter `{}`", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let utc_offset = Local::now().offset().fix();
    let sensors = config
        .schedules
        .into_iter()
        .map(|schedule| {
            let name = schedule.name.clone();
            ScheduleSensor::new(schedule, LiteralRenderer, StaticConditions)
                .map(|sensor| sensor.with_utc_offset(utc_offset))
                .with_context(|| format!("invalid schedule `{name}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut daemon = Daemon::new(sensors);

    if cli.once {
        let reports = daemon.tick(Local::now().naive_local());
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    tracing::info!(
        schedules = daemon.sensor_count(),
        tick_seconds = config.daemon.tick_seconds,
        "schedule-stated started"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(config.daemon.tick_seconds));
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                daemon.tick(Local::now().naive_local());
            }
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let now = Local::now().naive_local();
                    if daemon.handle_line(&line, now).is_some() {
                        daemon.tick(now);
                    }
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    tracing::warn!(%err, "stopped reading commands");
                    stdin_open = false;
                }
            },
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}
