//! Binary entry point: loads a machine config (or falls back to the
//! built-in Zen Toolworks 7x12 profile), wires a simulated HAL to
//! [`tinyg_core::cycle::CycleRunner`], and runs the G-code/status/config
//! line protocol over stdin/stdout (spec.md §5, §6).
//!
//! CLI shape and tracing setup are grounded on this workspace's own
//! driver binary: clap-derive args, a `run()` split out of `main()` so
//! startup errors log through `tracing` instead of panicking, and a
//! ctrlc handler that flips a shared `running` flag rather than exiting
//! the process directly.

mod hal_sim;
mod protocol;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use tinyg_common::config::{load_machine_config, zen7x12_default, MachineConfig};
use tinyg_common::hal::NvStore;
use tinyg_core::cycle::{rt_setup, CycleRunner};

use hal_sim::{SimulatedGpio, SimulatedTimer, StdioSerial};
use protocol::Line;

/// Simulated TinyG-style motion controller.
#[derive(Parser, Debug)]
#[command(name = "tinyg_main")]
#[command(version)]
#[command(about = "G-code motion controller over a simulated HAL")]
struct Args {
    /// Path to a machine configuration TOML file. Falls back to the
    /// built-in Zen Toolworks 7x12 profile if omitted or not found.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Non-volatile config store: read at startup if `--config` wasn't
    /// given, and (re)written once with whatever config is in effect
    /// (spec.md §6 "the core reads once at init and writes through on
    /// change" — the write-through here happens at startup only).
    #[arg(long)]
    state: Option<PathBuf>,

    /// Read G-code from this file instead of stdin.
    #[arg(short, long)]
    program: Option<PathBuf>,

    /// Main loop rate, Hz (planner/segment-generator tick + serial drain).
    #[arg(long, default_value_t = 1000)]
    cycle_hz: u32,

    /// Step-pulse rate, Hz.
    #[arg(long, default_value_t = 10_000)]
    step_hz: u32,

    /// Planner queue depth (blocks).
    #[arg(long, default_value_t = 24)]
    planner_capacity: usize,

    /// Pin to a CPU core and request SCHED_FIFO (requires the `rt` build
    /// feature; a no-op otherwise).
    #[arg(long)]
    realtime: bool,

    /// CPU core to pin to when `--realtime` is set.
    #[arg(long, default_value_t = 0)]
    rt_cpu: usize,

    /// SCHED_FIFO priority when `--realtime` is set.
    #[arg(long, default_value_t = 50)]
    rt_priority: i32,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() -> std::process::ExitCode {
    if let Err(e) = run() {
        error!("tinyg_main exited: {e}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("tinyg_main v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut nv_store = args.state.clone().map(hal_sim::FileNvStore::new);
    let config = load_config(args.config.as_deref(), nv_store.as_ref())?;
    if let Some(store) = nv_store.as_mut() {
        store.store(&config)?;
    }
    let polarity_reversed = polarity_table(&config);

    if args.realtime {
        rt_setup(args.rt_cpu, args.rt_priority)?;
    }

    let mut cr = CycleRunner::new(
        config,
        args.cycle_hz,
        args.step_hz,
        args.planner_capacity,
        polarity_reversed,
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let mut serial = StdioSerial::new(running.clone(), args.program.clone())?;
    let mut gpio = SimulatedGpio::new();
    let mut timer = SimulatedTimer::new(running);

    info!(
        cycle_hz = args.cycle_hz,
        step_hz = args.step_hz,
        planner_capacity = args.planner_capacity,
        "cycle runner configured"
    );

    let mut filter = |cr: &mut CycleRunner, line: &str| -> Option<String> {
        match protocol::classify(line) {
            Line::StatusQuery => Some(protocol::status_report(cr)),
            Line::Config(rest) => Some(protocol::handle_config(cr, rest)),
            Line::Gcode(_) | Line::Empty => None,
        }
    };

    match cr.run(&mut serial, &mut gpio, &mut timer, &mut filter) {
        Ok(()) => unreachable!("CycleRunner::run only returns on error"),
        Err(e) if is_shutdown(&e) => {
            info!("shutdown complete");
            let counts = gpio.step_counts();
            info!(?counts, "final simulated step counts");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

fn is_shutdown(e: &tinyg_core::cycle::CycleError) -> bool {
    matches!(e, tinyg_core::cycle::CycleError::Hal(he) if he.to_string().contains("shutdown requested"))
}

fn load_config(
    path: Option<&std::path::Path>,
    nv_store: Option<&hal_sim::FileNvStore>,
) -> Result<MachineConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        info!(path = %path.display(), "loading machine configuration");
        return Ok(load_machine_config(path)?);
    }
    if let Some(store) = nv_store {
        if let Some(config) = store.load()? {
            info!("loaded machine configuration from non-volatile store");
            return Ok(config);
        }
    }
    info!("no persisted configuration found, using built-in zen7x12 profile");
    Ok(zen7x12_default())
}

fn polarity_table(config: &MachineConfig) -> [bool; 6] {
    let mut table = [false; 6];
    for axis in tinyg_common::position::Axis::ALL {
        if let Some(cfg) = config.axis_config(axis) {
            table[axis.index()] = cfg.polarity_reversed;
        }
    }
    table
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Exercises the `?`/`$`/G-code protocol split directly against a
/// `CycleRunner`, independent of `run`'s stdio wiring.
#[cfg(test)]
mod tests {
    use super::*;
    use tinyg_common::config::zen7x12_default;

    #[test]
    fn dispatch_classifies_each_line_kind() {
        let mut cr = CycleRunner::new(zen7x12_default(), 1000, 50_000, 16, [false; 6]);
        match protocol::classify("G0 X5") {
            Line::Gcode(line) => {
                cr.submit_line(line).unwrap();
            }
            _ => panic!("expected Gcode"),
        }
        assert_eq!(cr.planner_len(), 1);

        match protocol::classify("?") {
            Line::StatusQuery => {
                let report = protocol::status_report(&cr);
                assert!(report.contains("\"qr\":1"));
            }
            _ => panic!("expected StatusQuery"),
        }
    }
}
