//! # Sand Table Controller Binary
//!
//! # Usage
//!
//! ```bash
//! # Home, then draw two patterns
//! sand_control --config table.toml run --home spiral.thr star.thr
//!
//! # Show the scheduling plan for this host
//! sand_control plan
//!
//! # List serial ports
//! sand_control ports
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sand_common::config::{ConfigLoader, LogLevel, TableConfig};
use sand_common::pattern::ParsedPattern;
use sand_control::context::ControlContext;
use sand_control::diagnostics::{DiagnosticsBus, DiagnosticsLayer};
use sand_control::link::list_ports;
use sand_control::pool::{Task, TaskHandle, TaskOutput, WorkerCommand, pool_size, worker};
use sand_control::sched::{self, WorkClass};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Kinetic sand table controller
#[derive(Parser, Debug)]
#[command(name = "sand_control")]
#[command(version)]
#[command(about = "Streams patterns to a sand table motion controller")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Stream one or more .thr patterns
    Run {
        /// Pattern files, drawn in order
        #[arg(required = true)]
        patterns: Vec<PathBuf>,

        /// Home the table before drawing
        #[arg(long)]
        home: bool,
    },
    /// Run the homing sequence
    Home,
    /// List available serial ports
    Ports,
    /// Print the scheduling plan for this host
    Plan,
    /// Pool worker process (internal)
    #[command(hide = true)]
    Worker,
}

fn main() {
    if let Err(e) = run() {
        error!("FATAL: {e}");
        eprintln!("sand_control: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let bus = Arc::new(DiagnosticsBus::from_config(&config.diagnostics));
    setup_tracing(&args, config.shared.log_level, &bus);

    match args.command {
        Cmd::Worker => {
            worker::run_worker(&config.scheduling)?;
            Ok(())
        }
        Cmd::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                println!("{port}");
            }
            Ok(())
        }
        Cmd::Plan => {
            print_plan(&config);
            Ok(())
        }
        Cmd::Home => {
            let worker = worker_command(args.config.as_deref())?;
            let ctx = ControlContext::new(config, bus, worker, sched::cpu_count());
            home(&ctx)
        }
        Cmd::Run { patterns, home } => {
            let worker = worker_command(args.config.as_deref())?;
            let ctx = ControlContext::new(config, bus, worker, sched::cpu_count());
            let result = draw(&ctx, &patterns, home);
            ctx.shutdown();
            result
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TableConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => TableConfig::load(path)?,
        None => TableConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// This binary in worker mode, sharing our configuration file.
fn worker_command(config: Option<&Path>) -> std::io::Result<WorkerCommand> {
    let mut command = WorkerCommand::current_exe()?;
    if let Some(path) = config {
        command.args = vec![
            "--config".to_string(),
            path.display().to_string(),
            "worker".to_string(),
        ];
    }
    Ok(command)
}

/// Env filter, fmt output on stderr, and the diagnostics layer.
fn setup_tracing(args: &Args, configured: LogLevel, bus: &Arc<DiagnosticsBus>) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let diagnostics = DiagnosticsLayer::new(Arc::clone(bus));

    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .with(diagnostics)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .with(diagnostics)
            .init();
    }
}

fn print_plan(config: &TableConfig) {
    let cpus = sched::cpu_count();
    let policy = sched::SchedulingPolicy::new(config.scheduling.clone());
    println!("cpus:        {cpus}");
    println!(
        "policy:      {}",
        sched::current_policy().unwrap_or("unknown")
    );
    for (name, target) in [
        ("motion", policy.target_for(WorkClass::RealTime, cpus)),
        ("auxiliary", policy.auxiliary_target(cpus)),
        ("background", policy.target_for(WorkClass::Background, cpus)),
    ] {
        let cores = match &target.cpu_set {
            Some(set) => format!("{set:?}"),
            None => "unpinned".to_string(),
        };
        println!("{name:<12} {:?} on {cores}", target.priority);
    }
    println!(
        "pool:        {} workers",
        pool_size(cpus, config.pool.max_workers)
    );
}

fn home(ctx: &ControlContext) -> Result<(), Box<dyn Error>> {
    ctx.elevate_current_thread();
    let mut link = ctx.motion_link();
    link.open_serial(&ctx.config().serial)?;
    let outcome = link.home()?;
    link.shutdown();
    println!(
        "homed (sensor {})",
        if outcome.sensor_confirmed { "confirmed" } else { "not confirmed" }
    );
    Ok(())
}

fn draw(
    ctx: &ControlContext,
    patterns: &[PathBuf],
    home_first: bool,
) -> Result<(), Box<dyn Error>> {
    // Parse on the pool before elevating so the workers start from a normal thread.
    let pool = ctx.start_pool()?;
    let handles = patterns
        .iter()
        .map(|path| pool.submit(Task::ParsePattern { path: path.clone() }))
        .collect::<Result<Vec<TaskHandle>, _>>()?;
    let mut parsed = Vec::with_capacity(handles.len());
    for (path, handle) in patterns.iter().zip(handles) {
        match handle.wait()? {
            TaskOutput::Pattern(pattern) => parsed.push((path, pattern)),
            other => return Err(format!("unexpected worker output {other:?}").into()),
        }
    }

    let mut link = ctx.motion_link();
    let control = link.control();
    control.clear();
    // Installed first: the handler thread must not inherit the RT policy.
    let handler = control.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler.request_stop();
    })?;
    ctx.elevate_current_thread();

    link.open_serial(&ctx.config().serial)?;
    if home_first {
        link.home()?;
    }

    for (path, ParsedPattern { coordinates, skipped }) in &parsed {
        if control.stop_requested() {
            info!("Drawing stopped by request");
            break;
        }
        if *skipped > 0 {
            warn!("{}: {skipped} malformed lines skipped", path.display());
        }
        info!("Drawing {} ({} coordinates)", path.display(), coordinates.len());
        let report = link.stream(coordinates)?;
        if report.stopped {
            info!("Drawing stopped by request");
            break;
        }
    }
    link.shutdown();
    Ok(())
}
