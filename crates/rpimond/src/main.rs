//! rpimond - resource telemetry and remote control agent.
//!
//! Samples CPU, memory and per-process utilization from /proc, publishes the
//! deltas as text files, terminates processes over the CPU threshold, and
//! serves the authenticated command channel.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rpimon_core::actuator::{
    FileThermometer, KillSignaller, LineDriver, MemoryLines, ProcessSignaller, SysfsGpio,
    TerminationSignal,
};
use rpimon_core::channel::{ChannelConfig, CommandChannel, Dispatcher};
use rpimon_core::collector::procfs::logical_processors;
use rpimon_core::collector::{RealFs, Sampler, SourcePaths};
use rpimon_core::config::{
    DEFAULT_BIND, DEFAULT_INTERVAL_SECS, DEFAULT_LINES, DEFAULT_MAX_SESSIONS, DEFAULT_OUTPUT_DIR,
    DEFAULT_READ_TIMEOUT_SECS, LineSet, parse_key, parse_threshold,
};
use rpimon_core::model::CycleReport;
use rpimon_core::policy::EvictionPolicy;
use rpimon_core::protocol::AuthKey;
use rpimon_core::publish::SnapshotPublisher;
use rpimon_core::shared::SnapshotCell;

/// Resource telemetry and remote control agent.
#[derive(Parser)]
#[command(name = "rpimond", about = "Resource telemetry and remote control agent", version)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS)]
    interval: u64,

    /// Directory for the published ram/cpu/proc files.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Path to /sys filesystem.
    #[arg(long, default_value = "/sys")]
    sys_path: PathBuf,

    /// Directory holding passwd and group.
    #[arg(long, default_value = "/etc")]
    etc_path: PathBuf,

    /// Command channel bind address.
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Pre-shared key, hex (0x...) or decimal u32.
    #[arg(long, env = "RPIMON_KEY", default_value = "0x01020304", value_parser = parse_key, hide_env_values = true)]
    key: u32,

    /// Terminate processes using at least this percent of total CPU ticks (0-99).
    #[arg(long, env = "RPIMON_THRESHOLD", default_value = "90", value_parser = parse_threshold)]
    threshold: u8,

    /// Disable the CPU eviction policy.
    #[arg(long)]
    no_evict: bool,

    /// Signal used to terminate processes (abrt, term, kill).
    #[arg(long, default_value = "abrt")]
    signal: TerminationSignal,

    /// Digital lines the command channel may drive, e.g. "0-10,15-29".
    #[arg(long, default_value = DEFAULT_LINES)]
    lines: LineSet,

    /// Sysfs GPIO directory. Without it line commands only update an
    /// in-memory table.
    #[arg(long, value_name = "PATH")]
    gpio_root: Option<PathBuf>,

    /// Global number of line 0 in sysfs (512 on Pi 6.x kernels).
    #[arg(long, default_value_t = 0)]
    gpio_base: u32,

    /// File holding the external thermocouple reading in degrees Celsius.
    #[arg(long, value_name = "PATH")]
    ext_temp_path: Option<PathBuf>,

    /// Per-connection read timeout in seconds (0 disables).
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_SECS)]
    read_timeout: u64,

    /// Maximum concurrent command sessions.
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["rpimond", "rpimon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Sleeps for `interval` in 100ms slices, returning early once `running`
/// is cleared. Returns whether the agent is still running.
fn sleep_while_running(interval: Duration, running: &AtomicBool) -> bool {
    let slice = Duration::from_millis(100);
    let mut remaining = interval;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let sleep_time = remaining.min(slice);
        thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
    running.load(Ordering::SeqCst)
}

/// Describes a cycle report for logging.
fn describe_report(report: &CycleReport) -> String {
    let mut parts = vec![
        format!("{} processes", report.processes.len()),
        format!("{} cpu ticks", report.cpu.aggregate.total()),
        format!("{} kB available", report.ram.available_kb),
    ];
    if let Some(mc) = report.cpu.temperature_mc {
        parts.push(format!("soc {:.1}C", mc as f64 / 1000.0));
    }
    if let Some(celsius) = report.external_temp {
        parts.push(format!("ext {:.1}C", celsius));
    }
    parts.join(", ")
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("rpimond {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, output={}, proc={}, bind={}",
        args.interval,
        args.output_dir.display(),
        args.proc_path.display(),
        args.bind
    );

    let policy = if args.no_evict {
        info!("Eviction policy: disabled");
        None
    } else {
        match EvictionPolicy::new(args.threshold) {
            Ok(p) => {
                info!(
                    "Eviction policy: threshold={}%, signal={}",
                    p.percent(),
                    args.signal
                );
                Some(p)
            }
            Err(e) => {
                error!("Invalid eviction policy: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let publisher = SnapshotPublisher::new(&args.output_dir);
    if let Err(e) = publisher.prepare() {
        error!("Cannot prepare output directory: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Publishing to {}", publisher.dir().display());

    // Actuators
    let signaller: Arc<dyn ProcessSignaller> = Arc::new(KillSignaller::new(args.signal));
    let lines: Arc<dyn LineDriver> = match &args.gpio_root {
        Some(root) => {
            let gpio = SysfsGpio::new(root).with_base(args.gpio_base);
            let ready = gpio.prepare(&args.lines);
            info!(
                "Line driver: sysfs gpio at {} (base {}), {} of {} lines ready",
                root.display(),
                args.gpio_base,
                ready,
                args.lines.len()
            );
            Arc::new(gpio)
        }
        None => {
            warn!("Line driver: no --gpio-root given, line commands are not applied to hardware");
            Arc::new(MemoryLines::new())
        }
    };

    // Command channel
    let snapshots = SnapshotCell::new();
    let dispatcher = Arc::new(Dispatcher::new(
        lines,
        args.lines.clone(),
        signaller.clone(),
        snapshots.clone(),
    ));
    let channel_config = ChannelConfig {
        bind: args.bind.clone(),
        key: AuthKey::new(args.key),
        read_timeout: (args.read_timeout > 0).then(|| Duration::from_secs(args.read_timeout)),
        max_sessions: args.max_sessions,
    };
    let channel = match CommandChannel::bind(channel_config, dispatcher) {
        Ok(c) => c,
        Err(e) => {
            error!("Cannot bind command channel on {}: {}", args.bind, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Command channel: lines {}", args.lines);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let channel_running = running.clone();
    let channel_thread = match thread::Builder::new()
        .name("command-channel".into())
        .spawn(move || channel.run(channel_running))
    {
        Ok(h) => h,
        Err(e) => {
            error!("Cannot start command channel thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Sampler
    let paths = SourcePaths {
        proc: args.proc_path.clone(),
        sys: args.sys_path.clone(),
        etc: args.etc_path.clone(),
    };
    let mut sampler = Sampler::new(RealFs::new(), paths, logical_processors());
    if let Some(path) = &args.ext_temp_path {
        info!("External thermometer: {}", path.display());
        sampler = sampler.with_thermometer(Arc::new(FileThermometer::new(path)));
    }
    info!(
        "Sampler: {} cores, {} pids tracked",
        sampler.core_count(),
        sampler.tracked_pids()
    );

    let interval = Duration::from_secs(args.interval);

    info!("Starting sampling loop");

    // The baseline was just primed, so every cycle waits one interval first.
    while sleep_while_running(interval, &running) {
        match sampler.sample() {
            Ok(report) => {
                let report = Arc::new(report);
                info!("Cycle #{}: {}", report.cycle, describe_report(&report));
                snapshots.publish(report.clone());

                if let Some(policy) = &policy {
                    let outcome = policy.evaluate(&report, signaller.as_ref());
                    if outcome.candidates() > 0 {
                        info!(
                            "Eviction: threshold={} ticks, {} signalled, {} denied, {} vanished, {} failed",
                            outcome.threshold,
                            outcome.signalled.len(),
                            outcome.denied.len(),
                            outcome.vanished.len(),
                            outcome.failed.len()
                        );
                    } else {
                        debug!("Eviction: threshold={} ticks, no candidates", outcome.threshold);
                    }
                }

                if let Err(e) = publisher.publish(&report) {
                    error!("Failed to publish cycle: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to sample: {}", e);
            }
        }
    }

    // Graceful shutdown
    info!("Shutting down...");
    if channel_thread.join().is_err() {
        error!("Command channel thread panicked");
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
