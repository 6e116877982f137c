use anyhow::Context;
use clap::Parser;
use log::{error, info};
use mkidcore::schedule::{Shutdown, SystemClock};
use simulated::FpgaOptions;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::SettingsFile;
use workflow::runner::{append_summary, Runner};

mod simulated;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Scheduled sweep, retune and trigger acquisition")]
struct Args {
    /// Path to the YAML setting file
    #[arg(default_value = "./default.yaml")]
    path_yaml: PathBuf,
    /// Validate the settings and print the schedule without acquiring
    #[arg(long, default_value_t = false)]
    check: bool,
    /// Channel count reported by the simulated firmware
    #[arg(long, default_value_t = 16)]
    max_channels: usize,
    /// Mean wait between simulated trigger events
    #[arg(long, default_value_t = 500)]
    event_interval_ms: u64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Exit status after a second Ctrl+C, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Finish the current capture, then stop.
    Graceful,
    /// Leave now; partial trigger files stay on disk.
    Abort,
}

/// First press asks the run to stop; any later press aborts the process,
/// since a capture can block until its window closes.
fn on_interrupt(shutdown: &Shutdown) -> Interrupt {
    if shutdown.is_requested() {
        Interrupt::Abort
    } else {
        shutdown.request();
        Interrupt::Graceful
    }
}

/// Watches Ctrl+C from a detached signal thread for the whole run.
fn watch_ctrl_c(shutdown: Shutdown) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    thread::spawn(move || loop {
        if let Err(err) = runtime.block_on(signal::ctrl_c()) {
            error!("cannot listen for Ctrl+C: {err}");
            return;
        }
        match on_interrupt(&shutdown) {
            Interrupt::Graceful => {
                info!("Ctrl+C received, stopping after the current step (again to abort)")
            }
            Interrupt::Abort => {
                error!("Ctrl+C received again, aborting");
                process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    });
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = SettingsFile::load(&args.path_yaml)?;
    let config = settings
        .into_observation()
        .with_context(|| format!("validating {}", args.path_yaml.display()))?;

    let fpga = FpgaOptions {
        max_channels: args.max_channels,
        event_interval: Duration::from_millis(args.event_interval_ms),
        seed: args.seed,
        ..FpgaOptions::default()
    };
    let runner = Runner::new(config, fpga);

    if args.check {
        for line in runner.plan(&SystemClock::new(runner.config().zone)) {
            println!("{line}");
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    watch_ctrl_c(shutdown.clone())?;

    let summary = runner.execute(shutdown)?;
    let report_path = append_summary(&runner.config().base_dir, &summary)?;
    println!(
        "Run {} -> windows {}, triggers {}, report {}",
        if summary.interrupted { "interrupted" } else { "complete" },
        summary.windows.len(),
        summary.metrics.triggers,
        report_path.display()
    );

    Ok(())
}
