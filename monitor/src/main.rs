use anyhow::Context;
use clap::Parser;
use dashboard::bridge::DashboardBridge;
use dashboard::model::{DetectionView, DetectionsResponse};
use log::{info, warn};
use skyripcore::ingest::{KismetIngestor, KismetTail};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::MonitorConfig;
use workflow::runner::{Runner, SharedState, TickOutcome};
use workflow::tasks::{run_ingest, run_ticks, stopped, StopSignal};

mod dashboard;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "SkyRipper simulated spectrum monitor")]
struct Args {
    /// YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Override the scanner seed from the config
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many ticks (0 runs until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    ticks: u64,
    /// Run ticks back-to-back and print the latest detections as JSON
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Number of detections printed by --offline
    #[arg(long, default_value_t = 15)]
    limit: usize,
    /// Print every detection as a JSON line
    #[arg(long, default_value_t = false)]
    console: bool,
    /// Serve the dashboard API
    #[arg(long, default_value_t = false)]
    serve: bool,
}

const OFFLINE_DEFAULT_TICKS: u64 = 120;

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn print_console(outcome: &TickOutcome) {
    for event in &outcome.events {
        match serde_json::to_string(&DetectionView::from(event)) {
            Ok(line) => println!("{}", line),
            Err(err) => warn!("cannot render detection: {}", err),
        }
    }
}

fn run_offline(
    config: &MonitorConfig,
    state: &SharedState,
    mut runner: Runner,
    ticks: u64,
    limit: usize,
    console: bool,
) -> anyhow::Result<()> {
    let ingestor = KismetIngestor::new(Arc::clone(&state.devices));
    match KismetTail::new(&config.kismet.data_path).poll(&ingestor, unix_now()) {
        Ok(report) => state.metrics.record_kismet(report.ingested, report.skipped),
        Err(err) => warn!("kismet ingest failed: {}", err),
    }

    for _ in 0..ticks {
        let outcome = runner.tick();
        if console {
            print_console(&outcome);
        }
    }
    runner.finish();

    let report = DetectionsResponse::from_events(&state.detections.latest(limit));
    let rendered = serde_json::to_string_pretty(&report).context("rendering detections")?;
    println!("{}", rendered);
    info!(
        "offline run -> ticks {}, detections {}, classifier {}",
        runner.ticks_run(),
        state.metrics.snapshot().detections,
        runner.classifier_name()
    );
    Ok(())
}

async fn run_live(
    config: MonitorConfig,
    state: SharedState,
    runner: Runner,
    args: &Args,
) -> anyhow::Result<()> {
    let (signal_handle, stop) = StopSignal::new();
    let bridge = DashboardBridge::new(
        state.clone(),
        runner.classifier_name(),
        config.correlation.geofence,
        config.api.limit,
    );

    let server = if args.serve {
        let (bound, server) = bridge.serve(config.api.bind, stopped(signal_handle.subscribe()))?;
        info!("dashboard API listening on http://{}", bound);
        Some(tokio::spawn(server))
    } else {
        None
    };

    let ingestor = Arc::new(KismetIngestor::new(Arc::clone(&state.devices)));
    let ingest = tokio::spawn(run_ingest(
        ingestor,
        KismetTail::new(&config.kismet.data_path),
        Duration::from_secs_f64(config.kismet.poll_seconds),
        Arc::clone(&state.metrics),
        signal_handle.subscribe(),
        unix_now,
    ));

    let console = args.console;
    let max_ticks = (args.ticks > 0).then_some(args.ticks);
    let mut pipeline = tokio::spawn(run_ticks(
        runner,
        Duration::from_secs_f64(config.scanner.tick_seconds),
        max_ticks,
        stop,
        move |outcome| {
            if console {
                print_console(outcome);
            }
        },
    ));

    info!("monitor running (Ctrl+C to stop)");
    let runner = tokio::select! {
        finished = &mut pipeline => {
            signal_handle.stop();
            finished.context("joining pipeline task")?
        }
        interrupted = signal::ctrl_c() => {
            interrupted.context("awaiting Ctrl+C")?;
            info!("stop requested");
            signal_handle.stop();
            pipeline.await.context("joining pipeline task")?
        }
    };

    ingest.await.context("joining kismet task")?;
    if let Some(server) = server {
        server.await.context("joining dashboard server")?;
    }

    info!(
        "monitor stopped after {} tick(s); metrics {:?}",
        runner.ticks_run(),
        state.metrics.snapshot()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = MonitorConfig::load(&args.config)?.with_seed(args.seed);
    let start_time = config.scanner.start_time.unwrap_or_else(unix_now);
    let state = SharedState::new(&config);
    let runner = Runner::new(&config, start_time, state.clone());
    info!(
        "scanning {:?} MHz with {} (seed {})",
        config.scanner.frequencies(),
        runner.classifier_name(),
        config.scanner.seed
    );

    if args.offline {
        let ticks = if args.ticks > 0 {
            args.ticks
        } else {
            OFFLINE_DEFAULT_TICKS
        };
        return run_offline(&config, &state, runner, ticks, args.limit, args.console);
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating monitor runtime")?;
    runtime.block_on(run_live(config, state, runner, &args))
}
