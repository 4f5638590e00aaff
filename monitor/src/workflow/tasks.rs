//! Periodic loops driving the pipeline and the Kismet ingest.
//!
//! Both loops watch a shared stop flag. A stop request is only observed
//! between iterations, so the tick or poll in progress always completes.

use log::{info, warn};
use skyripcore::ingest::{KismetIngestor, KismetTail};
use skyripcore::telemetry::MetricsRecorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::workflow::runner::{Runner, TickOutcome};

/// Sending side of the cooperative stop flag.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolves once a stop has been requested or the sender is gone.
pub async fn stopped(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow()
}

/// Runs pipeline ticks every `period` until stopped or `max_ticks` is reached,
/// then discards any unfinished bursts and hands the runner back.
pub async fn run_ticks<F>(
    mut runner: Runner,
    period: Duration,
    max_ticks: Option<u64>,
    mut stop: watch::Receiver<bool>,
    mut on_tick: F,
) -> Runner
where
    F: FnMut(&TickOutcome) + Send,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if stop_requested(&stop) || max_ticks.is_some_and(|max| runner.ticks_run() >= max) {
            break;
        }
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {
                let outcome = runner.tick();
                on_tick(&outcome);
            }
        }
    }

    runner.finish();
    info!("pipeline stopped after {} tick(s)", runner.ticks_run());
    runner
}

/// Polls the Kismet export every `period` until stopped.
pub async fn run_ingest<C>(
    ingestor: Arc<KismetIngestor>,
    mut tail: KismetTail,
    period: Duration,
    metrics: Arc<MetricsRecorder>,
    mut stop: watch::Receiver<bool>,
    clock: C,
) -> KismetTail
where
    C: Fn() -> f64 + Send,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if stop_requested(&stop) {
            break;
        }
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {
                match tail.poll(&ingestor, clock()) {
                    Ok(report) => metrics.record_kismet(report.ingested, report.skipped),
                    Err(err) => warn!("kismet poll failed: {}", err),
                }
            }
        }
    }

    info!(
        "kismet ingest stopped ({} malformed line(s) skipped)",
        ingestor.skipped_total()
    );
    tail
}
