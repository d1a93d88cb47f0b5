//! The production loop: pacing, fan-out, failure tracking, periodic flush.
//!
//! One loop runs per generator, as a single background task. It owns the
//! failure counters outright and reports through a watch channel, so nothing
//! it mutates is shared.

pub mod failures;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::connection::{LiveDestination, sorted_ids};
use crate::metrics::stats::{ProductionStats, StatsSender};
use crate::rate::RateController;
use crate::synth::Synthesizer;
use crate::transport::TransportError;
use failures::{FailureTracker, should_log};

/// Produced ticks between flush checkpoints.
pub const FLUSH_EVERY: u64 = 100;
/// Produced ticks between live-destination roster logs.
pub const ROSTER_EVERY: u64 = 500;
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after an iteration fails unexpectedly.
pub const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Cooperative stop signal shared between the loop and its controller.
#[derive(Clone, Default)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clears the flag and cuts short any pause in progress.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wake.notified() => {}
        }
    }
}

pub struct ProductionLoop {
    destinations: Arc<[LiveDestination]>,
    synth: Synthesizer,
    streams: Vec<String>,
    rate: RateController,
    run: RunFlag,
    stats: StatsSender,
    failures: FailureTracker,
    produced: u64,
    skipped: u64,
    sends_ok: u64,
    send_failures: u64,
    flush_failures: u64,
    last_flush: u64,
    started: Instant,
}

impl ProductionLoop {
    pub fn new(
        destinations: Arc<[LiveDestination]>,
        synth: Synthesizer,
        streams: Vec<String>,
        rate: RateController,
        run: RunFlag,
        stats: StatsSender,
    ) -> Self {
        Self {
            destinations,
            synth,
            streams,
            rate,
            run,
            stats,
            failures: FailureTracker::new(),
            produced: 0,
            skipped: 0,
            sends_ok: 0,
            send_failures: 0,
            flush_failures: 0,
            last_flush: 0,
            started: Instant::now(),
        }
    }

    /// Runs until the [`RunFlag`] is cleared. Iteration errors never end it.
    pub async fn run(mut self) {
        let count = self.destinations.len();
        info!("Starting event production for {count} destination(s)");
        info!("Event rate: {}", self.rate.describe(count));
        info!("Event streams: {:?}", self.streams);
        self.started = Instant::now();

        while self.run.is_running() {
            match self.tick().await {
                Ok(()) => self.run.pause(self.rate.interval()).await,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "Error in production loop");
                    self.run.pause(ERROR_PAUSE).await;
                }
            }
        }

        self.publish_stats();
        info!(produced = self.produced, "Event production stopped");
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let stream = self
            .synth
            .pick_stream(&self.streams)
            .ok_or_else(|| anyhow!("no event streams configured"))?;
        let Some(mut event) = self.synth.generate(stream) else {
            self.skipped += 1;
            self.publish_stats();
            return Ok(());
        };
        event.stamp();

        let key = event.partition_key().map(|k| k.as_bytes().to_vec());
        let value = event
            .encode()
            .with_context(|| format!("encoding {} event", event.event_type()))?;
        self.fan_out(key.as_deref(), value).await;
        self.produced += 1;

        if self.produced % FLUSH_EVERY == 0 {
            self.checkpoint().await;
        }
        self.publish_stats();
        Ok(())
    }

    /// Offers the same encoded event to every live destination.
    async fn fan_out(&mut self, key: Option<&[u8]>, value: Bytes) {
        let destinations = Arc::clone(&self.destinations);
        let results = join_all(
            destinations
                .iter()
                .map(|d| d.publisher().send(d.topic(), key, value.clone())),
        )
        .await;

        for (destination, result) in destinations.iter().zip(results) {
            let id = destination.id();
            match result {
                Ok(()) => {
                    self.sends_ok += 1;
                    if self.failures.record_success(id) {
                        debug!(destination = %id, "Destination recovered");
                    }
                }
                Err(e) => {
                    self.send_failures += 1;
                    let count = self.failures.record_failure(id);
                    if should_log(count) {
                        error!(
                            destination = %id,
                            failures = count,
                            error = %e,
                            "Error sending to {id} (failure #{count})"
                        );
                    }
                }
            }
        }
    }

    async fn checkpoint(&mut self) {
        let destinations = Arc::clone(&self.destinations);
        let flushes = join_all(destinations.iter().map(|d| async move {
            tokio::time::timeout(FLUSH_TIMEOUT, d.publisher().flush(FLUSH_TIMEOUT))
                .await
                .unwrap_or(Err(TransportError::Timeout))
        }))
        .await;

        for (destination, result) in destinations.iter().zip(flushes) {
            if let Err(e) = result {
                let id = destination.id();
                error!(destination = %id, error = %e, "Error flushing producer for {id}");
                self.flush_failures += 1;
                self.failures.record_failure(id);
            }
        }
        self.last_flush = self.produced;

        info!(
            "Produced {} events to {} destination(s)",
            self.produced,
            destinations.len()
        );
        if self.produced % ROSTER_EVERY == 0 {
            info!(
                "Active destinations: {}",
                sorted_ids(&destinations).join(", ")
            );
        }
        if !self.failures.is_empty() {
            warn!("Failed sends: {:?}", self.failures.snapshot());
        }
    }

    fn publish_stats(&self) {
        self.stats.send_replace(ProductionStats {
            produced: self.produced,
            skipped: self.skipped,
            sends_ok: self.sends_ok,
            send_failures: self.send_failures,
            flush_failures: self.flush_failures,
            last_flush: self.last_flush,
            destinations: self.destinations.len(),
            failing: self.failures.snapshot(),
            elapsed: self.started.elapsed(),
        });
    }
}
