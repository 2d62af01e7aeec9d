use crate::closer::{AutoCloser, PassSummary};
use crate::errors::AppResult;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Periodic trigger for closing passes.
///
/// At most one pass is in flight at a time: a tick that fires while the
/// previous pass is still running is skipped, not queued. The same guard
/// covers the operational `trigger_now` entry point.
#[derive(Clone)]
pub struct ClosingScheduler {
    closer: Arc<AutoCloser>,
    tick_interval: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl ClosingScheduler {
    pub fn new(closer: Arc<AutoCloser>, tick_interval: Duration) -> Self {
        Self {
            closer,
            tick_interval,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                scheduler.run_tick();
            }
        })
    }

    fn run_tick(&self) {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("previous closing pass still running, skipping tick");
            return;
        };
        match self.closer.run_pass(Utc::now()) {
            Ok(summary) => {
                tracing::info!(
                    closed = summary.users_closed,
                    skipped = summary.users_skipped,
                    failed = summary.users_failed,
                    created = summary.records_created,
                    "closing pass finished"
                );
            }
            Err(error) => {
                tracing::warn!(error = %error, "closing pass failed");
            }
        }
    }

    /// Runs one pass immediately, waiting out any in-flight pass first.
    /// Safe to call repeatedly; passes are idempotent.
    pub async fn trigger_now(&self) -> AppResult<PassSummary> {
        let _guard = self.in_flight.lock().await;
        self.closer.run_pass(Utc::now())
    }
}
