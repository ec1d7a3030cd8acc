//! The simulation engine: a rate-paced loop driving
//! generator → dispatcher → auction → stats.
//!
//! The loop produces at most one in-flight tick at a time. A tick that
//! outlasts the next interval simply delays it (missed fires coalesce),
//! which keeps steady-state memory bounded to one in-flight request no
//! matter how slow the DSPs are.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auction::Auction;
use crate::dispatcher::Dispatch;
use crate::openrtb::BidRequest;
use crate::stats::StatsCollector;

pub const DEFAULT_RPS: u32 = 100;
/// Floor applied when the generated impression carries none.
pub const DEFAULT_BID_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("engine did not stop within the shutdown deadline")]
    ShutdownTimeout,
}

/// Bid request source. Implementations must be callable from any task;
/// the loop is the only producer in practice.
pub trait Generator: Send + Sync {
    fn generate(&self) -> BidRequest;
    fn scenario_name(&self) -> &str;
}

#[derive(Default)]
struct LoopState {
    running: bool,
    cancel: Option<CancellationToken>,
    // Completion signal for the worker. Callers clone the receiver, so
    // any number of stop/shutdown calls can wait on the same drain.
    done: Option<watch::Receiver<bool>>,
}

pub struct Engine {
    generator: Arc<dyn Generator>,
    dispatcher: Arc<dyn Dispatch>,
    auction: Arc<dyn Auction>,
    stats: Arc<StatsCollector>,
    rps: u32,
    bid_floor: f64,
    state: Mutex<LoopState>,
}

impl Engine {
    pub fn new(
        generator: Arc<dyn Generator>,
        dispatcher: Arc<dyn Dispatch>,
        auction: Arc<dyn Auction>,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            auction,
            stats,
            rps: DEFAULT_RPS,
            bid_floor: DEFAULT_BID_FLOOR,
            state: Mutex::new(LoopState::default()),
        }
    }

    pub fn with_rps(mut self, rps: u32) -> Self {
        self.rps = rps;
        self
    }

    pub fn with_bid_floor(mut self, floor: f64) -> Self {
        self.bid_floor = floor;
        self
    }

    /// Start the simulation loop. Fails while a previous run is still
    /// active, including the window where it is draining after a stop
    /// signal.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        if state.running {
            return Err(EngineError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            generator: Arc::clone(&self.generator),
            dispatcher: Arc::clone(&self.dispatcher),
            auction: Arc::clone(&self.auction),
            stats: Arc::clone(&self.stats),
            rps: self.rps,
            bid_floor: self.bid_floor,
        };
        let (done_tx, done_rx) = watch::channel(false);
        let worker_cancel = cancel.clone();
        tokio::spawn(async move {
            worker.run(worker_cancel).await;
            // The last tick has fully landed in stats by this point.
            let _ = done_tx.send(true);
        });

        state.running = true;
        state.cancel = Some(cancel);
        state.done = Some(done_rx);
        info!(
            rps = self.rps,
            scenario = self.generator.scenario_name(),
            "simulation started"
        );
        Ok(())
    }

    /// Stop the loop and wait for the tick in progress, if any, to
    /// finish. Safe to call on an idle engine, and safe for any number
    /// of concurrent callers: each waits for the same drain.
    pub async fn stop(&self) {
        let (cancel, done) = {
            let state = self.state.lock().expect("engine lock poisoned");
            (state.cancel.clone(), state.done.clone())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        let Some(done) = done else {
            return;
        };
        drained(done.clone()).await;
        self.finish_run(&done);
    }

    /// Stop the loop, waiting no longer than `deadline` for it to drain.
    /// On timeout the engine stays in the stopping state; the loop still
    /// exits when its current tick completes, and a later `stop` or
    /// `shutdown` finishes the bookkeeping.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), EngineError> {
        let (cancel, done) = {
            let state = self.state.lock().expect("engine lock poisoned");
            (state.cancel.clone(), state.done.clone())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        let Some(done) = done else {
            return Ok(());
        };

        match tokio::time::timeout(deadline, drained(done.clone())).await {
            Ok(()) => {
                self.finish_run(&done);
                Ok(())
            }
            Err(_) => Err(EngineError::ShutdownTimeout),
        }
    }

    /// Clear the bookkeeping for the run whose completion signal was just
    /// drained. Skipped when another caller already cleared it or a new
    /// run has started since, so a racing stop can never clobber a fresh
    /// start's state.
    fn finish_run(&self, done: &watch::Receiver<bool>) {
        let mut state = self.state.lock().expect("engine lock poisoned");
        let matches = state
            .done
            .as_ref()
            .is_some_and(|current| current.same_channel(done));
        if matches {
            state.running = false;
            state.cancel = None;
            state.done = None;
            info!("simulation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("engine lock poisoned").running
    }
}

/// Wait until the worker signals completion. A dropped sender (worker
/// panic) counts as drained; there is nothing left to wait for.
async fn drained(mut done: watch::Receiver<bool>) {
    while !*done.borrow() {
        if done.changed().await.is_err() {
            break;
        }
    }
}

/// The loop half of the engine, owning clones of every collaborator so it
/// can outlive the caller's borrow.
struct Worker {
    generator: Arc<dyn Generator>,
    dispatcher: Arc<dyn Dispatch>,
    auction: Arc<dyn Auction>,
    stats: Arc<StatsCollector>,
    rps: u32,
    bid_floor: f64,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        let period = Duration::from_secs(1) / self.rps.max(1);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.tick(&cancel).await,
            }
        }
    }

    /// One full cycle. Never preempted mid-way: a stop signal observed
    /// during dispatch still lets auction and stats run for this tick.
    async fn tick(&self, cancel: &CancellationToken) {
        let request = self.generator.generate();

        let bid_floor = request
            .imp
            .first()
            .map(|imp| imp.bidfloor)
            .filter(|floor| *floor > 0.0)
            .unwrap_or(self.bid_floor);

        let results = self.dispatcher.dispatch(cancel, &request).await;
        let outcome = self.auction.run(&request.id, bid_floor, &results);

        debug!(
            request_id = %outcome.request_id,
            eligible = outcome.eligible_bids.len(),
            winner = outcome.winner.as_ref().map(|w| w.dsp.as_str()),
            "auction complete"
        );

        self.stats.record_auction(&outcome, &results);
    }
}
