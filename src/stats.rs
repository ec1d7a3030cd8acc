//! Thread-safe statistics aggregation.
//!
//! The engine serializes writes (one auction at a time), but the control
//! plane snapshots concurrently, so everything sits behind one RwLock.
//! Averages are computed at snapshot time to keep the write path free of
//! allocation and division.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;

use crate::auction::AuctionOutcome;
use crate::dispatcher::BidderOutcome;

#[derive(Debug, Default)]
struct DspCounters {
    requests: u64,
    bids: u64,
    wins: u64,
    no_bids: u64,
    errors: u64,
    total_latency: Duration,
}

#[derive(Debug, Default)]
struct Totals {
    requests: u64,
    bids: u64,
    wins: u64,
    no_bids: u64,
    errors: u64,
    revenue: f64,
    dsps: HashMap<String, DspCounters>,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_bids: u64,
    pub total_wins: u64,
    pub total_no_bids: u64,
    pub total_errors: u64,
    pub total_revenue: f64,
    pub dsps: HashMap<String, DspStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DspStats {
    pub requests: u64,
    pub bids: u64,
    pub wins: u64,
    pub no_bids: u64,
    pub errors: u64,
    /// Mean attempt latency in fractional milliseconds.
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    state: RwLock<Totals>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one completed auction plus the raw per-endpoint outcomes.
    ///
    /// Per-endpoint `bids` counts auction-eligible bids (from the
    /// outcome), not raw bids below the floor.
    pub fn record_auction(&self, outcome: &AuctionOutcome, results: &[BidderOutcome]) {
        let mut state = self.state.write().expect("stats lock poisoned");

        state.requests += 1;
        state.bids += outcome.eligible_bids.len() as u64;

        match &outcome.winner {
            Some(winner) => {
                state.wins += 1;
                state.revenue += winner.clearing_price;
                state.dsps.entry(winner.dsp.clone()).or_default().wins += 1;
            }
            None => state.no_bids += 1,
        }

        let mut errors = 0;
        for result in results {
            let is_error = result.is_error();
            let is_no_bid = matches!(&result.result, Ok(r) if r.is_no_bid());
            let dsp = state.dsps.entry(result.dsp.clone()).or_default();
            dsp.requests += 1;
            dsp.total_latency += result.latency;
            if is_error {
                dsp.errors += 1;
                errors += 1;
            } else if is_no_bid {
                dsp.no_bids += 1;
            }
        }
        state.errors += errors;

        for eligible in &outcome.eligible_bids {
            state.dsps.entry(eligible.dsp.clone()).or_default().bids += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.state.read().expect("stats lock poisoned");

        let dsps = state
            .dsps
            .iter()
            .map(|(name, counters)| {
                let avg_latency_ms = if counters.requests > 0 {
                    counters.total_latency.as_secs_f64() * 1000.0 / counters.requests as f64
                } else {
                    0.0
                };
                (
                    name.clone(),
                    DspStats {
                        requests: counters.requests,
                        bids: counters.bids,
                        wins: counters.wins,
                        no_bids: counters.no_bids,
                        errors: counters.errors,
                        avg_latency_ms,
                    },
                )
            })
            .collect();

        StatsSnapshot {
            total_requests: state.requests,
            total_bids: state.bids,
            total_wins: state.wins,
            total_no_bids: state.no_bids,
            total_errors: state.errors,
            total_revenue: state.revenue,
            dsps,
        }
    }

    pub fn reset(&self) {
        let mut state = self.state.write().expect("stats lock poisoned");
        *state = Totals::default();
    }
}
