//! Concurrent fan-out of one bid request to every configured DSP.
//!
//! Each endpoint gets its own task; results come back through a bounded
//! channel and land in a slot array keyed by endpoint ordinal, so the
//! returned sequence always has one entry per endpoint in declaration
//! order no matter the completion order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{BidderClient, BidderError};
use crate::config::DspConfig;
use crate::openrtb::{BidRequest, BidResponse};

/// Per-endpoint result of dispatching one request.
#[derive(Debug, Clone)]
pub struct BidderOutcome {
    /// Logical endpoint name from the config.
    pub dsp: String,
    /// Wall-clock time of the attempt, up to completion or failure.
    pub latency: Duration,
    pub result: Result<BidResponse, BidderError>,
}

impl BidderOutcome {
    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }

    pub fn response(&self) -> Option<&BidResponse> {
        self.result.as_ref().ok()
    }
}

/// Fan-out seam. The engine talks to this trait so tests can script
/// outcomes without sockets.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        request: &BidRequest,
    ) -> Vec<BidderOutcome>;
}

pub struct Dispatcher {
    client: Arc<BidderClient>,
    dsps: Vec<DspConfig>,
    timeout: Duration,
}

impl Dispatcher {
    /// Build a dispatcher over the given endpoint list. The dispatcher
    /// fans out to every entry it is given; pass
    /// [`SimulatorConfig::enabled_dsps`](crate::config::SimulatorConfig::enabled_dsps)
    /// to restrict it to the enabled subset.
    pub fn new(dsps: Vec<DspConfig>, timeout: Duration) -> Self {
        Self {
            client: Arc::new(BidderClient::new()),
            dsps,
            timeout,
        }
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        request: &BidRequest,
    ) -> Vec<BidderOutcome> {
        let n = self.dsps.len();
        if n == 0 {
            return Vec::new();
        }

        let request = Arc::new(request.clone());
        let (tx, mut rx) = mpsc::channel::<(usize, BidderOutcome)>(n);

        for (idx, dsp) in self.dsps.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let request = Arc::clone(&request);
            let cancel = cancel.clone();
            let tx = tx.clone();
            let name = dsp.name.clone();
            let url = dsp.url.clone();
            let deadline = self.timeout;
            tokio::spawn(async move {
                let outcome = call_dsp(&client, &cancel, name, &url, &request, deadline).await;
                // The receiver may already be gone after cancellation;
                // late results are simply dropped.
                let _ = tx.send((idx, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<BidderOutcome>> = (0..n).map(|_| None).collect();
        let mut received = 0;
        while received < n {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some((idx, outcome)) => {
                        slots[idx] = Some(outcome);
                        received += 1;
                    }
                    None => break,
                },
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| BidderOutcome {
                    dsp: self.dsps[idx].name.clone(),
                    latency: Duration::ZERO,
                    result: Err(BidderError::Cancelled),
                })
            })
            .collect()
    }
}

async fn call_dsp(
    client: &BidderClient,
    cancel: &CancellationToken,
    name: String,
    url: &str,
    request: &BidRequest,
    deadline: Duration,
) -> BidderOutcome {
    if cancel.is_cancelled() {
        return BidderOutcome {
            dsp: name,
            latency: Duration::ZERO,
            result: Err(BidderError::Cancelled),
        };
    }

    let start = Instant::now();
    let result = client.post(url, request, deadline).await;
    let latency = start.elapsed();

    // A failure observed after cancellation is reported as cancelled, the
    // same way the upstream abort would have been.
    let result = match result {
        Err(_) if cancel.is_cancelled() => Err(BidderError::Cancelled),
        other => other,
    };

    BidderOutcome {
        dsp: name,
        latency,
        result,
    }
}
