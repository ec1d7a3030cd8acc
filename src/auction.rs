//! Auction resolution over dispatcher outcomes.
//!
//! Only first-price is implemented; the [`Auction`] trait is the slot
//! where second-price or reserve-price variants would plug in.

use std::sync::Arc;

use tracing::warn;

use crate::dispatcher::BidderOutcome;
use crate::openrtb::Bid;

/// An eligible bid together with the endpoint that produced it.
#[derive(Debug, Clone)]
pub struct EndpointBid {
    pub bid: Bid,
    pub dsp: String,
}

/// The winning bid. Only present when at least one bid survived the floor
/// filter, so an outcome without a winner can never surface a clearing
/// price.
#[derive(Debug, Clone)]
pub struct Winner {
    pub bid: Bid,
    pub dsp: String,
    pub clearing_price: f64,
}

#[derive(Debug, Clone)]
pub struct AuctionOutcome {
    pub request_id: String,
    /// Bids that passed the floor filter, in endpoint order then bid
    /// order within each response.
    pub eligible_bids: Vec<EndpointBid>,
    pub winner: Option<Winner>,
}

pub trait Auction: Send + Sync {
    fn run(&self, request_id: &str, bid_floor: f64, outcomes: &[BidderOutcome]) -> AuctionOutcome;
}

/// First-price sealed auction: the highest bidder wins and pays exactly
/// their bid.
pub struct FirstPrice;

impl Auction for FirstPrice {
    fn run(&self, request_id: &str, bid_floor: f64, outcomes: &[BidderOutcome]) -> AuctionOutcome {
        let mut eligible: Vec<EndpointBid> = Vec::new();
        for outcome in outcomes {
            let Ok(response) = &outcome.result else {
                continue;
            };
            for bid in response.bids() {
                if bid.price >= bid_floor {
                    eligible.push(EndpointBid {
                        bid: bid.clone(),
                        dsp: outcome.dsp.clone(),
                    });
                }
            }
        }

        // Strictly-greater comparison keeps the earliest bid on ties.
        let winner = if eligible.is_empty() {
            None
        } else {
            let mut highest = 0;
            for (idx, entry) in eligible.iter().enumerate().skip(1) {
                if entry.bid.price > eligible[highest].bid.price {
                    highest = idx;
                }
            }
            let best = &eligible[highest];
            Some(Winner {
                bid: best.bid.clone(),
                dsp: best.dsp.clone(),
                clearing_price: best.bid.price,
            })
        };

        AuctionOutcome {
            request_id: request_id.to_string(),
            eligible_bids: eligible,
            winner,
        }
    }
}

/// Resolve the configured auction type. Unknown types fall back to
/// first-price, the only strategy shipped today.
pub fn by_kind(kind: &str) -> Arc<dyn Auction> {
    match kind {
        "first_price" => Arc::new(FirstPrice),
        other => {
            warn!(auction_type = other, "unknown auction type, using first_price");
            Arc::new(FirstPrice)
        }
    }
}
