//! Bid request generation.
//!
//! Content comes from a pluggable [`Scenario`]; the generator itself only
//! stamps process-unique request ids and applies engine-level overrides.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Generator;
use crate::openrtb::{AuctionType, BidRequest};

/// A bid request content strategy. Implementations own their RNG and must
/// be callable from any task.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request_id: String) -> BidRequest;
}

pub struct RequestGenerator {
    scenario: Box<dyn Scenario>,
    counter: AtomicU64,
    tmax_ms: i64,
    auction_type: AuctionType,
}

impl RequestGenerator {
    pub fn new(scenario: Box<dyn Scenario>) -> Self {
        Self {
            scenario,
            counter: AtomicU64::new(0),
            tmax_ms: 100,
            auction_type: AuctionType::FirstPrice,
        }
    }

    pub fn with_tmax_ms(mut self, tmax_ms: i64) -> Self {
        self.tmax_ms = tmax_ms;
        self
    }

    pub fn with_auction_type(mut self, auction_type: AuctionType) -> Self {
        self.auction_type = auction_type;
        self
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("req-{n:08}")
    }
}

impl Generator for RequestGenerator {
    fn generate(&self) -> BidRequest {
        let mut request = self.scenario.generate(self.next_id());
        if self.tmax_ms > 0 {
            request.tmax = self.tmax_ms;
        }
        request.at = self.auction_type;
        request
    }

    fn scenario_name(&self) -> &str {
        self.scenario.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::{Banner, Imp};
    use std::collections::HashSet;

    struct StubScenario;

    impl Scenario for StubScenario {
        fn name(&self) -> &str {
            "stub"
        }

        fn generate(&self, request_id: String) -> BidRequest {
            BidRequest {
                id: request_id,
                imp: vec![Imp {
                    id: "imp-1".to_string(),
                    banner: Some(Banner::default()),
                    bidfloor: 1.0,
                    ..Default::default()
                }],
                tmax: 50,
                ..Default::default()
            }
        }
    }

    #[test]
    fn ids_are_unique_and_sequential() {
        let generator = RequestGenerator::new(Box::new(StubScenario));
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generator.generate().id));
        }
    }

    #[test]
    fn ids_use_the_zero_padded_format() {
        let generator = RequestGenerator::new(Box::new(StubScenario));
        assert_eq!(generator.generate().id, "req-00000001");
        assert_eq!(generator.generate().id, "req-00000002");
    }

    #[test]
    fn overrides_tmax_and_auction_type() {
        let generator = RequestGenerator::new(Box::new(StubScenario))
            .with_tmax_ms(250)
            .with_auction_type(AuctionType::SecondPrice);
        let request = generator.generate();
        assert_eq!(request.tmax, 250);
        assert_eq!(request.at, AuctionType::SecondPrice);
    }

    #[test]
    fn zero_tmax_override_keeps_the_scenario_value() {
        let generator = RequestGenerator::new(Box::new(StubScenario)).with_tmax_ms(0);
        assert_eq!(generator.generate().tmax, 50);
    }

    #[test]
    fn exposes_the_scenario_name() {
        let generator = RequestGenerator::new(Box::new(StubScenario));
        assert_eq!(generator.scenario_name(), "stub");
    }

    #[test]
    fn concurrent_generation_never_duplicates_ids() {
        use std::sync::Arc;

        let generator = Arc::new(RequestGenerator::new(Box::new(StubScenario)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let generator = Arc::clone(&generator);
            handles.push(std::thread::spawn(move || {
                (0..250)
                    .map(|_| generator.generate().id)
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("generator thread panicked") {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
