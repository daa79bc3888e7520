//! Synthetic timeline generation for demos and benchmarks.
//!
//! Samples are a bounded random walk starting at the request's reference
//! price. They are clearly fake: runs that use them are tagged synthetic.

use chrono::Duration;
use rand::Rng;

use super::gaps::GapPolicy;
use super::provider::{TimelineError, TimelineProvider, TimelineRequest};
use crate::domain::Sample;
use crate::rng::SeedHierarchy;

#[derive(Debug, Clone)]
pub struct SyntheticTimelines {
    seeds: SeedHierarchy,
    interval: Duration,
    /// Maximum absolute per-sample return.
    step_return: f64,
    max_volume: f64,
}

impl SyntheticTimelines {
    pub fn new(master_seed: u64) -> Self {
        Self {
            seeds: SeedHierarchy::new(master_seed),
            interval: Duration::minutes(5),
            step_return: 0.004,
            max_volume: 5_000.0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_step_return(mut self, step_return: f64) -> Self {
        self.step_return = step_return;
        self
    }

    /// Generate samples covering the request window.
    pub fn generate(&self, request: &TimelineRequest) -> Vec<Sample> {
        let mut rng = self.seeds.rng_for(&request.position_id, &request.pool);
        let step = self.interval.max(Duration::seconds(1));

        let mut samples = Vec::new();
        let mut price = request.reference_price;
        let mut ts = request.start;
        while ts <= request.end {
            let open = price;
            let close = open * (1.0 + rng.gen_range(-self.step_return..=self.step_return));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..=self.step_return / 2.0));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..=self.step_return / 2.0));
            let volume = rng.gen_range(0.0..=self.max_volume);
            samples.push(Sample {
                timestamp: ts,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
            ts += step;
        }
        samples
    }
}

impl TimelineProvider for SyntheticTimelines {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        request: &TimelineRequest,
        gaps: &GapPolicy,
    ) -> Result<Vec<Sample>, TimelineError> {
        if !(request.reference_price.is_finite() && request.reference_price > 0.0) {
            return Err(TimelineError::PoolNotFound {
                pool: request.pool.clone(),
            });
        }
        let samples = self.generate(request);
        if samples.is_empty() {
            return Err(TimelineError::EmptyWindow {
                pool: request.pool.clone(),
                start: request.start,
                end: request.end,
            });
        }
        gaps.apply(samples)
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}
