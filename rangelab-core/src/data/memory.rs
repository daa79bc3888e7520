//! In-memory timeline provider, keyed by pool.

use std::collections::HashMap;

use super::gaps::GapPolicy;
use super::provider::{clip_to_window, TimelineError, TimelineProvider, TimelineRequest};
use crate::domain::Sample;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTimelines {
    pools: HashMap<String, Vec<Sample>>,
}

impl InMemoryTimelines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the samples held for `pool`.
    pub fn insert(&mut self, pool: impl Into<String>, samples: Vec<Sample>) {
        self.pools.insert(pool.into(), samples);
    }

    pub fn with_pool(mut self, pool: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.insert(pool, samples);
        self
    }
}

impl TimelineProvider for InMemoryTimelines {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(
        &self,
        request: &TimelineRequest,
        gaps: &GapPolicy,
    ) -> Result<Vec<Sample>, TimelineError> {
        let samples = self
            .pools
            .get(&request.pool)
            .ok_or_else(|| TimelineError::PoolNotFound {
                pool: request.pool.clone(),
            })?;

        let clipped = clip_to_window(samples, request);
        if clipped.is_empty() {
            return Err(TimelineError::EmptyWindow {
                pool: request.pool.clone(),
                start: request.start,
                end: request.end,
            });
        }
        gaps.apply(clipped)
    }
}
