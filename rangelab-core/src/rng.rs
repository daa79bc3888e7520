//! Deterministic seed hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(position_id, stream)` pair. Sub-seeds are derived via BLAKE3 hashing,
//! independently of thread scheduling order, so generated data is identical
//! regardless of how a batch is parallelized.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::PositionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for one position and named stream.
    pub fn sub_seed(&self, position_id: &PositionId, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(position_id.as_str().as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update(&[0]);
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, position_id: &PositionId, stream: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(position_id, stream))
    }
}
