//! Timeline boundary: provider trait, horizon, gap handling, sources.

pub mod gaps;
pub mod horizon;
pub mod memory;
pub mod provider;
pub mod synthetic;

pub use gaps::{GapDecision, GapPolicy};
pub use horizon::PostCloseHorizon;
pub use memory::InMemoryTimelines;
pub use provider::{clip_to_window, TimelineError, TimelineProvider, TimelineRequest};
pub use synthetic::SyntheticTimelines;
