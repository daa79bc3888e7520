//! Simulation engine — valuation timeline, exit state machine, peak scan.
//!
//! Per position the engine runs in two phases:
//!
//! 1. Build: value every sample once (price curve + accrued fees).
//! 2. Replay: walk the immutable timeline once per TP/SL cell.

pub mod exit;
pub mod peaks;
pub mod timeline;

pub use exit::{ExitEvent, ExitState, ExitStateMachine, ExitThresholds};
pub use peaks::{analyze_peaks, Peak, PeakAnalysis, PeakWindow};
pub use timeline::{validate_samples, ValuationPoint, ValuationTimeline};
