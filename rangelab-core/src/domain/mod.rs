//! Domain types for RangeLab

pub mod ids;
pub mod outcome;
pub mod position;
pub mod sample;

pub use ids::{PositionId, StrategyInstanceId};
pub use outcome::{ExitType, InsufficientData, SimulationResult};
pub use position::{
    CloseReason, Distribution, FeeHistory, LiquidityShape, OutOfRangeRule, Position,
    PositionError,
};
pub use sample::Sample;
