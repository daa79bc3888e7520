//! RangeLab Core — LP position valuation, fee accrual, and exit simulation.
//!
//! This crate contains the heart of the TP/SL replay engine:
//! - Domain types (positions, liquidity shapes, samples, outcomes)
//! - Position valuation curve per liquidity distribution
//! - Fee accrual with data-driven distance curves
//! - Per-position valuation timeline, built once and replayed per cell
//! - Exit state machine with out-of-range grace countdown
//! - Timeline provider boundary with explicit gap policy

pub mod data;
pub mod domain;
pub mod engine;
pub mod fees;
pub mod rng;
pub mod valuation;
