//! Fair-value estimation and hedged allocation for integer-settled
//! temperature contracts.
//!
//! Re-exports all modules for the binary and integration tests.

pub mod config;
pub mod data;
pub mod engine;
pub mod hedge;
pub mod monitoring;
pub mod strategies;
