pub mod calculator;
pub mod error;
pub mod grouper;
pub mod types;
