pub mod dedup;
pub mod guardrails;
pub mod probability;
pub mod types;
pub mod weather_edge;
