pub mod snapshot;
pub mod stations;
pub mod ticker;
pub mod types;
