pub mod engine;
pub mod executor;
pub mod result_aggregator;
pub mod target;
pub mod throttle;
