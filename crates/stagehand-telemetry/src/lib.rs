pub mod stage_metrics;

pub use stage_metrics::*;
