//! Analysis modules.
//!
//! The aggregation engine that turns shift records into KPIs and weekly pay.

pub mod aggregator;

pub use aggregator::*;
