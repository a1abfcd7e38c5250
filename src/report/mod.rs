//! Report building and rendering.

pub mod builder;
pub mod generator;

pub use builder::{week_start, Built, Dashboard, ReportBuilder, ReportStatus};
pub use generator::*;
