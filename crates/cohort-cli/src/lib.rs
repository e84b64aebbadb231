//! CLI library components for cohort extraction.

pub mod logging;
pub mod pipeline;
