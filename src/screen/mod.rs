//! Screening module
//!
//! Decides which validated bars are gap-up candidates worth simulating

mod filter;

pub use filter::{passes, FilterResult, ScreenFilter, ScreenReject, ScreeningCriteria, ScreeningMode};
