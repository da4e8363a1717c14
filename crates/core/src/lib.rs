#![forbid(unsafe_code)]

//! Pure domain logic for quiz analysis: accuracy aggregation, reconciliation
//! against historical statistics, improvement evaluation and roadmap progress.

pub mod accuracy;
pub mod analysis;
pub mod grading;
pub mod improvement;
pub mod model;
pub mod practice;
pub mod reconcile;
pub mod roadmap;
pub mod time;

pub use time::Clock;
