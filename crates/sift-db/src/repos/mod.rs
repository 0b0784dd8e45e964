//! Engine operations, grouped by concern.
//!
//! Each module adds methods to `SiftService` via `impl SiftService` blocks.

pub mod audit;
pub mod calibration;
pub mod conflict;
pub mod decision;
pub mod project;
pub mod queue;
pub mod reliability;
pub mod signals;
pub mod stats;
pub mod study;
