//! # sift-core
//!
//! Core types and pure screening logic for Sift.
//!
//! This crate provides the foundational types shared across all Sift crates:
//! - Entity structs for projects, studies, decisions, conflicts and calibration rounds
//! - Status enums with state machine transitions
//! - ID prefix constants
//! - Consensus evaluation over recorded decisions
//! - Cohen's Kappa and pairwise agreement statistics
//! - Priority scoring and screening queue ordering
//! - Audit detail sub-types
//! - Cross-cutting error types
//!
//! Nothing in here performs I/O; persistence lives in `sift-db`.

pub mod audit_detail;
pub mod consensus;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod priority;
pub mod queue;
pub mod reliability;
