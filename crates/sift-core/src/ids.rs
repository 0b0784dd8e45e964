//! ID prefix constants.
//!
//! Every entity ID is `{prefix}-{8 hex chars}`, generated by the store.

pub const PREFIX_PROJECT: &str = "prj";
pub const PREFIX_WORK: &str = "wrk";
pub const PREFIX_STUDY: &str = "stu";
pub const PREFIX_DECISION: &str = "dec";
pub const PREFIX_CONFLICT: &str = "cfl";
pub const PREFIX_RESOLUTION: &str = "res";
pub const PREFIX_CALIBRATION: &str = "cal";
pub const PREFIX_CALIBRATION_DECISION: &str = "cdc";
pub const PREFIX_AUDIT: &str = "aud";

/// All prefixes, for exhaustive tests.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_PROJECT,
    PREFIX_WORK,
    PREFIX_STUDY,
    PREFIX_DECISION,
    PREFIX_CONFLICT,
    PREFIX_RESOLUTION,
    PREFIX_CALIBRATION,
    PREFIX_CALIBRATION_DECISION,
    PREFIX_AUDIT,
];
