use schemars::schema_for;
use sift_core::entities::{
    AuditEntry, CalibrationDecision, CalibrationRound, Conflict, ConflictResolution, Decision,
    Member, PhaseStats, Project, Study, Work,
};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SchemaArgs;
use crate::output::output;

/// Type names accepted by `sift schema`.
pub const SCHEMA_TYPES: &[&str] = &[
    "project",
    "member",
    "study",
    "work",
    "decision",
    "conflict",
    "resolution",
    "calibration_round",
    "calibration_decision",
    "stats",
    "audit_entry",
];

/// Handle `sift schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&schema_value(&args.type_name)?, flags.format)
}

fn schema_value(type_name: &str) -> anyhow::Result<serde_json::Value> {
    let schema = match type_name.replace('-', "_").as_str() {
        "project" => schema_for!(Project),
        "member" => schema_for!(Member),
        "study" => schema_for!(Study),
        "work" => schema_for!(Work),
        "decision" => schema_for!(Decision),
        "conflict" => schema_for!(Conflict),
        "resolution" => schema_for!(ConflictResolution),
        "calibration_round" => schema_for!(CalibrationRound),
        "calibration_decision" => schema_for!(CalibrationDecision),
        "stats" => schema_for!(PhaseStats),
        "audit_entry" => schema_for!(AuditEntry),
        other => anyhow::bail!(
            "unknown schema type '{other}'; expected one of: {}",
            SCHEMA_TYPES.join(", ")
        ),
    };
    Ok(serde_json::to_value(schema)?)
}

#[cfg(test)]
mod tests {
    use super::{SCHEMA_TYPES, schema_value};

    #[test]
    fn every_listed_type_has_a_schema() {
        for name in SCHEMA_TYPES {
            let schema = schema_value(name).expect("schema should generate");
            assert!(schema.is_object(), "{name} schema is not an object");
        }
    }

    #[test]
    fn decision_schema_names_verdict() {
        let schema = schema_value("decision").unwrap();
        assert!(schema["properties"]["verdict"].is_object());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = schema_value("finding").unwrap_err();
        assert!(err.to_string().contains("unknown schema type 'finding'"));
    }
}
