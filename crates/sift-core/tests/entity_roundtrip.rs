//! Serde roundtrip and JsonSchema validation tests for all entity types.

use chrono::Utc;
use schemars::schema_for;
use sift_core::audit_detail::{
    ConflictOpenedDetail, DecisionRef, FinalizedDetail, ResolvedDetail, StudyStateDetail,
};
use sift_core::entities::*;
use sift_core::enums::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            // Serde roundtrip
            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            // Schema validation
            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

fn decision(id: &str, reviewer: &str, verdict: Verdict) -> Decision {
    Decision {
        id: id.into(),
        project_id: "prj-a3f8b2c1".into(),
        study_id: "stu-c4e2d1f0".into(),
        reviewer_id: reviewer.into(),
        phase: Phase::TitleAbstract,
        verdict,
        reasoning: Some("population matches".into()),
        exclusion_reason: (verdict == Verdict::Exclude).then(|| "wrong population".into()),
        confidence: Some(80),
        time_spent_ms: Some(42_000),
        created_at: Utc::now(),
    }
}

roundtrip_and_validate!(
    project_roundtrip,
    Project,
    Project {
        id: "prj-a3f8b2c1".into(),
        name: "Statins in sepsis".into(),
        required_reviewers: 2,
        last_phase: Phase::FullText,
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    member_roundtrip,
    Member,
    Member {
        project_id: "prj-a3f8b2c1".into(),
        user_id: "usr-lead".into(),
        role: ProjectRole::Lead,
        active: true,
        joined_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    study_roundtrip,
    Study,
    Study {
        id: "stu-c4e2d1f0".into(),
        project_id: "prj-a3f8b2c1".into(),
        work_id: "wrk-b7a3f9e2".into(),
        phase: Phase::FullText,
        status: StudyStatus::Excluded,
        final_decision: FinalDecision::Finalized(Verdict::Exclude),
        priority_score: 65,
        ai: Some(AiAssessment {
            suggestion: Verdict::Exclude,
            confidence: 0.82,
            reasoning: Some("pediatric cohort".into()),
        }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    work_roundtrip,
    Work,
    Work {
        id: "wrk-b7a3f9e2".into(),
        title: "Statin therapy in adult sepsis".into(),
        abstract_text: None,
        journal: Some("Critical Care".into()),
        publication_year: Some(2024),
        keywords: vec!["sepsis".into(), "statins".into()],
    }
);

roundtrip_and_validate!(
    decision_roundtrip,
    Decision,
    decision("dec-e1c4b2d3", "usr-a", Verdict::Exclude)
);

roundtrip_and_validate!(
    conflict_roundtrip,
    Conflict,
    Conflict {
        id: "cfl-d2f5a8c1".into(),
        project_id: "prj-a3f8b2c1".into(),
        study_id: "stu-c4e2d1f0".into(),
        phase: Phase::TitleAbstract,
        status: ConflictStatus::InDiscussion,
        decisions: vec![
            decision("dec-00000001", "usr-a", Verdict::Include),
            decision("dec-00000002", "usr-b", Verdict::Exclude),
        ],
        escalation: Some(Escalation {
            escalated_at: Utc::now(),
            escalated_by: "usr-a".into(),
            reason: "methodology dispute".into(),
        }),
        created_at: Utc::now(),
        resolved_at: None,
    }
);

roundtrip_and_validate!(
    resolution_roundtrip,
    ConflictResolution,
    ConflictResolution {
        id: "res-00000001".into(),
        conflict_id: "cfl-d2f5a8c1".into(),
        resolver_id: "usr-lead".into(),
        final_decision: Verdict::Include,
        reasoning: "meets inclusion criteria 2b".into(),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    calibration_round_roundtrip,
    CalibrationRound,
    CalibrationRound {
        id: "cal-00000001".into(),
        project_id: "prj-a3f8b2c1".into(),
        phase: Phase::TitleAbstract,
        sample_size: 10,
        target_agreement: 0.7,
        status: CalibrationStatus::Completed,
        kappa_score: Some(0.75),
        reviewers_participated: 2,
        participants: vec!["usr-a".into(), "usr-b".into()],
        study_ids: vec!["stu-c4e2d1f0".into()],
        created_at: Utc::now(),
        completed_at: Some(Utc::now()),
    }
);

roundtrip_and_validate!(
    audit_entry_roundtrip,
    AuditEntry,
    AuditEntry {
        id: "aud-00000001".into(),
        project_id: Some("prj-a3f8b2c1".into()),
        entity_type: EntityType::Study,
        entity_id: "stu-c4e2d1f0".into(),
        action: AuditAction::Finalized,
        actor_id: Some("usr-a".into()),
        detail: Some(serde_json::json!({"verdict": "exclude"})),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    finalized_detail_roundtrip,
    FinalizedDetail,
    FinalizedDetail {
        phase: Phase::TitleAbstract,
        verdict: Verdict::Include,
        decisions: vec![DecisionRef {
            decision_id: "dec-00000001".into(),
            reviewer_id: "usr-a".into(),
            verdict: Verdict::Include,
        }],
        from_status: StudyStatus::Screening,
        result: StudyStateDetail {
            phase: Phase::FullText,
            status: StudyStatus::Pending,
            final_decision: None,
        },
        liveness_override: false,
    }
);

roundtrip_and_validate!(
    conflict_opened_detail_roundtrip,
    ConflictOpenedDetail,
    ConflictOpenedDetail {
        study_id: "stu-c4e2d1f0".into(),
        phase: Phase::TitleAbstract,
        decisions: Vec::new(),
        result: StudyStateDetail {
            phase: Phase::TitleAbstract,
            status: StudyStatus::Conflict,
            final_decision: None,
        },
    }
);

roundtrip_and_validate!(
    resolved_detail_roundtrip,
    ResolvedDetail,
    ResolvedDetail {
        resolution_id: "res-00000001".into(),
        study_id: "stu-c4e2d1f0".into(),
        final_decision: Verdict::Exclude,
        decisions: Vec::new(),
        result: StudyStateDetail {
            phase: Phase::TitleAbstract,
            status: StudyStatus::Excluded,
            final_decision: Some(Verdict::Exclude),
        },
    }
);

// --- Schema rejection tests ---

#[test]
fn schema_rejects_decision_without_verdict() {
    let schema = serde_json::to_value(schema_for!(Decision)).unwrap();
    let invalid = serde_json::json!({
        "id": "dec-test",
        "project_id": "prj-test",
        "study_id": "stu-test",
        "reviewer_id": "usr-a",
        "phase": "title_abstract",
        "created_at": "2026-02-08T12:00:00Z"
    });
    let errors = validate_against_schema(&schema, &invalid);
    assert!(!errors.is_empty(), "Should reject decision without 'verdict'");
}

#[test]
fn schema_rejects_unknown_phase() {
    let schema = serde_json::to_value(schema_for!(Decision)).unwrap();
    let mut instance = serde_json::to_value(decision("dec-x", "usr-a", Verdict::Include)).unwrap();
    instance["phase"] = serde_json::json!("abstract_only");
    let errors = validate_against_schema(&schema, &instance);
    assert!(!errors.is_empty(), "Should reject invalid phase value");
}
