//! End-to-end screening flows through `SiftService`:
//! - consensus at k = 1, 2 and 3, phase advancement
//! - conflicts and their single resolution
//! - ingestion signal deduplication across the live and sweep paths
//! - audit entries and the JSONL trail

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sift_core::audit_detail::{ConflictOpenedDetail, FinalizedDetail, ResolvedDetail};
use sift_core::entities::{NewDecision, NewWork, Project, Study};
use sift_core::enums::{
    AuditAction, ConflictStatus, EntityType, FinalDecision, Phase, ProjectRole, StudyStatus,
    Verdict,
};
use sift_db::error::EngineError;
use sift_db::ingestion::MemoryIngestionQueue;
use sift_db::repos::audit::AuditFilter;
use sift_db::repos::decision::ConsensusOutcome;
use sift_db::service::SiftService;

async fn test_service() -> SiftService {
    SiftService::new_local(":memory:", None).await.unwrap()
}

async fn project(svc: &SiftService, k: u32, reviewers: &[&str]) -> Project {
    let project = svc
        .create_project("statins in sepsis", k, Phase::FullText)
        .await
        .unwrap();
    svc.add_member(&project.id, "usr-lead", ProjectRole::Lead)
        .await
        .unwrap();
    for reviewer in reviewers {
        svc.add_member(&project.id, reviewer, ProjectRole::Reviewer)
            .await
            .unwrap();
    }
    project
}

async fn study(svc: &SiftService, project: &Project) -> Study {
    svc.add_study(&project.id, &NewWork::titled("Statin therapy in adult sepsis"))
        .await
        .unwrap()
}

fn include(reviewer: &str) -> NewDecision {
    NewDecision::new(reviewer, Verdict::Include)
}

fn exclude(reviewer: &str) -> NewDecision {
    NewDecision::exclude(reviewer, "pediatric population")
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn k2_include_include_advances_to_full_text() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;

    svc.submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    let out = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &include("usr-b"))
        .await
        .unwrap();

    assert_eq!(
        out.outcome,
        ConsensusOutcome::Advanced {
            from: Phase::TitleAbstract,
            to: Phase::FullText
        }
    );
    assert_eq!(out.study.phase, Phase::FullText);
    assert_eq!(out.study.status, StudyStatus::Pending);
    assert_eq!(out.study.final_decision, FinalDecision::Undecided);

    let stats = svc.phase_stats(&p.id, Phase::TitleAbstract).await.unwrap();
    assert_eq!((stats.decisions, stats.includes, stats.advanced), (2, 2, 1));
    assert_eq!(stats.conflicts_opened, 0);
}

#[tokio::test]
async fn k2_include_exclude_opens_one_conflict_with_both_decisions() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;

    let first = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    let second = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-b"))
        .await
        .unwrap();

    assert_eq!(second.study.status, StudyStatus::Conflict);
    let open = svc.list_open_conflicts(&p.id).await.unwrap();
    assert_eq!(open.len(), 1);
    let conflict = &open[0];
    assert_eq!(
        second.outcome,
        ConsensusOutcome::ConflictOpened {
            conflict_id: conflict.id.clone()
        }
    );
    let ids: Vec<&str> = conflict.decisions.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec![first.decision.id.as_str(), second.decision.id.as_str()]);

    let opened = svc
        .query_audit(&AuditFilter {
            entity_id: Some(conflict.id.clone()),
            action: Some(AuditAction::ConflictOpened),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(opened.len(), 1);
    let detail: ConflictOpenedDetail =
        serde_json::from_value(opened[0].detail.clone().unwrap()).unwrap();
    assert_eq!(detail.decisions.len(), 2);
    assert_eq!(detail.result.status, StudyStatus::Conflict);
}

#[tokio::test]
async fn k2_double_exclude_finalizes_without_conflict() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;

    svc.submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-a"))
        .await
        .unwrap();
    let out = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-b"))
        .await
        .unwrap();

    assert_eq!(out.outcome, ConsensusOutcome::Finalized { verdict: Verdict::Exclude });
    assert_eq!(out.study.phase, Phase::TitleAbstract);
    assert_eq!(out.study.status, StudyStatus::Excluded);
    assert_eq!(out.study.final_decision, FinalDecision::Finalized(Verdict::Exclude));
    assert!(svc.list_open_conflicts(&p.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn k1_include_then_full_text_exclude() {
    let queue = Arc::new(MemoryIngestionQueue::new());
    let svc = test_service().await.with_ingestion_queue(queue.clone());
    let p = project(&svc, 1, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;

    let ta = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    assert_eq!(ta.study.phase, Phase::FullText);
    assert_eq!(ta.study.status, StudyStatus::Pending);

    // A different reviewer screens the full text.
    let ft = svc
        .submit_decision(&s.id, Phase::FullText, &exclude("usr-b"))
        .await
        .unwrap();
    assert_eq!(ft.study.phase, Phase::FullText);
    assert_eq!(ft.study.status, StudyStatus::Excluded);
    assert_eq!(ft.study.final_decision, FinalDecision::Finalized(Verdict::Exclude));
    assert!(queue.requests().is_empty());
}

#[tokio::test]
async fn k3_two_to_one_is_a_conflict_not_a_majority() {
    let svc = test_service().await;
    let p = project(&svc, 3, &["usr-a", "usr-b", "usr-c"]).await;
    let s = study(&svc, &p).await;

    for input in [include("usr-a"), include("usr-b")] {
        let out = svc
            .submit_decision(&s.id, Phase::TitleAbstract, &input)
            .await
            .unwrap();
        assert!(matches!(out.outcome, ConsensusOutcome::AwaitingReviewers { required: 3, .. }));
    }
    let out = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-c"))
        .await
        .unwrap();
    assert!(matches!(out.outcome, ConsensusOutcome::ConflictOpened { .. }));
    assert_eq!(out.study.status, StudyStatus::Conflict);
}

#[tokio::test]
async fn last_phase_title_abstract_finalizes_immediately() {
    let queue = Arc::new(MemoryIngestionQueue::new());
    let svc = test_service().await.with_ingestion_queue(queue.clone());
    let p = svc
        .create_project("rapid review", 1, Phase::TitleAbstract)
        .await
        .unwrap();
    svc.add_member(&p.id, "usr-a", ProjectRole::Reviewer)
        .await
        .unwrap();
    let s = study(&svc, &p).await;

    let out = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    assert_eq!(out.outcome, ConsensusOutcome::Finalized { verdict: Verdict::Include });
    assert_eq!(out.study.status, StudyStatus::Included);
    assert_eq!(queue.requests().len(), 1);
    assert_eq!(queue.requests()[0].phase, Phase::TitleAbstract);
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolving_twice_leaves_state_unchanged() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;
    svc.submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    svc.submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-b"))
        .await
        .unwrap();
    let conflict = svc.list_open_conflicts(&p.id).await.unwrap().remove(0);

    let resolved = svc
        .resolve_conflict(&conflict.id, "usr-lead", Verdict::Include, "adult subgroup reported")
        .await
        .unwrap();
    assert_eq!(resolved.study.phase, Phase::FullText);
    assert_eq!(resolved.study.status, StudyStatus::Pending);

    let study_before = svc.get_study(&s.id).await.unwrap();
    let conflict_before = svc.get_conflict(&conflict.id).await.unwrap();
    let err = svc
        .resolve_conflict(&conflict.id, "usr-lead", Verdict::Exclude, "reconsidered")
        .await
        .unwrap_err();
    match err {
        EngineError::ConflictAlreadyResolved(existing) => {
            assert_eq!(existing.id, resolved.resolution.id);
            assert_eq!(existing.final_decision, Verdict::Include);
        }
        other => panic!("expected ConflictAlreadyResolved, got {other:?}"),
    }
    assert_eq!(svc.get_study(&s.id).await.unwrap(), study_before);
    assert_eq!(svc.get_conflict(&conflict.id).await.unwrap(), conflict_before);
    assert_eq!(conflict_before.status, ConflictStatus::Resolved);

    let stats = svc.phase_stats(&p.id, Phase::TitleAbstract).await.unwrap();
    assert_eq!((stats.conflicts_opened, stats.conflicts_resolved), (1, 1));

    let resolutions = svc
        .query_audit(&AuditFilter {
            entity_id: Some(conflict.id.clone()),
            action: Some(AuditAction::Resolved),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(resolutions.len(), 1);
    let detail: ResolvedDetail =
        serde_json::from_value(resolutions[0].detail.clone().unwrap()).unwrap();
    assert_eq!(detail.result.phase, Phase::FullText);
    assert_eq!(detail.decisions.len(), 2);
}

#[tokio::test]
async fn resolving_include_at_last_phase_signals_ingestion() {
    let queue = Arc::new(MemoryIngestionQueue::new());
    let svc = test_service().await.with_ingestion_queue(queue.clone());
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;
    for reviewer in ["usr-a", "usr-b"] {
        svc.submit_decision(&s.id, Phase::TitleAbstract, &include(reviewer))
            .await
            .unwrap();
    }
    svc.submit_decision(&s.id, Phase::FullText, &include("usr-a"))
        .await
        .unwrap();
    svc.submit_decision(&s.id, Phase::FullText, &exclude("usr-b"))
        .await
        .unwrap();
    let conflict = svc.list_open_conflicts(&p.id).await.unwrap().remove(0);
    assert_eq!(conflict.phase, Phase::FullText);

    let out = svc
        .resolve_conflict(&conflict.id, "usr-lead", Verdict::Include, "outcome data usable")
        .await
        .unwrap();
    assert_eq!(out.study.status, StudyStatus::Included);
    assert_eq!(out.study.final_decision, FinalDecision::Finalized(Verdict::Include));

    let requests = queue.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].study_id, s.id);
    assert_eq!(requests[0].phase, Phase::FullText);
}

// ---------------------------------------------------------------------------
// Ingestion dedup and sweeper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingestion_is_signaled_once_across_live_and_sweep_paths() {
    let queue = Arc::new(MemoryIngestionQueue::new());
    let svc = test_service().await.with_ingestion_queue(queue.clone());
    let p = project(&svc, 1, &["usr-a"]).await;
    let s = study(&svc, &p).await;
    svc.submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    svc.submit_decision(&s.id, Phase::FullText, &include("usr-a"))
        .await
        .unwrap();
    assert_eq!(queue.requests().len(), 1);

    // Simulate a lost status write: the decisions say "included" but the
    // study is back to screening.
    svc.db()
        .conn()
        .execute(
            "UPDATE studies SET status = 'screening', final_decision = NULL WHERE id = ?1",
            [s.id.as_str()],
        )
        .await
        .unwrap();

    let report = svc.sweep(Some(&p.id)).await.unwrap();
    assert_eq!(report.finalized, 1);
    assert_eq!(report.ingestion_dispatched, 0);
    assert_eq!(svc.get_study(&s.id).await.unwrap().status, StudyStatus::Included);
    assert_eq!(queue.requests().len(), 1);
    assert_eq!(svc.list_ingestion_signals(&p.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sweeper_finalizes_decisions_left_unapplied() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;

    // Two agreeing decisions written without the consensus step.
    for (id, reviewer) in [("dec-00000001", "usr-a"), ("dec-00000002", "usr-b")] {
        svc.db()
            .conn()
            .execute(
                "INSERT INTO decisions (id, project_id, study_id, reviewer_id, phase, verdict, exclusion_reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'title_abstract', 'exclude', 'adults only', '2026-01-01T00:00:00+00:00')",
                [id, p.id.as_str(), s.id.as_str(), reviewer],
            )
            .await
            .unwrap();
    }

    let report = svc.sweep(None).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.finalized, 1);
    assert_eq!(report.liveness_overrides, 0);

    let study = svc.get_study(&s.id).await.unwrap();
    assert_eq!(study.status, StudyStatus::Excluded);

    let reconciled = svc
        .query_audit(&AuditFilter {
            entity_type: Some(EntityType::Study),
            entity_id: Some(s.id.clone()),
            action: Some(AuditAction::Reconciled),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(reconciled.len(), 1);

    let finalized = svc
        .query_audit(&AuditFilter {
            entity_id: Some(s.id.clone()),
            action: Some(AuditAction::Finalized),
            ..Default::default()
        })
        .await
        .unwrap();
    let detail: FinalizedDetail =
        serde_json::from_value(finalized[0].detail.clone().unwrap()).unwrap();
    assert_eq!(detail.decisions.len(), 2);

    let again = svc.sweep(None).await.unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn sweeper_opens_conflict_for_unapplied_disagreement() {
    let svc = test_service().await;
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;
    svc.submit_decision(&s.id, Phase::TitleAbstract, &include("usr-a"))
        .await
        .unwrap();
    svc.db()
        .conn()
        .execute(
            "INSERT INTO decisions (id, project_id, study_id, reviewer_id, phase, verdict, exclusion_reason, created_at)
             VALUES ('dec-00000009', ?1, ?2, 'usr-b', 'title_abstract', 'exclude', 'adults only', '2026-01-01T00:00:00+00:00')",
            [p.id.as_str(), s.id.as_str()],
        )
        .await
        .unwrap();

    let report = svc.sweep(Some(&p.id)).await.unwrap();
    assert_eq!(report.conflicts_opened, 1);
    assert_eq!(svc.get_study(&s.id).await.unwrap().status, StudyStatus::Conflict);
    assert_eq!(svc.list_open_conflicts(&p.id).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Trail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn committed_audit_entries_reach_the_trail() {
    let dir = TempDir::new().unwrap();
    let svc = SiftService::new_local(":memory:", Some(dir.path().to_path_buf()))
        .await
        .unwrap();
    assert!(svc.trail().is_enabled());
    let p = project(&svc, 2, &["usr-a", "usr-b"]).await;
    let s = study(&svc, &p).await;
    svc.submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-a"))
        .await
        .unwrap();

    // A rejected submission writes nothing.
    let err = svc
        .submit_decision(&s.id, Phase::TitleAbstract, &exclude("usr-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateDecision { .. }));

    let trail = svc.trail().read_project(&p.id).unwrap();
    let audit = svc
        .query_audit(&AuditFilter {
            project_id: Some(p.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(trail.len(), audit.len());
    assert_eq!(trail.last().unwrap().action, AuditAction::DecisionRecorded);
}
