//! Shared test utilities for sift-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use sift_core::entities::{NewWork, Project, Study};
    use sift_core::enums::{Phase, ProjectRole};

    use crate::SiftDb;
    use crate::service::SiftService;
    use crate::trail::writer::TrailWriter;

    /// Create an in-memory `SiftService` with trail disabled.
    pub async fn test_service() -> SiftService {
        let db = SiftDb::open_local(":memory:").await.unwrap();
        SiftService::from_db(db, TrailWriter::disabled())
    }

    /// A project with a lead (`usr-lead`) and the given reviewers.
    pub async fn project_with_reviewers(
        svc: &SiftService,
        k: u32,
        reviewers: &[&str],
    ) -> Project {
        let project = svc.create_project("test review", k, Phase::FullText).await.unwrap();
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

    pub async fn add_study(svc: &SiftService, project: &Project, title: &str) -> Study {
        svc.add_study(&project.id, &NewWork::titled(title)).await.unwrap()
    }
}
