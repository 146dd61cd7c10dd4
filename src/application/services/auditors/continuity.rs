//! 连续性审计：每 K 章审计最近 K 章

use async_trait::async_trait;
use std::sync::Arc;

use super::{window_audit, AuditReport, AuditScope, Auditor};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationTask, ReportKind};
use crate::application::services::prompts;
use crate::domain::manuscript::Chapter;
use crate::domain::review::DefectCategory;
use crate::domain::world::WorldModel;

pub struct ContinuityAuditor {
    generation: Arc<dyn GenerationPort>,
    window: usize,
}

impl ContinuityAuditor {
    pub fn new(generation: Arc<dyn GenerationPort>, window: usize) -> Self {
        Self { generation, window }
    }
}

#[async_trait]
impl Auditor for ContinuityAuditor {
    fn kind(&self) -> ReportKind {
        ReportKind::Continuity
    }

    fn scope(&self) -> AuditScope {
        AuditScope::every(self.window)
    }

    async fn run(&self, chapters: &[&Chapter], model: &WorldModel) -> Result<AuditReport, ApplicationError> {
        window_audit(
            &self.generation,
            self.kind(),
            GenerationTask::ContinuityAudit,
            prompts::with_defect_schema(prompts::CONTINUITY_AUDIT_SYSTEM),
            prompts::window_audit_user(chapters, model),
            DefectCategory::Continuity,
            chapters,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::manuscript_with;
    use crate::domain::manuscript::ChapterNumber;
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    #[tokio::test]
    async fn test_reports_located_defects() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::ContinuityAudit,
            r#"{"score": 6, "defects": [{"severity":"major","affected_chapters":[3],
                "description":"Elena's arm is healed one day after the stabbing",
                "correction_instruction":"Keep her arm bandaged in chapter 3"}], "details": "one state error"}"#,
        ));
        let manuscript = manuscript_with(&[(1, "a"), (2, "b"), (3, "c")]);
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let auditor = ContinuityAuditor::new(generation, 5);

        let report = auditor.run(&chapters, &WorldModel::default()).await.unwrap();

        assert_eq!(report.score, Some(6));
        assert_eq!(report.window, Some((ChapterNumber::new(1), ChapterNumber::new(3))));
        assert_eq!(report.defects.len(), 1);
        assert_eq!(report.defects[0].category, DefectCategory::Continuity);
        assert!(report.defects[0].affects(ChapterNumber::new(3)));
    }

    #[tokio::test]
    async fn test_unparseable_is_empty_report() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(GenerationTask::ContinuityAudit, "n/a"));
        let manuscript = manuscript_with(&[(1, "a")]);
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let auditor = ContinuityAuditor::new(generation, 5);

        let report = auditor.run(&chapters, &WorldModel::default()).await.unwrap();

        assert!(!report.parsed);
        assert!(report.defects.is_empty());
        assert_eq!(report.score, None);
    }
}
