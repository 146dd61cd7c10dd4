//! 文风与节奏审计：每 M 章审计最近 M 章

use async_trait::async_trait;
use std::sync::Arc;

use super::{window_audit, AuditReport, AuditScope, Auditor};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationTask, ReportKind};
use crate::application::services::prompts;
use crate::domain::manuscript::Chapter;
use crate::domain::review::DefectCategory;
use crate::domain::world::WorldModel;

pub struct VoiceRhythmAuditor {
    generation: Arc<dyn GenerationPort>,
    window: usize,
}

impl VoiceRhythmAuditor {
    pub fn new(generation: Arc<dyn GenerationPort>, window: usize) -> Self {
        Self { generation, window }
    }
}

#[async_trait]
impl Auditor for VoiceRhythmAuditor {
    fn kind(&self) -> ReportKind {
        ReportKind::VoiceRhythm
    }

    fn scope(&self) -> AuditScope {
        AuditScope::every(self.window)
    }

    async fn run(&self, chapters: &[&Chapter], model: &WorldModel) -> Result<AuditReport, ApplicationError> {
        window_audit(
            &self.generation,
            self.kind(),
            GenerationTask::VoiceAudit,
            prompts::with_defect_schema(prompts::VOICE_AUDIT_SYSTEM),
            prompts::window_audit_user(chapters, model),
            DefectCategory::Voice,
            chapters,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::manuscript_with;
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    #[tokio::test]
    async fn test_uncategorized_defects_default_to_voice() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::VoiceAudit,
            r#"{"score": 7, "defects": [{"severity":"minor","affected_chapters":[2],
                "description":"Tense slips into present","correction_instruction":"Use past tense"},
               {"category":"pacing","severity":"major","affected_chapters":[2],
                "description":"Battle resolved in one line","correction_instruction":"Expand the battle"}]}"#,
        ));
        let manuscript = manuscript_with(&[(1, "a"), (2, "b")]);
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let auditor = VoiceRhythmAuditor::new(generation.clone(), 10);

        let report = auditor.run(&chapters, &WorldModel::default()).await.unwrap();

        assert_eq!(report.kind, ReportKind::VoiceRhythm);
        assert_eq!(report.defects[0].category, DefectCategory::Voice);
        assert_eq!(report.defects[1].category, DefectCategory::Pacing);
        assert_eq!(generation.calls_for(GenerationTask::VoiceAudit), 1);
    }
}
