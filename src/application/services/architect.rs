//! 架构分析
//!
//! 悬崖式评分：零问题才是 10 分；任一问题起评 9 分，之后每个问题按严重度扣分

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::parsing::{lenient_list, lenient_string, parse_structured, preview, ParseResult, RawDefect};
use super::prompts;
use super::settings::PipelineSettings;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationPort, GenerationRequest, GenerationTask};
use crate::domain::manuscript::{Chapter, ChapterNumber, Manuscript, TokenUsage};
use crate::domain::review::{Defect, DefectCategory, Severity};
use crate::domain::structure::{OutOfOrderReason, StructuralReport};
use crate::domain::world::WorldModel;

/// 悬崖式评分
///
/// - 0 个问题 → 10
/// - 第一个问题 → 9
/// - 之后每个 minor −1，major −2，critical −3，最低 0
pub fn cliff_score(severities: &[Severity]) -> u8 {
    if severities.is_empty() {
        return 10;
    }
    let penalty: i32 = severities
        .iter()
        .skip(1)
        .map(|s| match s {
            Severity::Minor => 1,
            Severity::Major => 2,
            Severity::Critical => 3,
        })
        .sum();
    (9 - penalty).max(0) as u8
}

/// 建议的章节移动（只作参考，从不自动执行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderMove {
    #[serde(default)]
    pub chapter: Option<ChapterNumber>,
    pub current_position: usize,
    pub target_position: usize,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArchitectResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    problems: Vec<RawDefect>,
    #[serde(default, deserialize_with = "lenient_list")]
    reorder_plan: Vec<ReorderMove>,
    #[serde(default, deserialize_with = "lenient_string")]
    notes: String,
}

/// 架构分析报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectReport {
    pub score: u8,
    /// 全部问题（包括结构分析发现的）
    pub problems: Vec<Defect>,
    pub reorder_plan: Vec<ReorderMove>,
    pub notes: String,
    /// 模型响应能否解析
    pub parsed: bool,
    #[serde(skip)]
    pub usage: TokenUsage,
}

impl ArchitectReport {
    pub fn actionable(&self) -> Vec<&Defect> {
        self.problems.iter().filter(|d| d.is_actionable()).collect()
    }
}

/// 把结构分析结果转为问题
pub fn structural_problems(report: &StructuralReport) -> Vec<Defect> {
    let mut problems = Vec::new();

    for pair in &report.duplicate_chapters {
        problems.push(
            Defect::new(
                DefectCategory::Structure,
                Severity::Critical,
                vec![pair.second],
                format!(
                    "{} (position {}) duplicates {} (position {}), similarity {:.2}",
                    pair.second.label(),
                    pair.second_position,
                    pair.first.label(),
                    pair.first_position,
                    pair.similarity
                ),
                String::new(),
            ),
        );
    }

    for entry in &report.out_of_order_chapters {
        let description = match &entry.reason {
            OutOfOrderReason::TitleMismatch { stated } => format!(
                "{} at position {} is titled as chapter {}",
                entry.number.label(),
                entry.position,
                stated
            ),
            OutOfOrderReason::SequenceRegression { after } => format!(
                "{} at position {} appears after {}",
                entry.number.label(),
                entry.position,
                after.label()
            ),
        };
        problems.push(Defect::new(
            DefectCategory::Structure,
            Severity::Major,
            vec![entry.number],
            description,
            String::new(),
        ));
    }

    for missing in &report.missing_chapters {
        problems.push(Defect::new(
            DefectCategory::Structure,
            Severity::Major,
            Vec::new(),
            format!("Chapter {} is missing from the sequence", missing),
            String::new(),
        ));
    }

    problems
}

pub struct ArchitectAnalyzer {
    generation: Arc<dyn GenerationPort>,
    settings: PipelineSettings,
}

impl ArchitectAnalyzer {
    pub fn new(generation: Arc<dyn GenerationPort>, settings: PipelineSettings) -> Self {
        Self { generation, settings }
    }

    pub async fn analyze(
        &self,
        manuscript: &Manuscript,
        model: &WorldModel,
        structure: &StructuralReport,
    ) -> Result<ArchitectReport, ApplicationError> {
        let chapters: Vec<&Chapter> = manuscript.chapters().iter().collect();
        let summaries = prompts::summaries_block(&chapters, self.settings.excerpt_chars);
        let request = GenerationRequest::json(
            GenerationTask::Architect,
            prompts::with_defect_schema(prompts::ARCHITECT_SYSTEM),
            prompts::architect_user(model, &summaries, structure, manuscript.genre()),
        );
        let response = self.generation.generate(request).await?;

        let (model_problems, reorder_plan, notes, parsed) =
            match parse_structured::<ArchitectResponse>(&response.content) {
                ParseResult::Parsed(parsed) => {
                    let problems: Vec<Defect> = parsed
                        .problems
                        .into_iter()
                        .map(|p| p.into_defect(DefectCategory::Plot))
                        .filter(|d| !d.description.is_empty())
                        .collect();
                    (problems, parsed.reorder_plan, parsed.notes, true)
                }
                ParseResult::Unparseable(raw) => {
                    tracing::warn!(raw = %preview(&raw), "Unparseable architect response");
                    (Vec::new(), Vec::new(), String::new(), false)
                }
            };

        let mut problems = structural_problems(structure);
        problems.extend(model_problems);

        let severities: Vec<Severity> = problems.iter().map(|p| p.severity).collect();
        let score = cliff_score(&severities);

        if !reorder_plan.is_empty() {
            tracing::info!(moves = reorder_plan.len(), "Architect proposed reorder plan (advisory)");
        }
        tracing::info!(
            manuscript_id = %manuscript.id(),
            score = score,
            problems = problems.len(),
            "Architect analysis completed"
        );

        Ok(ArchitectReport {
            score,
            problems,
            reorder_plan,
            notes,
            parsed,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::manuscript_with;
    use crate::domain::structure::{analyze_structure, ChapterDigest, DEFAULT_DUPLICATE_THRESHOLD};
    use crate::infrastructure::adapters::generation::ScriptedGenerationClient;

    #[test]
    fn test_cliff_rubric() {
        assert_eq!(cliff_score(&[]), 10);
        assert_eq!(cliff_score(&[Severity::Minor]), 9);
        assert_eq!(cliff_score(&[Severity::Critical]), 9);
        assert_eq!(cliff_score(&[Severity::Minor, Severity::Minor]), 8);
        assert_eq!(cliff_score(&[Severity::Minor, Severity::Major]), 7);
        assert_eq!(cliff_score(&[Severity::Minor, Severity::Critical]), 6);
        assert_eq!(
            cliff_score(&[Severity::Critical, Severity::Critical, Severity::Critical, Severity::Critical]),
            0
        );
    }

    #[tokio::test]
    async fn test_flawless_architecture_scores_ten() {
        let generation = Arc::new(
            ScriptedGenerationClient::new().push(GenerationTask::Architect, r#"{"problems": []}"#),
        );
        let manuscript = manuscript_with(&[(1, "first chapter text"), (2, "second chapter text")]);
        let analyzer = ArchitectAnalyzer::new(generation, PipelineSettings::default());

        let report = analyzer
            .analyze(&manuscript, &WorldModel::default(), &StructuralReport::default())
            .await
            .unwrap();

        assert_eq!(report.score, 10);
        assert!(report.problems.is_empty());
    }

    #[tokio::test]
    async fn test_structural_findings_count_as_problems() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(
            GenerationTask::Architect,
            r#"{"problems": [{"category":"plot","severity":"minor","affected_chapters":[1],"description":"Motive unclear","correction_instruction":"State the motive"}],
                "reorder_plan": [{"chapter": 4, "current_position": 3, "target_position": 2, "reason": "x"}]}"#,
        ));
        let manuscript = manuscript_with(&[(1, "alpha beta gamma"), (2, "delta epsilon zeta"), (4, "eta theta iota")]);
        let digests: Vec<ChapterDigest> = manuscript.chapters().iter().map(ChapterDigest::from_chapter).collect();
        let structure = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);
        let analyzer = ArchitectAnalyzer::new(generation, PipelineSettings::default());

        let report = analyzer
            .analyze(&manuscript, &WorldModel::default(), &structure)
            .await
            .unwrap();

        // 缺失第 3 章（major，首个问题 → 9）+ 模型的 minor（−1）
        assert_eq!(report.problems.len(), 2);
        assert_eq!(report.score, 8);
        assert_eq!(report.reorder_plan.len(), 1);
        assert_eq!(report.actionable().len(), 1);
        // 重排建议从不执行
        let numbers: Vec<i32> = manuscript.chapters().iter().map(|c| c.number().value()).collect();
        assert_eq!(numbers, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_unparseable_response_keeps_structural_problems() {
        let generation = Arc::new(ScriptedGenerationClient::new().push(GenerationTask::Architect, "sorry"));
        let manuscript = manuscript_with(&[(2, "only chapter two")]);
        let structure = StructuralReport {
            has_issues: true,
            missing_chapters: vec![1],
            ..Default::default()
        };
        let analyzer = ArchitectAnalyzer::new(generation, PipelineSettings::default());

        let report = analyzer.analyze(&manuscript, &WorldModel::default(), &structure).await.unwrap();

        assert!(!report.parsed);
        assert_eq!(report.score, 9);
    }
}
