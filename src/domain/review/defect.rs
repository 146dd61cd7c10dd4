//! Review Context - 缺陷

use serde::{Deserialize, Serialize};

use crate::domain::manuscript::ChapterNumber;

/// 缺陷类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectCategory {
    Structure,
    Plot,
    WorldConsistency,
    Continuity,
    Character,
    Voice,
    Pacing,
    Repetition,
    Anachronism,
    #[serde(other)]
    Other,
}

impl DefectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectCategory::Structure => "structure",
            DefectCategory::Plot => "plot",
            DefectCategory::WorldConsistency => "world_consistency",
            DefectCategory::Continuity => "continuity",
            DefectCategory::Character => "character",
            DefectCategory::Voice => "voice",
            DefectCategory::Pacing => "pacing",
            DefectCategory::Repetition => "repetition",
            DefectCategory::Anachronism => "anachronism",
            DefectCategory::Other => "other",
        }
    }

    /// 是否属于文风类缺陷（交给叙事重写器）
    pub fn is_stylistic(&self) -> bool {
        matches!(
            self,
            DefectCategory::Voice
                | DefectCategory::Pacing
                | DefectCategory::Repetition
                | DefectCategory::Anachronism
        )
    }
}

impl Default for DefectCategory {
    fn default() -> Self {
        DefectCategory::Other
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }

    /// 宽松解析，未知值按 minor 处理
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" | "high" | "severe" => Severity::Critical,
            "major" | "medium" | "moderate" => Severity::Major,
            _ => Severity::Minor,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Minor
    }
}

/// 缺陷
///
/// 只有带修正指令且至少指向一个章节的缺陷才可执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(default)]
    pub category: DefectCategory,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub affected_chapters: Vec<ChapterNumber>,
    #[serde(default)]
    pub description: String,
    /// 必须原样保留的内容
    #[serde(default)]
    pub preserve_hint: String,
    /// 必须修改的内容
    #[serde(default)]
    pub correction_instruction: String,
}

impl Defect {
    pub fn new(
        category: DefectCategory,
        severity: Severity,
        affected_chapters: Vec<ChapterNumber>,
        description: impl Into<String>,
        correction_instruction: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            affected_chapters,
            description: description.into(),
            preserve_hint: String::new(),
            correction_instruction: correction_instruction.into(),
        }
    }

    pub fn with_preserve_hint(mut self, hint: impl Into<String>) -> Self {
        self.preserve_hint = hint.into();
        self
    }

    pub fn is_actionable(&self) -> bool {
        !self.correction_instruction.trim().is_empty() && !self.affected_chapters.is_empty()
    }

    pub fn affects(&self, number: ChapterNumber) -> bool {
        self.affected_chapters.contains(&number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actionable_requires_instruction_and_chapter() {
        let defect = Defect::new(
            DefectCategory::Continuity,
            Severity::Major,
            vec![ChapterNumber::new(3)],
            "Eye color changes",
            "Make the eyes blue",
        );
        assert!(defect.is_actionable());

        let mut no_instruction = defect.clone();
        no_instruction.correction_instruction = "   ".to_string();
        assert!(!no_instruction.is_actionable());

        let mut no_chapter = defect;
        no_chapter.affected_chapters.clear();
        assert!(!no_chapter.is_actionable());
    }

    #[test]
    fn test_unknown_category_deserializes_as_other() {
        let json = r#"{"category":"dialogue_tags","severity":"major","affected_chapters":[2],"description":"x","correction_instruction":"y"}"#;
        let defect: Defect = serde_json::from_str(json).unwrap();
        assert_eq!(defect.category, DefectCategory::Other);
        assert_eq!(defect.severity, Severity::Major);
        assert_eq!(defect.affected_chapters, vec![ChapterNumber::new(2)]);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Minor);
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::Critical);
    }
}
