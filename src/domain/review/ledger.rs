//! Review Context - 已解决缺陷账本

use serde::{Deserialize, Serialize};

use super::Defect;
use crate::domain::text_similarity::{normalize_text, word_overlap};

/// 改写描述判定为同一缺陷的词重叠阈值
pub const REPHRASE_OVERLAP_THRESHOLD: f64 = 0.6;

/// 已解决缺陷描述账本
///
/// 只增不减；匹配方式：归一化后相等、互相包含、或词重叠度足够高
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedLedger {
    descriptions: Vec<String>,
}

impl ResolvedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptions(descriptions: Vec<String>) -> Self {
        let mut ledger = Self::new();
        for d in descriptions {
            ledger.record(d);
        }
        ledger
    }

    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// 记录一条已解决描述，精确重复的忽略
    pub fn record(&mut self, description: impl Into<String>) {
        let description = description.into();
        let normalized = normalize_text(&description);
        if normalized.is_empty() {
            return;
        }
        if self
            .descriptions
            .iter()
            .any(|d| normalize_text(d) == normalized)
        {
            return;
        }
        self.descriptions.push(description);
    }

    pub fn is_resolved(&self, description: &str) -> bool {
        let candidate = normalize_text(description);
        if candidate.is_empty() {
            return false;
        }
        self.descriptions.iter().any(|resolved| {
            let resolved_norm = normalize_text(resolved);
            resolved_norm == candidate
                || resolved_norm.contains(&candidate)
                || candidate.contains(&resolved_norm)
                || word_overlap(resolved, description) >= REPHRASE_OVERLAP_THRESHOLD
        })
    }

    /// 过滤掉已解决的缺陷，返回 (保留, 被抑制数量)
    pub fn suppress(&self, defects: Vec<Defect>) -> (Vec<Defect>, usize) {
        let before = defects.len();
        let kept: Vec<Defect> = defects
            .into_iter()
            .filter(|d| !self.is_resolved(&d.description))
            .collect();
        let suppressed = before - kept.len();
        (kept, suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::ChapterNumber;
    use crate::domain::review::{DefectCategory, Severity};

    fn defect(description: &str) -> Defect {
        Defect::new(
            DefectCategory::Continuity,
            Severity::Major,
            vec![ChapterNumber::new(3)],
            description,
            "fix it",
        )
    }

    #[test]
    fn test_exact_and_case_insensitive_match() {
        let ledger = ResolvedLedger::from_descriptions(vec![
            "Elena's eye color changes from blue to green in chapter 3".to_string(),
        ]);
        assert!(ledger.is_resolved("ELENA'S EYE COLOR CHANGES FROM BLUE TO GREEN IN CHAPTER 3."));
    }

    #[test]
    fn test_rephrasing_is_suppressed() {
        let ledger = ResolvedLedger::from_descriptions(vec![
            "Elena's eye color changes from blue to green in chapter 3".to_string(),
        ]);
        let (kept, suppressed) = ledger.suppress(vec![
            defect("In chapter 3 Elena's eye color changes from blue to green"),
            defect("The harbor fire is never explained"),
        ]);
        assert_eq!(suppressed, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].description, "The harbor fire is never explained");
    }

    #[test]
    fn test_unrelated_description_kept() {
        let ledger =
            ResolvedLedger::from_descriptions(vec!["The timeline of the siege is broken".to_string()]);
        assert!(!ledger.is_resolved("Dialogue in the tavern scene feels modern"));
    }

    #[test]
    fn test_record_ignores_duplicates_and_blanks() {
        let mut ledger = ResolvedLedger::new();
        ledger.record("Broken timeline");
        ledger.record("broken  timeline!");
        ledger.record("   ");
        assert_eq!(ledger.len(), 1);
    }
}
