//! Review Context - 审阅轮次

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Defect;

/// 默认批准阈值
pub const DEFAULT_APPROVAL_THRESHOLD: u8 = 9;

/// 审阅结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    ApprovedWithReservations,
    RequiresRevision,
}

impl Verdict {
    /// 由分数推导结论，分数低于阈值时永远不会批准
    pub fn from_score(score: u8, threshold: u8, has_defects: bool) -> Self {
        if score < threshold {
            Verdict::RequiresRevision
        } else if has_defects {
            Verdict::ApprovedWithReservations
        } else {
            Verdict::Approved
        }
    }

    pub fn is_approved(&self) -> bool {
        !matches!(self, Verdict::RequiresRevision)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::ApprovedWithReservations => "approved_with_reservations",
            Verdict::RequiresRevision => "requires_revision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Verdict::Approved),
            "approved_with_reservations" => Some(Verdict::ApprovedWithReservations),
            "requires_revision" => Some(Verdict::RequiresRevision),
            _ => None,
        }
    }
}

/// 一轮完整审阅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPass {
    pub pass_number: u32,
    /// 0-10
    pub score: u8,
    pub verdict: Verdict,
    /// 已过滤掉已解决项后的缺陷
    pub defects: Vec<Defect>,
    /// 升级重试后仍未解决的缺陷
    pub unresolved_defects: Vec<Defect>,
    /// 截至本轮结束时的已解决描述（单调增长）
    pub resolved_defect_descriptions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewPass {
    pub fn new(pass_number: u32, score: u8, threshold: u8, defects: Vec<Defect>) -> Self {
        let score = score.min(10);
        let verdict = Verdict::from_score(score, threshold, !defects.is_empty());
        Self {
            pass_number,
            score,
            verdict,
            defects,
            unresolved_defects: Vec::new(),
            resolved_defect_descriptions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// 无法解析的审阅结果：按 0 分处理
    pub fn unparseable(pass_number: u32, threshold: u8) -> Self {
        Self::new(pass_number, 0, threshold, Vec::new())
    }

    pub fn actionable_defects(&self) -> impl Iterator<Item = &Defect> {
        self.defects.iter().filter(|d| d.is_actionable())
    }
}
