//! Job Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// 完整修订流水线
    Revision,
    /// 逐章翻译
    Translation { target_language: String },
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Revision => "revision",
            JobKind::Translation { .. } => "translation",
        }
    }

    pub fn target_language(&self) -> Option<&str> {
        match self {
            JobKind::Translation { target_language } => Some(target_language),
            JobKind::Revision => None,
        }
    }

    /// 从持久化字段还原
    pub fn from_parts(kind: &str, target_language: Option<String>) -> Option<Self> {
        match kind {
            "revision" => Some(JobKind::Revision),
            "translation" => Some(JobKind::Translation {
                target_language: target_language?,
            }),
            _ => None,
        }
    }

    pub fn initial_stage(&self) -> JobStage {
        match self {
            JobKind::Revision => JobStage::Structure,
            JobKind::Translation { .. } => JobStage::Translating,
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// 流水线阶段（持久化的检查点位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Structure,
    Summaries,
    WorldModel,
    Architect,
    Audits,
    FinalReview,
    Translating,
    Done,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Structure => "structure",
            JobStage::Summaries => "summaries",
            JobStage::WorldModel => "world_model",
            JobStage::Architect => "architect",
            JobStage::Audits => "audits",
            JobStage::FinalReview => "final_review",
            JobStage::Translating => "translating",
            JobStage::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "structure" => Some(JobStage::Structure),
            "summaries" => Some(JobStage::Summaries),
            "world_model" => Some(JobStage::WorldModel),
            "architect" => Some(JobStage::Architect),
            "audits" => Some(JobStage::Audits),
            "final_review" => Some(JobStage::FinalReview),
            "translating" => Some(JobStage::Translating),
            "done" => Some(JobStage::Done),
            _ => None,
        }
    }

    /// 修订流水线中的下一阶段
    pub fn next_revision_stage(&self) -> JobStage {
        match self {
            JobStage::Structure => JobStage::Summaries,
            JobStage::Summaries => JobStage::WorldModel,
            JobStage::WorldModel => JobStage::Architect,
            JobStage::Architect => JobStage::Audits,
            JobStage::Audits => JobStage::FinalReview,
            JobStage::FinalReview | JobStage::Translating | JobStage::Done => JobStage::Done,
        }
    }
}

/// 持久化检查点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stage: JobStage,
    pub completed_units: u32,
    pub total_units: u32,
}

impl Checkpoint {
    pub fn start(stage: JobStage) -> Self {
        Self {
            stage,
            completed_units: 0,
            total_units: 0,
        }
    }

    pub fn at(stage: JobStage, completed_units: u32, total_units: u32) -> Self {
        Self {
            stage,
            completed_units,
            total_units,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == JobStage::Done
    }

    pub fn remaining_units(&self) -> u32 {
        self.total_units.saturating_sub(self.completed_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_stages_advance_to_done() {
        let mut stage = JobKind::Revision.initial_stage();
        let mut visited = vec![stage];
        while stage != JobStage::Done {
            stage = stage.next_revision_stage();
            visited.push(stage);
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(visited[1], JobStage::Summaries);
    }

    #[test]
    fn test_kind_round_trip_through_parts() {
        let kind = JobKind::Translation {
            target_language: "es".to_string(),
        };
        let restored =
            JobKind::from_parts(kind.as_str(), kind.target_language().map(String::from));
        assert_eq!(restored, Some(kind));
        assert_eq!(JobKind::from_parts("translation", None), None);
    }

    #[test]
    fn test_stage_string_round_trip() {
        for stage in [JobStage::WorldModel, JobStage::FinalReview, JobStage::Done] {
            assert_eq!(JobStage::from_str(stage.as_str()), Some(stage));
        }
    }
}
