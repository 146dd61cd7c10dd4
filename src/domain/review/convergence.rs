//! Review Context - 收敛状态机

use serde::{Deserialize, Serialize};

/// 终审循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceState {
    Drafting,
    ReviewPending,
    Revising,
    Approved,
    Exhausted,
}

impl ConvergenceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConvergenceState::Approved | ConvergenceState::Exhausted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceState::Drafting => "drafting",
            ConvergenceState::ReviewPending => "review_pending",
            ConvergenceState::Revising => "revising",
            ConvergenceState::Approved => "approved",
            ConvergenceState::Exhausted => "exhausted",
        }
    }
}

/// 收敛策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    pub threshold: u8,
    pub max_passes: u32,
}

impl ConvergencePolicy {
    pub fn new(threshold: u8, max_passes: u32) -> Self {
        Self {
            threshold: threshold.min(10),
            max_passes: max_passes.max(1),
        }
    }

    /// 一轮审阅完成后的下一状态
    pub fn after_review(&self, pass_number: u32, score: u8) -> ConvergenceState {
        if score >= self.threshold {
            ConvergenceState::Approved
        } else if pass_number < self.max_passes {
            ConvergenceState::Revising
        } else {
            ConvergenceState::Exhausted
        }
    }

    /// 是否还能开始第 `pass_number` 轮
    pub fn can_start(&self, pass_number: u32) -> bool {
        pass_number >= 1 && pass_number <= self.max_passes
    }
}

/// 状态迁移（非法迁移保持原状态）
pub fn advance(state: ConvergenceState, policy: &ConvergencePolicy, event: LoopEvent) -> ConvergenceState {
    match (state, event) {
        (ConvergenceState::Drafting, LoopEvent::DraftReady) => ConvergenceState::ReviewPending,
        (ConvergenceState::ReviewPending, LoopEvent::Reviewed { pass_number, score }) => {
            policy.after_review(pass_number, score)
        }
        (ConvergenceState::Revising, LoopEvent::RevisionApplied) => ConvergenceState::ReviewPending,
        (current, _) => current,
    }
}

/// 循环事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    DraftReady,
    Reviewed { pass_number: u32, score: u8 },
    RevisionApplied,
}
