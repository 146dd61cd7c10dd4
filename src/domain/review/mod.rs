//! Review Context - 审阅限界上下文
//!
//! 职责:
//! - 缺陷与审阅轮次
//! - 已解决缺陷账本
//! - 终审收敛状态机

mod convergence;
mod defect;
mod ledger;
mod pass;

pub use convergence::{advance, ConvergencePolicy, ConvergenceState, LoopEvent};
pub use defect::{Defect, DefectCategory, Severity};
pub use ledger::{ResolvedLedger, REPHRASE_OVERLAP_THRESHOLD};
pub use pass::{ReviewPass, Verdict, DEFAULT_APPROVAL_THRESHOLD};
