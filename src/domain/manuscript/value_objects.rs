//! Manuscript Context - Value Objects

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// 稿件唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManuscriptId(Uuid);

impl ManuscriptId {
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

impl Default for ManuscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ManuscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 章节编号类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterKind {
    /// 序章（0）
    Prologue,
    /// 正文章节（正整数）
    Ordinary,
    /// 尾声（-1）
    Epilogue,
    /// 作者按语（-2）
    AuthorNote,
    /// 其他负数标记
    Appendix,
}

/// 章节编号
///
/// 不变量:
/// - 0 = 序章，-1 = 尾声，-2 = 作者按语，正数 = 正文
/// - 排序不是数值序：序章 < 正文（升序）< 尾声 < 作者按语 < 其他负数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterNumber(i32);

impl ChapterNumber {
    pub const PROLOGUE: ChapterNumber = ChapterNumber(0);
    pub const EPILOGUE: ChapterNumber = ChapterNumber(-1);
    pub const AUTHOR_NOTE: ChapterNumber = ChapterNumber(-2);

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn kind(&self) -> ChapterKind {
        match self.0 {
            0 => ChapterKind::Prologue,
            n if n > 0 => ChapterKind::Ordinary,
            -1 => ChapterKind::Epilogue,
            -2 => ChapterKind::AuthorNote,
            _ => ChapterKind::Appendix,
        }
    }

    pub fn is_ordinary(&self) -> bool {
        self.0 > 0
    }

    /// 派生的全序排序键
    pub fn sort_key(&self) -> (u8, i64) {
        match self.kind() {
            ChapterKind::Prologue => (0, 0),
            ChapterKind::Ordinary => (1, self.0 as i64),
            ChapterKind::Epilogue => (2, 0),
            ChapterKind::AuthorNote => (3, 0),
            // -3 排在 -4 之前
            ChapterKind::Appendix => (4, -(self.0 as i64)),
        }
    }

    /// 用于提示词和日志的可读标签
    pub fn label(&self) -> String {
        match self.kind() {
            ChapterKind::Prologue => "Prologue".to_string(),
            ChapterKind::Ordinary => format!("Chapter {}", self.0),
            ChapterKind::Epilogue => "Epilogue".to_string(),
            ChapterKind::AuthorNote => "Author's note".to_string(),
            ChapterKind::Appendix => format!("Appendix {}", -self.0),
        }
    }
}

impl PartialOrd for ChapterNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl From<i32> for ChapterNumber {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 稿件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManuscriptStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ManuscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManuscriptStatus::Pending => "pending",
            ManuscriptStatus::Processing => "processing",
            ManuscriptStatus::Completed => "completed",
            ManuscriptStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ManuscriptStatus::Pending),
            "processing" => Some(ManuscriptStatus::Processing),
            "completed" => Some(ManuscriptStatus::Completed),
            "error" => Some(ManuscriptStatus::Error),
            _ => None,
        }
    }
}

impl Default for ManuscriptStatus {
    fn default() -> Self {
        ManuscriptStatus::Pending
    }
}

/// 章节处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ChapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Pending => "pending",
            ChapterStatus::Processing => "processing",
            ChapterStatus::Completed => "completed",
            ChapterStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ChapterStatus::Pending),
            "processing" => Some(ChapterStatus::Processing),
            "completed" => Some(ChapterStatus::Completed),
            "error" => Some(ChapterStatus::Error),
            _ => None,
        }
    }
}

impl Default for ChapterStatus {
    fn default() -> Self {
        ChapterStatus::Pending
    }
}

/// 累计 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, thinking_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            thinking_tokens,
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.thinking_tokens += other.thinking_tokens;
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.thinking_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_places_special_chapters() {
        let mut numbers: Vec<ChapterNumber> = [3, -2, 1, -1, 0, 2, -3]
            .into_iter()
            .map(ChapterNumber::new)
            .collect();
        numbers.sort();

        let values: Vec<i32> = numbers.iter().map(|n| n.value()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, -1, -2, -3]);
    }

    #[test]
    fn test_sort_order_is_independent_of_input_order() {
        let inputs = [
            vec![-1, 5, 0, 2],
            vec![2, 0, -1, 5],
            vec![5, 2, -1, 0],
        ];
        for input in inputs {
            let mut numbers: Vec<ChapterNumber> =
                input.into_iter().map(ChapterNumber::new).collect();
            numbers.sort();
            let values: Vec<i32> = numbers.iter().map(|n| n.value()).collect();
            assert_eq!(values, vec![0, 2, 5, -1]);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ChapterNumber::PROLOGUE.label(), "Prologue");
        assert_eq!(ChapterNumber::new(7).label(), "Chapter 7");
        assert_eq!(ChapterNumber::EPILOGUE.label(), "Epilogue");
    }

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.add(&TokenUsage::new(10, 20, 5));
        usage.add(&TokenUsage::new(1, 2, 0));
        assert_eq!(usage, TokenUsage::new(11, 22, 5));
        assert_eq!(usage.total(), 38);
    }
}
