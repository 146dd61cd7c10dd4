//! 结构分析
//!
//! 纯函数分析：重复章节、乱序章节、缺失章节

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::manuscript::{Chapter, ChapterNumber};
use super::text_similarity::Fingerprint;

/// 默认重复判定阈值
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.85;

/// 章节元数据摘要（结构分析输入）
#[derive(Debug, Clone)]
pub struct ChapterDigest {
    pub number: ChapterNumber,
    /// 来源顺序位置
    pub position: usize,
    pub title: String,
    pub content: String,
}

impl ChapterDigest {
    pub fn new(
        number: ChapterNumber,
        position: usize,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            number,
            position,
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn from_chapter(chapter: &Chapter) -> Self {
        Self::new(
            chapter.number(),
            chapter.position(),
            chapter.title(),
            chapter.current_content(),
        )
    }
}

/// 重复章节对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub first: ChapterNumber,
    pub second: ChapterNumber,
    pub first_position: usize,
    pub second_position: usize,
    pub similarity: f64,
}

/// 乱序原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutOfOrderReason {
    /// 标题中声明的编号与章节编号不一致
    TitleMismatch { stated: i32 },
    /// 来源顺序中排在编号更大的章节之后
    SequenceRegression { after: ChapterNumber },
}

/// 乱序章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfOrderChapter {
    pub number: ChapterNumber,
    pub position: usize,
    pub reason: OutOfOrderReason,
}

/// 结构分析报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralReport {
    pub has_issues: bool,
    pub duplicate_chapters: Vec<DuplicatePair>,
    pub out_of_order_chapters: Vec<OutOfOrderChapter>,
    pub missing_chapters: Vec<i32>,
}

impl StructuralReport {
    pub fn issue_count(&self) -> usize {
        self.duplicate_chapters.len() + self.out_of_order_chapters.len() + self.missing_chapters.len()
    }
}

/// 结构分析
///
/// `digests` 按来源顺序给出
pub fn analyze_structure(digests: &[ChapterDigest], duplicate_threshold: f64) -> StructuralReport {
    let duplicate_chapters = find_duplicates(digests, duplicate_threshold);
    let out_of_order_chapters = find_out_of_order(digests);
    let missing_chapters = find_missing(digests);

    let has_issues = !duplicate_chapters.is_empty()
        || !out_of_order_chapters.is_empty()
        || !missing_chapters.is_empty();

    StructuralReport {
        has_issues,
        duplicate_chapters,
        out_of_order_chapters,
        missing_chapters,
    }
}

fn find_duplicates(digests: &[ChapterDigest], threshold: f64) -> Vec<DuplicatePair> {
    let fingerprints: Vec<Fingerprint> = digests.iter().map(|d| Fingerprint::new(&d.content)).collect();

    let mut pairs = Vec::new();
    for i in 0..digests.len() {
        if digests[i].content.trim().is_empty() {
            continue;
        }
        for j in 0..i {
            if digests[j].content.trim().is_empty() {
                continue;
            }
            let similarity = fingerprints[i].similarity(&fingerprints[j]);
            if similarity >= threshold {
                pairs.push(DuplicatePair {
                    first: digests[j].number,
                    second: digests[i].number,
                    first_position: digests[j].position,
                    second_position: digests[i].position,
                    similarity,
                });
            }
        }
    }
    pairs
}

fn find_out_of_order(digests: &[ChapterDigest]) -> Vec<OutOfOrderChapter> {
    let mut ordered: Vec<&ChapterDigest> = digests.iter().collect();
    ordered.sort_by_key(|d| d.position);

    let mut result = Vec::new();
    let mut flagged: HashSet<usize> = HashSet::new();

    for digest in &ordered {
        if !digest.number.is_ordinary() {
            continue;
        }
        if let Some(stated) = stated_chapter_number(&digest.title) {
            if stated != digest.number.value() {
                flagged.insert(digest.position);
                result.push(OutOfOrderChapter {
                    number: digest.number,
                    position: digest.position,
                    reason: OutOfOrderReason::TitleMismatch { stated },
                });
            }
        }
    }

    let mut highest: Option<ChapterNumber> = None;
    for digest in &ordered {
        if !digest.number.is_ordinary() {
            continue;
        }
        match highest {
            Some(max) if digest.number < max => {
                if !flagged.contains(&digest.position) {
                    result.push(OutOfOrderChapter {
                        number: digest.number,
                        position: digest.position,
                        reason: OutOfOrderReason::SequenceRegression { after: max },
                    });
                }
            }
            _ => highest = Some(digest.number),
        }
    }

    result.sort_by_key(|c| c.position);
    result
}

fn find_missing(digests: &[ChapterDigest]) -> Vec<i32> {
    let present: BTreeSet<i32> = digests
        .iter()
        .filter(|d| d.number.is_ordinary())
        .map(|d| d.number.value())
        .collect();

    let Some(&max) = present.iter().next_back() else {
        return Vec::new();
    };
    (1..=max).filter(|n| !present.contains(n)).collect()
}

const CHAPTER_KEYWORDS: &[&str] = &[
    "chapter", "capítulo", "capitulo", "chapitre", "kapitel", "capitolo", "cap",
];

/// 从标题中解析声明的章节编号
///
/// 支持 "Chapter 7"、"Capítulo VII"、"第7章"、"第七章"
pub fn stated_chapter_number(title: &str) -> Option<i32> {
    if let Some(n) = parse_cjk_chapter(title) {
        return Some(n);
    }

    let lower = title.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | '-' | '—' | ','))
        .filter(|t| !t.is_empty())
        .collect();

    for window in tokens.windows(2) {
        if CHAPTER_KEYWORDS.contains(&window[0]) {
            let candidate = window[1];
            if let Ok(n) = candidate.parse::<i32>() {
                return Some(n);
            }
            if let Some(n) = parse_roman(candidate) {
                return Some(n);
            }
        }
    }
    None
}

fn parse_cjk_chapter(title: &str) -> Option<i32> {
    let start = title.find('第')?;
    let rest = &title[start + '第'.len_utf8()..];
    let end = rest.find(['章', '回', '节'])?;
    let inner = rest[..end].trim();
    if inner.is_empty() {
        return None;
    }
    if let Ok(n) = inner.parse::<i32>() {
        return Some(n);
    }
    parse_chinese_numeral(inner)
}

fn parse_chinese_numeral(text: &str) -> Option<i32> {
    let digit = |c: char| -> Option<i32> {
        Some(match c {
            '零' | '〇' => 0,
            '一' => 1,
            '二' | '两' => 2,
            '三' => 3,
            '四' => 4,
            '五' => 5,
            '六' => 6,
            '七' => 7,
            '八' => 8,
            '九' => 9,
            _ => return None,
        })
    };

    let mut total = 0;
    let mut current = 0;
    for ch in text.chars() {
        match ch {
            '千' => {
                total += current.max(1) * 1000;
                current = 0;
            }
            '百' => {
                total += current.max(1) * 100;
                current = 0;
            }
            '十' => {
                total += current.max(1) * 10;
                current = 0;
            }
            c => current = digit(c)?,
        }
    }
    let value = total + current;
    if value > 0 {
        Some(value)
    } else {
        None
    }
}

fn parse_roman(token: &str) -> Option<i32> {
    if token.is_empty() || !token.chars().all(|c| "ivxlcdm".contains(c)) {
        return None;
    }
    let value_of = |c: char| match c {
        'i' => 1,
        'v' => 5,
        'x' => 10,
        'l' => 50,
        'c' => 100,
        'd' => 500,
        'm' => 1000,
        _ => 0,
    };
    let values: Vec<i32> = token.chars().map(value_of).collect();
    let mut total = 0;
    for (i, v) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > v => total -= v,
            _ => total += v,
        }
    }
    if total > 0 {
        Some(total)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(number: i32, position: usize, title: &str, content: &str) -> ChapterDigest {
        ChapterDigest::new(ChapterNumber::new(number), position, title, content)
    }

    #[test]
    fn test_duplicate_and_missing_scenario() {
        let chapter_two = "Mara crossed the frozen river at dawn, carrying the sealed letter for the duke.";
        let digests = vec![
            digest(0, 0, "Prologue", "Long before the war, the river had a name nobody spoke."),
            digest(1, 1, "Chapter 1", "The village woke to bells and smoke rising from the mill."),
            digest(2, 2, "Chapter 2", chapter_two),
            digest(2, 3, "Chapter 2", chapter_two),
            digest(4, 4, "Chapter 4", "At the keep, the duke read the letter twice and burned it."),
        ];

        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);

        assert!(report.has_issues);
        assert_eq!(report.duplicate_chapters.len(), 1);
        let pair = &report.duplicate_chapters[0];
        assert_eq!((pair.first.value(), pair.second.value()), (2, 2));
        assert_eq!(pair.similarity, 1.0);
        assert_eq!(report.missing_chapters, vec![3]);
        assert!(report.out_of_order_chapters.is_empty());
    }

    #[test]
    fn test_lightly_edited_copy_is_a_duplicate() {
        let original = "Mara crossed the frozen river at dawn carrying the sealed letter for the duke \
                        while the guards slept beside the burned out watch fire on the eastern bank";
        let edited = "Mara crossed the frozen river at dawn carrying the sealed letter for the duke \
                      while the guards slept beside the burned out watch fire on the western bank";
        let digests = vec![
            digest(1, 0, "Chapter 1", original),
            digest(2, 1, "Chapter 2", edited),
            digest(3, 2, "Chapter 3", "At the keep, the duke read the letter twice and burned it."),
        ];

        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);

        assert_eq!(report.duplicate_chapters.len(), 1);
        let pair = &report.duplicate_chapters[0];
        assert_eq!((pair.first.value(), pair.second.value()), (1, 2));
        assert!(pair.similarity >= DEFAULT_DUPLICATE_THRESHOLD && pair.similarity < 1.0);
    }

    #[test]
    fn test_special_markers_excluded_from_gap_analysis() {
        let digests = vec![
            digest(-2, 0, "Author's note", "Thanks."),
            digest(0, 1, "Prologue", "Before."),
            digest(1, 2, "One", "First chapter text here."),
            digest(2, 3, "Two", "Second chapter text here."),
            digest(-1, 4, "Epilogue", "After."),
        ];
        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);
        assert!(report.missing_chapters.is_empty());
        assert!(!report.has_issues);
    }

    #[test]
    fn test_missing_chapters_start_at_one() {
        let digests = vec![
            digest(3, 0, "Three", "alpha beta gamma delta"),
            digest(5, 1, "Five", "epsilon zeta eta theta"),
        ];
        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);
        assert_eq!(report.missing_chapters, vec![1, 2, 4]);
    }

    #[test]
    fn test_sequence_regression_detected() {
        let digests = vec![
            digest(1, 0, "", "one one one one"),
            digest(3, 1, "", "three three three three"),
            digest(2, 2, "", "two two two two"),
        ];
        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);
        assert_eq!(report.out_of_order_chapters.len(), 1);
        let entry = &report.out_of_order_chapters[0];
        assert_eq!(entry.number.value(), 2);
        assert_eq!(
            entry.reason,
            OutOfOrderReason::SequenceRegression {
                after: ChapterNumber::new(3)
            }
        );
    }

    #[test]
    fn test_title_mismatch_detected() {
        let digests = vec![
            digest(1, 0, "Chapter 1: Arrival", "arrival text goes here"),
            digest(2, 1, "Chapter 5: The Siege", "siege text goes here"),
        ];
        let report = analyze_structure(&digests, DEFAULT_DUPLICATE_THRESHOLD);
        assert_eq!(report.out_of_order_chapters.len(), 1);
        assert_eq!(
            report.out_of_order_chapters[0].reason,
            OutOfOrderReason::TitleMismatch { stated: 5 }
        );
    }

    #[test]
    fn test_stated_chapter_number_formats() {
        assert_eq!(stated_chapter_number("Chapter 12"), Some(12));
        assert_eq!(stated_chapter_number("CAPÍTULO IV - La fuga"), Some(4));
        assert_eq!(stated_chapter_number("第001章 陨落的天才"), Some(1));
        assert_eq!(stated_chapter_number("第二十三章"), Some(23));
        assert_eq!(stated_chapter_number("The Harbor"), None);
    }
}
