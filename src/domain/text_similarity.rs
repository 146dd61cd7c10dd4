//! 文本相似度工具
//!
//! 提供章节指纹、词级 shingle 相似度与缺陷描述匹配所需的归一化

use std::collections::HashSet;

/// 默认 shingle 长度（词数）
pub const DEFAULT_SHINGLE_SIZE: usize = 3;

/// 计算内容指纹（MD5 十六进制）
pub fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content.trim().as_bytes()))
}

/// 归一化为小写词序列，去除标点
///
/// CJK 文本没有空格分词，按单字切分
pub fn normalize_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(ch.to_string());
        } else if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

#[inline]
fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}

/// 归一化文本（用于精确比较）
pub fn normalize_text(text: &str) -> String {
    normalize_words(text).join(" ")
}

/// 生成词级 shingle 集合
fn shingles(words: &[String], size: usize) -> HashSet<String> {
    let size = size.max(1);
    if words.len() <= size {
        let mut set = HashSet::new();
        if !words.is_empty() {
            set.insert(words.join(" "));
        }
        return set;
    }
    words.windows(size).map(|w| w.join(" ")).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// 章节内容指纹：MD5 加 shingle 集合，两两比较时每章只分词一次
#[derive(Debug, Clone)]
pub struct Fingerprint {
    hash: String,
    shingles: HashSet<String>,
}

impl Fingerprint {
    pub fn new(content: &str) -> Self {
        Self {
            hash: content_hash(content),
            shingles: shingles(&normalize_words(content), DEFAULT_SHINGLE_SIZE),
        }
    }

    /// 内容相似度 [0, 1]：指纹相同直接返回 1.0，否则为 shingle Jaccard 系数
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        if self.hash == other.hash {
            return 1.0;
        }
        jaccard(&self.shingles, &other.shingles)
    }
}

/// 词集合重叠度 [0, 1]（短文本比较用）
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let wa: HashSet<String> = normalize_words(a).into_iter().collect();
    let wb: HashSet<String> = normalize_words(b).into_iter().collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    jaccard(&wa, &wb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_words_strips_punctuation() {
        let words = normalize_words("Hello, World! It's 1920.");
        assert_eq!(words, vec!["hello", "world", "it", "s", "1920"]);
    }

    #[test]
    fn test_normalize_words_splits_cjk() {
        let words = normalize_words("第一章 萧炎");
        assert_eq!(words, vec!["第", "一", "章", "萧", "炎"]);
    }

    fn content_similarity(a: &str, b: &str) -> f64 {
        Fingerprint::new(a).similarity(&Fingerprint::new(b))
    }

    #[test]
    fn test_identical_content_is_fully_similar() {
        let text = "The rain fell on the quiet harbor all night long.";
        assert_eq!(content_similarity(text, text), 1.0);
        // 仅首尾空白不同
        assert_eq!(content_similarity(text, &format!("  {}\n", text)), 1.0);
    }

    #[test]
    fn test_unrelated_content_is_dissimilar() {
        let a = "The rain fell on the quiet harbor all night long.";
        let b = "A merchant counted coins beside the dusty caravan road.";
        assert!(content_similarity(a, b) < 0.1);
    }

    #[test]
    fn test_near_duplicate_scores_high() {
        let a = "She opened the door and saw the letter lying on the floor of the hall where the cat slept";
        let b = "She opened the door and saw the letter lying on the floor of the hall where the dog slept";
        let score = content_similarity(a, b);
        assert!(score > 0.6, "score was {}", score);
    }

    #[test]
    fn test_word_overlap_ignores_case_and_order() {
        let a = "Eye color changes from blue to green";
        let b = "changes from BLUE to green: eye color";
        assert_eq!(word_overlap(a, b), 1.0);
    }
}
