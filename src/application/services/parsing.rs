//! 结构化响应解析
//!
//! 每个调用点都拿到 `Parsed(T) | Unparseable(raw)`，自行决定降级方式

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::manuscript::ChapterNumber;
use crate::domain::review::{Defect, DefectCategory, Severity};

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T> {
    Parsed(T),
    Unparseable(String),
}

impl<T> ParseResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ParseResult::Parsed(value) => Some(value),
            ParseResult::Unparseable(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseResult::Parsed(_))
    }
}

/// 解析模型返回的 JSON 对象
///
/// 容忍 markdown 代码围栏、前后多余文字、尾逗号和弯引号
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> ParseResult<T> {
    let clean = strip_markdown_fences(raw);

    if let Ok(value) = serde_json::from_str::<T>(clean) {
        return ParseResult::Parsed(value);
    }

    let candidates = [
        extract_json_fragment(clean, '{', '}'),
        extract_json_fragment(clean, '[', ']'),
    ];
    for fragment in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<T>(fragment) {
            return ParseResult::Parsed(value);
        }
        if let Ok(value) = serde_json::from_str::<T>(&fix_json_issues(fragment)) {
            return ParseResult::Parsed(value);
        }
    }

    ParseResult::Unparseable(raw.to_string())
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn fix_json_issues(json: &str) -> String {
    json.replace(",]", "]")
        .replace(",}", "}")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

// 宽松字段：单个字段类型不对时只丢弃该字段（或该条目），不让整个响应变成 Unparseable

/// null、数字、布尔都接受为字符串；null 为空串
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// 数字或数字字符串（"7"、"7/10"），其余为 None
pub fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(number_of(&Value::deserialize(deserializer)?))
}

/// 章节编号列表：接受数字、"3"、"Chapter 3"，也接受单个值；无法识别的条目丢弃
pub fn lenient_chapters<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i32>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    Ok(items
        .iter()
        .filter_map(number_of)
        .filter(|n| n.is_finite())
        .map(|n| n.round() as i32)
        .collect())
}

/// 列表中无法反序列化的条目单独丢弃
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if parsed.len() < total {
        tracing::debug!(total = total, kept = parsed.len(), "Dropped malformed list entries");
    }
    Ok(parsed)
}

fn lenient_category<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DefectCategory>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '-')
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// 模型返回的缺陷（宽松字段）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDefect {
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<DefectCategory>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: String,
    #[serde(default, deserialize_with = "lenient_chapters")]
    pub affected_chapters: Vec<i32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub preserve_hint: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub correction_instruction: String,
}

impl RawDefect {
    /// 转换为领域缺陷，未给出类别时使用调用方的默认类别
    pub fn into_defect(self, default_category: DefectCategory) -> Defect {
        let category = match self.category {
            Some(DefectCategory::Other) | None => default_category,
            Some(category) => category,
        };
        Defect {
            category,
            severity: Severity::parse_lenient(&self.severity),
            affected_chapters: self.affected_chapters.into_iter().map(ChapterNumber::new).collect(),
            description: self.description.trim().to_string(),
            preserve_hint: self.preserve_hint.trim().to_string(),
            correction_instruction: self.correction_instruction.trim().to_string(),
        }
    }
}

/// 截断到指定字符数（按字符而非字节）
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(max_chars).collect();
        format!("{}…", head.trim_end())
    }
}

/// 日志预览
pub fn preview(text: &str) -> String {
    excerpt(text, 200)
}
