//! 提示词模板
//!
//! 所有结构化调用都要求模型只输出一个 JSON 对象

use crate::domain::manuscript::Chapter;
use crate::domain::review::Defect;
use crate::domain::structure::StructuralReport;
use crate::domain::world::WorldModel;

const DEFECT_SCHEMA: &str = r#"{
  "category": "structure|plot|world_consistency|continuity|character|voice|pacing|repetition|anachronism|other",
  "severity": "critical|major|minor",
  "affected_chapters": [3],
  "description": "what is wrong, one or two sentences",
  "preserve_hint": "text or facts that must stay verbatim",
  "correction_instruction": "the exact change to make"
}"#;

pub const SUMMARY_SYSTEM: &str = r#"You are a meticulous fiction editor. Summarize the chapter you are given.

OUTPUT FORMAT (JSON):
{"summary": "120-200 words: key events, characters present, location, time, unresolved threads"}

Do not evaluate quality. Do not invent events."#;

pub const WORLD_EXTRACTION_SYSTEM: &str = r#"You extract the world model of a novel from a range of chapters.

OUTPUT FORMAT (JSON):
{
  "characters": [{"name": "...", "description": "...", "first_chapter": 1}],
  "locations": [{"name": "...", "description": "...", "first_chapter": 1}],
  "timeline_events": [{"name": "short label", "description": "...", "first_chapter": 1}],
  "world_rules": [{"name": "short label", "description": "...", "first_chapter": 1}],
  "setting_period": "e.g. 'Lisbon, 1755' or 'present day' or null",
  "confidence": 0.0
}

Use the chapter numbers exactly as labelled. Only record facts stated in the text."#;

pub const ARCHITECT_SYSTEM: &str = r#"You are a structural editor reviewing the architecture of a complete novel.
Inspect three axes: structure (chapter order, duplication, gaps), plot coherence, world consistency.

OUTPUT FORMAT (JSON):
{
  "problems": [DEFECT],
  "reorder_plan": [{"chapter": 5, "current_position": 4, "target_position": 2, "reason": "..."}],
  "notes": "one paragraph"
}

List every problem you find; an empty list means the architecture is flawless.
Every problem needs a surgical correction_instruction and a preserve_hint.
The reorder plan is advisory; propose moves only when order is clearly broken."#;

pub const STRUCTURAL_FIX_SYSTEM: &str = r#"You are a senior fiction editor correcting structural, plot, world and continuity defects in ONE chapter.

OUTPUT FORMAT (JSON):
{
  "content": "the full corrected chapter text",
  "changes": [{"problem": "...", "solution": "...", "before_snippet": "...", "after_snippet": "..."}]
}

RULES:
- Return the COMPLETE chapter, never a fragment or a diff
- Keep the length within 10% of the original
- Preserve every proper noun and every event that is not part of a defect
- Address every listed defect; leave everything else untouched
- Text named in a preserve_hint must stay verbatim"#;

pub const NARRATIVE_REWRITE_SYSTEM: &str = r#"You are a prose stylist fixing voice, pacing, repetition and period-language defects in ONE chapter.

OUTPUT FORMAT (JSON):
{
  "content": "the full rewritten chapter text",
  "changes": [{"problem": "...", "solution": "...", "before_snippet": "...", "after_snippet": "..."}]
}

RULES:
- Return the COMPLETE chapter
- Keep the length within 10% of the original
- Preserve plot, characters, proper nouns and events exactly
- Change only the sentences needed to address each listed defect"#;

pub const VERIFICATION_SYSTEM: &str = r#"You verify whether an editing instruction was applied.
You receive the instruction, the text before and the text after.

OUTPUT FORMAT (JSON):
{"applied": true, "evidence": "quote the changed passage or explain what is missing"}

Answer false if the instruction was ignored, only partially applied, or applied to the wrong passage."#;

pub const CONTINUITY_AUDIT_SYSTEM: &str = r#"You audit a window of consecutive chapters for continuity errors:
temporal errors, spatial errors, state-continuity errors (injuries, objects, clothing),
and premature knowledge (a character knows something before learning it).

OUTPUT FORMAT (JSON):
{"score": 0, "defects": [DEFECT], "details": "short overview"}

score is 0-10, 10 meaning no continuity errors. Cite the chapter of each error in affected_chapters."#;

pub const VOICE_AUDIT_SYSTEM: &str = r#"You audit a window of consecutive chapters for narrative voice and rhythm:
tonal drift, point-of-view slips, pacing anomalies (rushed or stalled scenes), flat tension arcs.

OUTPUT FORMAT (JSON):
{"score": 0, "defects": [DEFECT], "details": "short overview"}

score is 0-10, 10 meaning a consistent voice and well-paced rhythm."#;

pub const REPETITION_AUDIT_SYSTEM: &str = r#"You audit the chapter summaries of a whole novel for semantic repetition:
ideas, scenes, images or phrases that recur without purpose, and foreshadowing that is planted but never resolved.

OUTPUT FORMAT (JSON):
{
  "score": 0,
  "defects": [DEFECT],
  "unresolved_foreshadowing": [{"planted_in": 2, "description": "..."}],
  "details": "short overview"
}"#;

pub const PERIOD_DETECTION_SYSTEM: &str = r#"You determine the historical setting of a novel from sample chapters.

OUTPUT FORMAT (JSON):
{"is_contemporary": true, "setting_period": "e.g. 'present day' or 'Edo Japan, 1820s'"}

is_contemporary is true when the story takes place in the present day (roughly the last 20 years)."#;

pub const ANACHRONISM_AUDIT_SYSTEM: &str = r#"You audit historical fiction for anachronisms relative to its setting period.
Kinds: technological (devices, inventions), linguistic (idioms, slang, words not yet coined),
material (foods, fabrics, goods not yet available), conceptual (ideas, institutions, attitudes).

OUTPUT FORMAT (JSON):
{
  "score": 0,
  "anachronisms": [{
    "chapter": 3,
    "excerpt": "the offending phrase",
    "kind": "technological|linguistic|material|conceptual",
    "severity": "critical|major|minor",
    "explanation": "why it is out of period",
    "replacement": "a period-appropriate alternative"
  }]
}"#;

pub const FINAL_REVIEW_SYSTEM: &str = r#"You are the final reviewer deciding whether a revised novel is ready for publication.

OUTPUT FORMAT (JSON):
{"score": 0, "defects": [DEFECT], "summary": "one paragraph"}

score is 0-10. 9 or above means publishable.
Defects must be surgical: say exactly what must change (correction_instruction)
and what must be preserved verbatim (preserve_hint).
Do NOT report problems listed under ALREADY RESOLVED, even in other words."#;

pub const TRANSLATION_SYSTEM: &str = r#"You are a literary translator. Translate the chapter into the target language.
Preserve paragraph breaks, dialogue formatting, names and the author's voice.
Output only the translated chapter text, with no commentary."#;

/// 将 DEFECT 占位符替换为缺陷 schema
pub fn with_defect_schema(system: &str) -> String {
    system.replace("DEFECT", DEFECT_SCHEMA)
}

/// 章节块：带标签的全文
pub fn chapter_block(chapter: &Chapter) -> String {
    let title = if chapter.title().trim().is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", chapter.title().trim())
    };
    format!(
        "=== {} (number {}){} ===\n{}\n",
        chapter.number().label(),
        chapter.number().value(),
        title,
        chapter.current_content()
    )
}

/// 摘要块：每章一行
pub fn summaries_block(chapters: &[&Chapter], fallback_chars: usize) -> String {
    chapters
        .iter()
        .map(|c| {
            let summary = c
                .summary()
                .map(str::to_string)
                .unwrap_or_else(|| super::parsing::excerpt(c.current_content(), fallback_chars));
            format!("[{} | number {}] {}", c.number().label(), c.number().value(), summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn world_model_block(model: &WorldModel) -> String {
    serde_json::to_string_pretty(model).unwrap_or_else(|_| "{}".to_string())
}

pub fn structural_block(report: &StructuralReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

pub fn summary_user(chapter: &Chapter) -> String {
    format!("Summarize this chapter.\n\n{}", chapter_block(chapter))
}

pub fn world_extraction_user(chapters: &[&Chapter], genre: &str) -> String {
    let range = match (chapters.first(), chapters.last()) {
        (Some(first), Some(last)) => format!("{} to {}", first.number().label(), last.number().label()),
        _ => String::new(),
    };
    let body: String = chapters.iter().map(|c| chapter_block(c)).collect();
    format!("Genre: {}\nChapters: {}\n\n{}", genre, range, body)
}

pub fn architect_user(
    model: &WorldModel,
    summaries: &str,
    structure: &StructuralReport,
    genre: &str,
) -> String {
    format!(
        "Genre: {}\n\nWORLD MODEL:\n{}\n\nSTRUCTURAL FINDINGS (already detected mechanically):\n{}\n\nCHAPTER SUMMARIES IN ORDER:\n{}",
        genre,
        world_model_block(model),
        structural_block(structure),
        summaries
    )
}

pub fn defect_lines(defects: &[&Defect]) -> String {
    defects
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let preserve = if d.preserve_hint.trim().is_empty() {
                String::new()
            } else {
                format!("\n   PRESERVE VERBATIM: {}", d.preserve_hint.trim())
            };
            format!(
                "{}. [{} / {}] {}\n   MUST CHANGE: {}{}",
                i + 1,
                d.category.as_str(),
                d.severity.as_str(),
                d.description.trim(),
                d.correction_instruction.trim(),
                preserve
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn fix_user(chapter: &Chapter, defects: &[&Defect], model: &WorldModel) -> String {
    format!(
        "WORLD MODEL (for consistency):\n{}\n\nDEFECTS TO FIX:\n{}\n\nCHAPTER ({} characters):\n{}",
        world_model_block(model),
        defect_lines(defects),
        chapter.char_count(),
        chapter_block(chapter)
    )
}

/// 升级后的修正提示：明确的失败警告 + 原样指令 + 强调指令
pub fn escalated_fix_user(chapter: &Chapter, defect: &Defect, model: &WorldModel) -> String {
    format!(
        "WARNING: A previous attempt to apply the following instruction FAILED. The text was returned without the required change.\n\n\
         INSTRUCTION (verbatim):\n{}\n\n\
         THIS CHANGE IS MANDATORY: {}\n\n\
         {}",
        defect.correction_instruction.trim(),
        defect.correction_instruction.trim().to_uppercase(),
        fix_user(chapter, &[defect], model)
    )
}

pub fn verification_user(instruction: &str, before: &str, after: &str) -> String {
    format!(
        "INSTRUCTION:\n{}\n\nBEFORE:\n{}\n\nAFTER:\n{}",
        instruction.trim(),
        before,
        after
    )
}

pub fn window_audit_user(chapters: &[&Chapter], model: &WorldModel) -> String {
    let body: String = chapters.iter().map(|c| chapter_block(c)).collect();
    format!("WORLD MODEL:\n{}\n\nCHAPTERS:\n{}", world_model_block(model), body)
}

pub fn repetition_user(summaries: &str) -> String {
    format!("CHAPTER SUMMARIES IN ORDER:\n{}", summaries)
}

pub fn period_detection_user(samples: &[&Chapter], excerpt_chars: usize) -> String {
    samples
        .iter()
        .map(|c| {
            format!(
                "=== {} ===\n{}\n",
                c.number().label(),
                super::parsing::excerpt(c.current_content(), excerpt_chars)
            )
        })
        .collect()
}

pub fn anachronism_user(period: &str, samples: &[&Chapter]) -> String {
    let body: String = samples.iter().map(|c| chapter_block(c)).collect();
    format!("SETTING PERIOD: {}\n\nCHAPTERS:\n{}", period, body)
}

pub fn final_review_user(
    summaries: &str,
    audit_notes: &str,
    resolved: &[String],
    pass_number: u32,
) -> String {
    let resolved_block = if resolved.is_empty() {
        "(none)".to_string()
    } else {
        resolved
            .iter()
            .map(|d| format!("- {}", d))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "REVIEW PASS {}\n\nALREADY RESOLVED (do not report again):\n{}\n\nAUDIT SUB-SCORES (context only):\n{}\n\nCHAPTER SUMMARIES IN ORDER:\n{}",
        pass_number, resolved_block, audit_notes, summaries
    )
}

pub fn translation_user(chapter: &Chapter, source_language: &str, target_language: &str) -> String {
    format!(
        "Source language: {}\nTarget language: {}\n\n{}",
        source_language,
        target_language,
        chapter_block(chapter)
    )
}
