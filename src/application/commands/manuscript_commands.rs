//! Manuscript Commands

/// 新章节
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub number: i32,
    pub title: String,
    pub content: String,
}

/// 导入已分章的稿件
#[derive(Debug, Clone)]
pub struct CreateManuscript {
    pub title: String,
    pub language: String,
    pub genre: String,
    pub chapters: Vec<NewChapter>,
}
