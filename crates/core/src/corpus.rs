//! The fixed knowledge base and test questions shared by both demos.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Questions asked when none are given on the command line.
pub const DEFAULT_QUESTIONS: [&str; 2] = ["闫同学是谁？", "介绍一下扯编程的淡公众号"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocMeta {
    pub category: String,
    pub source: String,
    pub date: String,
    /// Stamped when the document is written to the search engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub meta: DocMeta,
}

impl Document {
    fn new(id: &str, title: &str, content: &str, category: &str) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            meta: DocMeta {
                category: category.into(),
                source: title.into(),
                date: "2026-02-04".into(),
                timestamp: None,
            },
        }
    }
}

pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "doc_001",
            "闫同学人物介绍",
            "闫同学，男，来自中国，26岁，天蝎座，是知名技术博主、摄影博主、技术爱好者，擅长写Go语言，喜欢打羽毛球。",
            "人物介绍",
        ),
        Document::new(
            "doc_002",
            "扯编程的淡公众号介绍",
            "扯编程的淡，科技领域知名微信公众号，由闫同学运营，内容多为技术博客，日常生活感想，截止2026年1月，已有粉丝2000+。",
            "公众号介绍",
        ),
    ]
}
