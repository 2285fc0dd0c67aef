//! Console text for the comparison run. Pure formatting; the CLI decides where it goes.

use crate::pipeline::{DirectAnswer, RagAnswer};
use crate::retrieval::{PrepareSummary, SearchHit};
use std::fmt::Write as _;
use std::time::Duration;

const RULE_WIDTH: usize = 50;
/// Only the top document's content is previewed, cut to this many characters.
const SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Elastic,
    Milvus,
}

/// Backend-specific wording: banner, progress lines and closing remark.
#[derive(Debug, Clone, Copy)]
pub struct DemoProfile {
    pub backend: Backend,
    pub banner: &'static str,
    pub conclusion: &'static str,
}

pub const ELASTIC: DemoProfile = DemoProfile {
    backend: Backend::Elastic,
    banner: "🚀 ElasticSearch 8.x RAG Demo启动...\n=====",
    conclusion: "💡 总结: ElasticSearch RAG在需要混合搜索的场景表现更好",
};

pub const MILVUS: DemoProfile = DemoProfile {
    backend: Backend::Milvus,
    banner: "🚀 RAG简易Demo启动...",
    conclusion: "💡 总结: RAG在需要最新、具体信息的场景表现更好",
};

pub fn rule(ch: char) -> String {
    std::iter::repeat_n(ch, RULE_WIDTH).collect()
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

pub fn knowledge_base_ready(profile: &DemoProfile, summary: &PrepareSummary) -> String {
    let inserted = match profile.backend {
        Backend::Elastic => format!(
            "✅ 索引 {} 创建成功\n✅ 成功插入 {} 个文档到ElasticSearch",
            summary.target, summary.inserted
        ),
        Backend::Milvus => format!("✅ 插入了 {} 个文档到知识库", summary.inserted),
    };
    format!("{inserted}\n✅ 知识库初始化完成")
}

/// Progress line printed before each answer is fetched, e.g. `what = "纯DeepSeek"`.
pub fn fetching(profile: &DemoProfile, what: &str) -> String {
    let tail = match profile.backend {
        Backend::Elastic => "...",
        Backend::Milvus => "：",
    };
    format!("\n🔍 获取{what}回答{tail}")
}

pub fn run_header() -> String {
    format!("\n{}\n🧪 开始对比测试\n{}", rule('='), rule('='))
}

pub fn question_header(index: usize, total: usize, question: &str) -> String {
    format!("\n📝 测试 {}/{total}\n❓ 问题: {question}", index + 1)
}

pub fn direct_block(answer: &DirectAnswer) -> String {
    format!("⏱️  响应时间: {:.2}秒\n💬 回答: {}", secs(answer.elapsed), answer.content)
}

pub fn rag_block(answer: &RagAnswer) -> String {
    let mut out = format!("⏱️  响应时间: {:.2}秒\n💬 回答: {}", secs(answer.elapsed), answer.content);
    out.push_str(&sources_block(&answer.sources));
    out
}

/// Numbered hit list; the first hit also gets a content preview. Empty for no hits.
pub fn sources_block(sources: &[SearchHit]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n📄 检索到的相关文档:");
    for (j, source) in sources.iter().enumerate() {
        let _ = write!(out, "\n  {}. [相似度: {:.2}] {}", j + 1, source.score, source.title);
        if j == 0 {
            let _ = write!(out, "\n     内容: {}", snippet(&source.content, SNIPPET_CHARS));
        }
    }
    out
}

pub fn comparison_block(direct: &DirectAnswer, rag: &RagAnswer) -> String {
    let delta = secs(rag.elapsed) - secs(direct.elapsed);
    format!(
        "\n📊 对比分析:\n  - 时间开销: RAG比纯DeepSeek慢 {delta:.2}秒\n  - 信息质量: RAG基于 {} 个相关文档生成",
        rag.sources.len()
    )
}

pub fn failure(what: &str, err: &dyn std::fmt::Display) -> String {
    format!("❌ 获取{what}失败: {err}")
}

pub fn closing(profile: &DemoProfile) -> String {
    format!("\n{}\n🎉 测试完成!\n{}\n{}", rule('='), profile.conclusion, rule('='))
}

/// First `max_chars` characters, with "..." appended when anything was cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
