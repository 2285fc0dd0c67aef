use crate::corpus::sample_documents;
use crate::error::Result;
use crate::retrieval::{PrepareSummary, Retriever, SearchHit};
use ragcmp_llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DIRECT_SYSTEM_PROMPT: &str = "你是一个知识渊博的助手，请基于你的知识回答问题。";

const RAG_SYSTEM_PROMPT: &str = "你是一个严谨的AI助手，必须严格基于提供的上下文信息回答问题。\
    如果上下文信息不足，请如实告知。不要编造上下文之外的信息。";

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone)]
pub struct DirectAnswer {
    pub content: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub content: String,
    /// Retrieval plus generation.
    pub elapsed: Duration,
    pub sources: Vec<SearchHit>,
}

/// Render retrieved hits as the context block handed to the model.
pub fn build_context(hits: &[SearchHit]) -> String {
    let mut context = String::from("以下是相关文档信息：\n\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(context, "文档{}: {}", i + 1, hit.title);
        let _ = write!(context, "内容: {}\n\n", hit.content);
    }
    context
}

pub fn direct_messages(question: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(DIRECT_SYSTEM_PROMPT), ChatMessage::user(question)]
}

pub fn rag_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(RAG_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "上下文信息：\n{context}\n\n问题：{question}\n\n请基于上述上下文信息回答问题："
        )),
    ]
}

fn request(messages: Vec<ChatMessage>) -> CompletionRequest {
    CompletionRequest { messages, max_tokens: MAX_TOKENS, temperature: TEMPERATURE }
}

/// Answers the same question twice: straight from the model, and from the
/// model grounded on documents the retriever found.
pub struct RagSystem {
    llm: Arc<dyn LlmProvider>,
    retriever: Box<dyn Retriever>,
    top_k: usize,
}

impl RagSystem {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Box<dyn Retriever>, top_k: usize) -> Self {
        Self { llm, retriever, top_k }
    }

    pub fn backend_name(&self) -> &str {
        self.retriever.name()
    }

    /// Recreate the backend's index/collection from the sample corpus.
    pub async fn initialize_knowledge_base(&self) -> Result<PrepareSummary> {
        let documents = sample_documents();
        tracing::info!(backend = self.backend_name(), documents = documents.len(), "initializing knowledge base");
        self.retriever.prepare(&documents).await
    }

    pub async fn direct_answer(&self, question: &str) -> Result<DirectAnswer> {
        let start = Instant::now();
        let response = self.llm.complete(request(direct_messages(question))).await?;
        let elapsed = start.elapsed();
        tracing::info!(
            provider = self.llm.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            output_tokens = response.output_tokens,
            "direct answer"
        );
        Ok(DirectAnswer { content: response.content, elapsed })
    }

    pub async fn rag_answer(&self, question: &str) -> Result<RagAnswer> {
        let start = Instant::now();

        let sources = self.retriever.search(question, self.top_k).await?;
        let context = build_context(&sources);

        let response = self.llm.complete(request(rag_messages(question, &context))).await?;
        let elapsed = start.elapsed();
        tracing::info!(
            provider = self.llm.name(),
            backend = self.backend_name(),
            sources = sources.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "rag answer"
        );
        Ok(RagAnswer { content: response.content, elapsed, sources })
    }

    pub async fn close(self) {
        self.retriever.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;
    use crate::error::RagError;
    use async_trait::async_trait;
    use ragcmp_llm::provider::{MockProvider, Role};

    struct FixedRetriever {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn prepare(&self, documents: &[Document]) -> Result<PrepareSummary> {
            Ok(PrepareSummary { target: "memory".into(), inserted: documents.len() })
        }

        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }
    }

    struct BrokenRetriever;

    #[async_trait]
    impl Retriever for BrokenRetriever {
        fn name(&self) -> &str {
            "broken"
        }

        async fn prepare(&self, _documents: &[Document]) -> Result<PrepareSummary> {
            Err(RagError::backend("broken", "创建索引", "down"))
        }

        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchHit>> {
            Err(RagError::backend("broken", "搜索", "down"))
        }
    }

    fn hit(title: &str, content: &str) -> SearchHit {
        SearchHit { title: title.into(), content: content.into(), score: 0.5 }
    }

    #[test]
    fn context_numbers_documents() {
        let ctx = build_context(&[hit("标题一", "内容一"), hit("标题二", "内容二")]);
        assert_eq!(
            ctx,
            "以下是相关文档信息：\n\n文档1: 标题一\n内容: 内容一\n\n文档2: 标题二\n内容: 内容二\n\n"
        );
    }

    #[test]
    fn empty_context_keeps_header() {
        assert_eq!(build_context(&[]), "以下是相关文档信息：\n\n");
    }

    #[test]
    fn rag_prompt_embeds_context_and_question() {
        let msgs = rag_messages("谁？", "CTX");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("严格基于提供的上下文信息"));
        assert_eq!(msgs[1].content, "上下文信息：\nCTX\n\n问题：谁？\n\n请基于上述上下文信息回答问题：");
    }

    #[tokio::test]
    async fn direct_answer_sends_question_verbatim() {
        let llm = Arc::new(MockProvider::new("直接回答"));
        let system = RagSystem::new(llm.clone(), Box::new(FixedRetriever { hits: vec![] }), 3);

        let answer = system.direct_answer("闫同学是谁？").await.unwrap();
        assert_eq!(answer.content, "直接回答");

        let sent = llm.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].messages[1].content, "闫同学是谁？");
        assert_eq!(sent[0].max_tokens, 500);
        assert!((sent[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn rag_answer_grounds_prompt_on_hits() {
        let llm = Arc::new(MockProvider::new("基于文档的回答"));
        let hits = vec![hit("闫同学人物介绍", "技术博主"), hit("b", "c"), hit("d", "e"), hit("f", "g")];
        let system = RagSystem::new(llm.clone(), Box::new(FixedRetriever { hits }), 3);

        let answer = system.rag_answer("闫同学是谁？").await.unwrap();
        assert_eq!(answer.content, "基于文档的回答");
        assert_eq!(answer.sources.len(), 3);

        let prompt = &llm.requests()[0].messages[1].content;
        assert!(prompt.contains("文档1: 闫同学人物介绍"));
        assert!(prompt.contains("内容: 技术博主"));
        assert!(!prompt.contains("文档4"));
    }

    #[tokio::test]
    async fn retrieval_failure_skips_the_model() {
        let llm = Arc::new(MockProvider::new("unused"));
        let system = RagSystem::new(llm.clone(), Box::new(BrokenRetriever), 3);

        assert!(system.rag_answer("q").await.is_err());
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let system = RagSystem::new(
            Arc::new(MockProvider::failing()),
            Box::new(FixedRetriever { hits: vec![] }),
            3,
        );
        let err = system.direct_answer("q").await.unwrap_err();
        assert!(matches!(err, RagError::Llm(_)));
    }

    #[tokio::test]
    async fn knowledge_base_uses_sample_corpus() {
        let system = RagSystem::new(
            Arc::new(MockProvider::new("x")),
            Box::new(FixedRetriever { hits: vec![] }),
            3,
        );
        let summary = system.initialize_knowledge_base().await.unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(system.backend_name(), "fixed");
    }
}
