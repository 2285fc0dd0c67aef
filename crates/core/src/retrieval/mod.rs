//! Retrieval backends: a search engine and a vector database, both reached over HTTP.

pub mod elastic;
pub mod milvus;

use crate::corpus::Document;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrieved document, in backend rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    /// Similarity normalised into `[0, 1]`; higher is closer.
    pub score: f64,
}

/// What `prepare` left behind, for the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSummary {
    /// Index or collection name.
    pub target: String,
    pub inserted: usize,
}

/// Which document field feeds the pseudo-vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSource {
    Title,
    Content,
}

impl VectorSource {
    pub fn text<'a>(&self, doc: &'a Document) -> &'a str {
        match self {
            Self::Title => &doc.title,
            Self::Content => &doc.content,
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Drop and recreate the index/collection, insert `documents`, make them searchable.
    async fn prepare(&self, documents: &[Document]) -> Result<PrepareSummary>;

    /// Up to `top_k` hits for `query`.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;

    /// Release the backend. Never fails the run.
    async fn close(&self) {
        tracing::debug!(backend = self.name(), "retriever closed");
    }
}

/// Turn a non-2xx reply into a `RagError::Backend` carrying status and body.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    backend: &'static str,
    op: &'static str,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RagError::backend(backend, op, format!("{status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::sample_documents;

    #[test]
    fn vector_source_picks_field() {
        let doc = &sample_documents()[0];
        assert_eq!(VectorSource::Title.text(doc), "闫同学人物介绍");
        assert!(VectorSource::Content.text(doc).starts_with("闫同学，男"));
    }
}
