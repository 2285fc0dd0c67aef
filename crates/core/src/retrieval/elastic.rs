//! Elasticsearch 8.x backend over the REST API.
//!
//! Ranking uses a `script_score` cosine query on the `vector` field. If that
//! request cannot be sent or is rejected, a `multi_match` text query over
//! title and content runs instead.

use super::{ensure_success, PrepareSummary, Retriever, SearchHit, VectorSource};
use crate::config::ElasticCfg;
use crate::corpus::Document;
use crate::error::{RagError, Result};
use crate::vector::{pseudo_vector, DIM};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const NAME: &str = "ElasticSearch";

/// Documents are vectorised from their title.
const VECTOR_SOURCE: VectorSource = VectorSource::Title;

/// `cosineSimilarity + 1.0` lies in `[0, 2]`.
const VECTOR_SCORE_SCALE: f64 = 2.0;
/// BM25 scores have no upper bound; this only squeezes typical values under 1.
const TEXT_SCORE_SCALE: f64 = 100.0;

#[derive(Deserialize)]
struct ClusterInfo {
    #[serde(default)]
    cluster_name: String,
    version: Option<ClusterVersion>,
}

#[derive(Deserialize)]
struct ClusterVersion {
    number: String,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    hits: Option<HitsEnvelope>,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Option<HitSource>,
}

#[derive(Deserialize)]
struct HitSource {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

pub struct ElasticRetriever {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticRetriever {
    /// Connect and verify the cluster answers `GET /`.
    pub async fn connect(cfg: &ElasticCfg, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = cfg.base_url();

        let resp = client
            .get(&base_url)
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "连接", e))?;
        let info: ClusterInfo = ensure_success(resp, NAME, "连接").await?.json().await?;
        tracing::info!(
            url = %base_url,
            cluster = %info.cluster_name,
            version = info.version.as_ref().map(|v| v.number.as_str()).unwrap_or("unknown"),
            "connected to elasticsearch"
        );

        Ok(Self { client, base_url, index: cfg.index_name.clone() })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.index, suffix)
    }

    async fn index_exists(&self) -> Result<bool> {
        let resp = self
            .client
            .head(self.url(""))
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "检查索引存在", e))?;
        Ok(resp.status() == reqwest::StatusCode::OK)
    }

    async fn delete_index(&self) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(""))
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "删除索引", e))?;
        ensure_success(resp, NAME, "删除索引").await?;
        tracing::info!(index = %self.index, "dropped existing index");
        Ok(())
    }

    async fn create_index(&self) -> Result<()> {
        let resp = self
            .client
            .put(self.url(""))
            .json(&index_definition())
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "创建索引", e))?;
        ensure_success(resp, NAME, "创建索引").await?;
        Ok(())
    }

    async fn bulk_insert(&self, documents: &[Document]) -> Result<usize> {
        let body = bulk_body(&self.index, documents, Utc::now())?;
        let resp = self
            .client
            .post(self.url("/_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "批量插入", e))?;
        let reply: Value = ensure_success(resp, NAME, "批量插入").await?.json().await?;
        check_bulk_reply(&reply)?;
        Ok(documents.len())
    }

    async fn refresh(&self) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/_refresh"))
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "刷新索引", e))?;
        ensure_success(resp, NAME, "刷新索引").await?;
        Ok(())
    }

    async fn text_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let resp = self
            .client
            .post(self.url("/_search"))
            .json(&text_query(query, top_k))
            .send()
            .await
            .map_err(|e| RagError::backend(NAME, "混合搜索", e))?;
        let parsed: SearchResponse = ensure_success(resp, NAME, "混合搜索")
            .await?
            .json()
            .await
            .map_err(|e| RagError::backend(NAME, "解析混合搜索结果", e))?;
        Ok(collect_hits(parsed, TEXT_SCORE_SCALE))
    }
}

#[async_trait]
impl Retriever for ElasticRetriever {
    fn name(&self) -> &str {
        NAME
    }

    async fn prepare(&self, documents: &[Document]) -> Result<PrepareSummary> {
        if self.index_exists().await? {
            self.delete_index().await?;
        }
        self.create_index().await?;
        let inserted = self.bulk_insert(documents).await?;
        self.refresh().await?;
        tracing::info!(index = %self.index, inserted, "index ready");
        Ok(PrepareSummary { target: self.index.clone(), inserted })
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let body = vector_query(&pseudo_vector(query), top_k);
        let sent = self
            .client
            .post(self.url("/_search"))
            .query(&[("track_total_hits", "false")])
            .json(&body)
            .send()
            .await;

        let resp = match sent {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "vector search rejected, falling back to text search");
                return self.text_search(query, top_k).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "vector search failed, falling back to text search");
                return self.text_search(query, top_k).await;
            }
        };

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| RagError::backend(NAME, "解析搜索结果", e))?;
        let hits = collect_hits(parsed, VECTOR_SCORE_SCALE);
        for hit in &hits {
            tracing::debug!(title = %hit.title, score = hit.score, "found document");
        }
        Ok(hits)
    }
}

fn index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "analysis": {
                "analyzer": {
                    "default": { "type": "standard" }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": { "type": "text", "analyzer": "standard" },
                "content": { "type": "text", "analyzer": "standard" },
                "vector": {
                    "type": "dense_vector",
                    "dims": DIM,
                    "index": true,
                    "similarity": "cosine"
                },
                "meta": { "type": "object", "dynamic": true },
                "timestamp": { "type": "date" }
            }
        }
    })
}

/// NDJSON body: an action line and a source line per document.
fn bulk_body(index: &str, documents: &[Document], now: DateTime<Utc>) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let mut meta = doc.meta.clone();
        meta.timestamp = Some(now);

        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        let source = json!({
            "id": doc.id,
            "title": doc.title,
            "content": doc.content,
            "vector": pseudo_vector(VECTOR_SOURCE.text(doc)),
            "meta": meta,
        });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&source)?);
        body.push('\n');
    }
    Ok(body)
}

/// A 2xx bulk reply can still carry per-item failures.
fn check_bulk_reply(reply: &Value) -> Result<()> {
    if reply["errors"] != Value::Bool(true) {
        return Ok(());
    }
    let reason = reply["items"]
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|item| item["index"]["error"]["reason"].as_str())
        .unwrap_or("批量插入存在错误");
    Err(RagError::backend(NAME, "批量插入", reason))
}

fn vector_query(vector: &[f32; DIM], top_k: usize) -> Value {
    let query_vector: Vec<f64> = vector.iter().map(|v| f64::from(*v)).collect();
    json!({
        "size": top_k,
        "query": {
            "script_score": {
                "query": { "match_all": {} },
                "script": {
                    "source": "cosineSimilarity(params.query_vector, 'vector') + 1.0",
                    "params": { "query_vector": query_vector }
                }
            }
        },
        "_source": ["title", "content"]
    })
}

fn text_query(query: &str, top_k: usize) -> Value {
    json!({
        "size": top_k,
        "query": {
            "multi_match": {
                "query": query,
                "fields": ["title", "content"],
                "type": "best_fields",
                "operator": "and"
            }
        },
        "_source": ["title", "content"]
    })
}

/// Hits without `_source` are skipped; a missing `_score` counts as 0.
fn collect_hits(resp: SearchResponse, scale: f64) -> Vec<SearchHit> {
    resp.hits
        .map(|h| h.hits)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|hit| {
            let source = hit.source?;
            Some(SearchHit {
                title: source.title,
                content: source.content,
                score: (hit.score.unwrap_or(0.0) / scale).min(1.0),
            })
        })
        .collect()
}
