//! Milvus 2.x backend over the RESTful API v2.
//!
//! Every call is `POST /v2/vectordb/<resource>/<action>` and replies with
//! `{"code": 0, "data": ...}` on success. Any other code is an error.

use super::{ensure_success, PrepareSummary, Retriever, SearchHit, VectorSource};
use crate::config::MilvusCfg;
use crate::corpus::Document;
use crate::error::{RagError, Result};
use crate::vector::{pseudo_vector, DIM};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const NAME: &str = "Milvus";

/// Documents are vectorised from their content.
const VECTOR_SOURCE: VectorSource = VectorSource::Content;

const SHARDS: u32 = 2;
const HNSW_M: u32 = 8;
const HNSW_EF_CONSTRUCTION: u32 = 64;
const HNSW_EF_SEARCH: u32 = 32;

#[derive(Deserialize)]
struct Reply {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

pub struct MilvusRetriever {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    collection: String,
}

impl MilvusRetriever {
    /// Connect and verify the server answers `collections/list`.
    pub async fn connect(cfg: &MilvusCfg, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let retriever = Self {
            client,
            base_url: cfg.base_url(),
            token: cfg.token.clone(),
            collection: cfg.collection_name.clone(),
        };
        let collections = retriever.call("collections/list", "连接", json!({})).await?;
        tracing::info!(
            url = %retriever.base_url,
            collections = collections.as_array().map_or(0, Vec::len),
            "connected to milvus"
        );
        Ok(retriever)
    }

    async fn call(&self, endpoint: &str, op: &'static str, body: Value) -> Result<Value> {
        let mut req = self
            .client
            .post(format!("{}/v2/vectordb/{}", self.base_url, endpoint))
            .json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| RagError::backend(NAME, op, e))?;
        let reply: Reply = ensure_success(resp, NAME, op)
            .await?
            .json()
            .await
            .map_err(|e| RagError::backend(NAME, op, e))?;
        if reply.code != 0 {
            return Err(RagError::backend(NAME, op, format!("code {}: {}", reply.code, reply.message)));
        }
        Ok(reply.data)
    }

    fn named(&self) -> Value {
        json!({ "collectionName": self.collection })
    }

    async fn has_collection(&self) -> Result<bool> {
        let data = self.call("collections/has", "检查集合存在", self.named()).await?;
        Ok(data["has"].as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl Retriever for MilvusRetriever {
    fn name(&self) -> &str {
        NAME
    }

    async fn prepare(&self, documents: &[Document]) -> Result<PrepareSummary> {
        if self.has_collection().await? {
            self.call("collections/drop", "删除集合", self.named()).await?;
            tracing::info!(collection = %self.collection, "dropped existing collection");
        }

        self.call("collections/create", "创建集合", create_collection_body(&self.collection))
            .await?;

        let data = self
            .call("entities/insert", "插入文档", insert_body(&self.collection, documents))
            .await?;
        let inserted = data["insertCount"]
            .as_u64()
            .map_or(documents.len(), |n| n as usize);

        self.call("indexes/create", "创建向量索引", create_index_body(&self.collection))
            .await?;

        tracing::info!(collection = %self.collection, inserted, "collection ready");
        Ok(PrepareSummary { target: self.collection.clone(), inserted })
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.call("collections/load", "加载集合", self.named()).await?;

        let data = self
            .call("entities/search", "搜索", search_body(&self.collection, &pseudo_vector(query), top_k))
            .await?;
        let raw: Vec<RawHit> = serde_json::from_value(data)
            .map_err(|e| RagError::backend(NAME, "解析搜索结果", e))?;

        Ok(raw
            .into_iter()
            .map(|hit| {
                let score = distance_to_score(hit.distance);
                tracing::debug!(id = %hit.id, title = %hit.title, score, "found document");
                SearchHit { title: hit.title, content: hit.content, score }
            })
            .collect())
    }
}

/// L2 distance is unbounded above; fold it into `(0, 1]`.
fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

fn create_collection_body(collection: &str) -> Value {
    json!({
        "collectionName": collection,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": [
                {
                    "fieldName": "id",
                    "dataType": "VarChar",
                    "isPrimary": true,
                    "elementTypeParams": { "max_length": 100 }
                },
                {
                    "fieldName": "title",
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": 200 }
                },
                {
                    "fieldName": "content",
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": 10000 }
                },
                {
                    "fieldName": "vector",
                    "dataType": "FloatVector",
                    "elementTypeParams": { "dim": DIM }
                }
            ]
        },
        "params": { "shardsNum": SHARDS }
    })
}

fn insert_body(collection: &str, documents: &[Document]) -> Value {
    let rows: Vec<Value> = documents
        .iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "title": doc.title,
                "content": doc.content,
                "vector": pseudo_vector(VECTOR_SOURCE.text(doc)),
            })
        })
        .collect();
    json!({ "collectionName": collection, "data": rows })
}

fn create_index_body(collection: &str) -> Value {
    json!({
        "collectionName": collection,
        "indexParams": [{
            "fieldName": "vector",
            "indexName": "vector",
            "metricType": "L2",
            "params": {
                "index_type": "HNSW",
                "M": HNSW_M,
                "efConstruction": HNSW_EF_CONSTRUCTION
            }
        }]
    })
}

fn search_body(collection: &str, vector: &[f32; DIM], top_k: usize) -> Value {
    json!({
        "collectionName": collection,
        "data": [vector],
        "annsField": "vector",
        "limit": top_k,
        "outputFields": ["title", "content"],
        "searchParams": {
            "metricType": "L2",
            "params": { "ef": HNSW_EF_SEARCH }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::sample_documents;

    #[test]
    fn schema_has_varchar_primary_key_and_four_dim_vector() {
        let body = create_collection_body("rag_demo");
        let fields = body["schema"]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0]["fieldName"], "id");
        assert_eq!(fields[0]["isPrimary"], true);
        assert_eq!(fields[3]["elementTypeParams"]["dim"], 4);
        assert_eq!(body["schema"]["autoId"], false);
        assert_eq!(body["params"]["shardsNum"], 2);
    }

    #[test]
    fn insert_rows_use_content_vectors() {
        let docs = sample_documents();
        let body = insert_body("rag_demo", &docs);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], "doc_002");
        let expected = serde_json::to_value(pseudo_vector(&docs[1].content)).unwrap();
        assert_eq!(rows[1]["vector"], expected);
    }

    #[test]
    fn hnsw_index_parameters() {
        let body = create_index_body("rag_demo");
        let index = &body["indexParams"][0];
        assert_eq!(index["metricType"], "L2");
        assert_eq!(index["params"]["index_type"], "HNSW");
        assert_eq!(index["params"]["M"], 8);
        assert_eq!(index["params"]["efConstruction"], 64);
    }

    #[test]
    fn search_requests_title_and_content() {
        let body = search_body("rag_demo", &pseudo_vector("闫同学是谁？"), 3);
        assert_eq!(body["limit"], 3);
        assert_eq!(body["annsField"], "vector");
        assert_eq!(body["outputFields"], json!(["title", "content"]));
        assert_eq!(body["searchParams"]["params"]["ef"], 32);
        assert_eq!(body["data"][0].as_array().unwrap().len(), DIM);
    }

    #[test]
    fn distance_folds_into_unit_interval() {
        assert_eq!(distance_to_score(0.0), 1.0);
        assert_eq!(distance_to_score(1.0), 0.5);
        assert!(distance_to_score(1e6) > 0.0);
    }
}
