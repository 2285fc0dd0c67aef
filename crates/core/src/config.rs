use crate::error::{RagError, Result};
use ragcmp_llm::http::HttpProvider;
use std::collections::HashMap;
use std::time::Duration;

/// Chat completion settings.
#[derive(Debug, Clone)]
pub struct LlmCfg {
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's default base URL when set.
    pub base_url: Option<String>,
}

/// Elasticsearch connection settings.
#[derive(Debug, Clone)]
pub struct ElasticCfg {
    pub host: String,
    pub port: u16,
    pub index_name: String,
}

impl ElasticCfg {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Milvus connection settings.
#[derive(Debug, Clone)]
pub struct MilvusCfg {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
    pub collection_name: String,
}

impl MilvusCfg {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// All demo parameters. Loaded from the environment (plus an optional `.env`).
/// Empty values count as unset; unparsable numbers fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmCfg,
    pub elastic: ElasticCfg,
    pub milvus: MilvusCfg,
    pub top_k: usize,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env loaded");
        }
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Result<Self> {
        let api_key = get_opt(m, "DEEPSEEK_API_KEY")
            .ok_or_else(|| RagError::Config("DEEPSEEK_API_KEY不能为空".into()))?;

        let cfg = Self {
            llm: LlmCfg {
                api_key,
                model: get_or(m, "DEEPSEEK_MODEL", "deepseek-chat".to_string()),
                base_url: get_opt(m, "DEEPSEEK_BASE_URL"),
            },
            elastic: ElasticCfg {
                host: get_or(m, "ELASTIC_HOST", "localhost".to_string()),
                port: get_or(m, "ELASTIC_PORT", 9200),
                index_name: get_or(m, "INDEX_NAME", "rag_documents".to_string()),
            },
            milvus: MilvusCfg {
                host: get_or(m, "MILVUS_HOST", "localhost".to_string()),
                port: get_or(m, "MILVUS_PORT", 19530),
                token: get_opt(m, "MILVUS_TOKEN"),
                collection_name: get_or(m, "COLLECTION_NAME", "rag_demo".to_string()),
            },
            top_k: get_or(m, "RAG_TOP_K", 3usize).max(1),
            request_timeout_secs: get_or(m, "REQUEST_TIMEOUT_SECS", 60u64).max(1),
        };

        for (key, value) in cfg.to_entries() {
            tracing::debug!(key, value = %value, "config");
        }
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Chat completion provider for both the direct and the RAG path.
    pub fn build_provider(&self) -> Result<HttpProvider> {
        let provider = HttpProvider::new(
            self.llm.model.clone(),
            self.llm.api_key.clone(),
            self.llm.base_url.clone(),
        )
        .with_timeout(self.request_timeout())?;
        Ok(provider)
    }

    /// Resolved values for logging. The API key is never included.
    fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DEEPSEEK_MODEL", self.llm.model.clone()),
            ("DEEPSEEK_BASE_URL", self.llm.base_url.clone().unwrap_or_else(|| "<default>".into())),
            ("ELASTIC_URL", self.elastic.base_url()),
            ("INDEX_NAME", self.elastic.index_name.clone()),
            ("MILVUS_URL", self.milvus.base_url()),
            ("COLLECTION_NAME", self.milvus.collection_name.clone()),
            ("RAG_TOP_K", self.top_k.to_string()),
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs.to_string()),
        ]
    }
}

fn get_opt(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key).filter(|v| !v.is_empty()).cloned()
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
