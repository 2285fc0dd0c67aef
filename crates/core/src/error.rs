use ragcmp_llm::provider::LlmError;

/// Error type for everything below the binaries.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("配置错误: {0}")]
    Config(String),
    /// A backend call failed or replied with an error status/code.
    #[error("{backend} {op}失败: {message}")]
    Backend {
        backend: &'static str,
        op: &'static str,
        message: String,
    },
    #[error("LLM 调用失败: {0}")]
    Llm(#[from] LlmError),
    #[error("HTTP 客户端错误: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub fn backend(backend: &'static str, op: &'static str, message: impl ToString) -> Self {
        Self::Backend { backend, op, message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
