use std::sync::Arc;

use anyhow::Context;
use ragcmp_cli::{logging, runner, signal};
use ragcmp_core::config::AppConfig;
use ragcmp_core::pipeline::RagSystem;
use ragcmp_core::report;
use ragcmp_core::retrieval::milvus::MilvusRetriever;
use ragcmp_llm::provider::LlmProvider;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let profile = report::MILVUS;
    println!("{}", profile.banner);

    let cfg = AppConfig::from_env().context("创建RAG系统失败")?;
    let llm = cfg.build_provider().context("创建RAG系统失败")?;
    tracing::info!(name = llm.name(), model = llm.model(), "LLM provider initialized");

    let retriever = MilvusRetriever::connect(&cfg.milvus, cfg.request_timeout())
        .await
        .context("连接Milvus失败")?;
    let system = RagSystem::new(Arc::new(llm), Box::new(retriever), cfg.top_k);

    let token = CancellationToken::new();
    signal::spawn_sigint_canceler(token.clone());

    let questions = runner::questions_from_args(std::env::args().skip(1));
    runner::run(&mut std::io::stdout(), &profile, system, &questions, token).await
}
