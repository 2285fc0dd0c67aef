use std::future::Future;
use std::io::Write;

use anyhow::Context;
use ragcmp_core::corpus::DEFAULT_QUESTIONS;
use ragcmp_core::pipeline::RagSystem;
use ragcmp_core::report::{self, DemoProfile};
use tokio_util::sync::CancellationToken;

/// Positional arguments replace the built-in questions.
pub fn questions_from_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let given: Vec<String> = args.into_iter().filter(|a| !a.trim().is_empty()).collect();
    if given.is_empty() {
        DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
    } else {
        given
    }
}

async fn unless_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Build the knowledge base, then ask every question both ways and print the comparison.
/// A failed answer is reported and the next question runs. The backend is closed on every path.
pub async fn run<W: Write>(
    out: &mut W,
    profile: &DemoProfile,
    system: RagSystem,
    questions: &[String],
    token: CancellationToken,
) -> anyhow::Result<()> {
    let result = compare(out, profile, &system, questions, &token).await;
    system.close().await;
    result
}

async fn compare<W: Write>(
    out: &mut W,
    profile: &DemoProfile,
    system: &RagSystem,
    questions: &[String],
    token: &CancellationToken,
) -> anyhow::Result<()> {
    writeln!(out, "\n📚 正在初始化知识库...")?;
    let Some(prepared) = unless_cancelled(token, system.initialize_knowledge_base()).await else {
        return cancelled(out);
    };
    let summary = prepared.context("初始化知识库失败")?;
    writeln!(out, "{}", report::knowledge_base_ready(profile, &summary))?;

    writeln!(out, "{}", report::run_header())?;

    let total = questions.len();
    for (i, question) in questions.iter().enumerate() {
        writeln!(out, "{}", report::question_header(i, total, question))?;

        writeln!(out, "{}", report::fetching(profile, "纯DeepSeek"))?;
        let Some(direct) = unless_cancelled(token, system.direct_answer(question)).await else {
            return cancelled(out);
        };
        let direct = match direct {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(question = %question, error = %e, "direct answer failed");
                writeln!(out, "{}", report::failure("直接答案", &e))?;
                continue;
            }
        };
        writeln!(out, "{}", report::direct_block(&direct))?;

        writeln!(out, "{}", report::fetching(profile, "RAG增强"))?;
        let Some(rag) = unless_cancelled(token, system.rag_answer(question)).await else {
            return cancelled(out);
        };
        let rag = match rag {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(question = %question, error = %e, "rag answer failed");
                writeln!(out, "{}", report::failure("RAG答案", &e))?;
                continue;
            }
        };
        writeln!(out, "{}", report::rag_block(&rag))?;
        writeln!(out, "{}", report::comparison_block(&direct, &rag))?;

        if i + 1 < total {
            writeln!(out, "\n{}", report::rule('-'))?;
        }
    }

    writeln!(out, "{}", report::closing(profile))?;
    Ok(())
}

/// An interrupted run ends here, without the closing summary.
fn cancelled<W: Write>(out: &mut W) -> anyhow::Result<()> {
    tracing::info!("run cancelled");
    writeln!(out, "⚠️  已取消")?;
    Ok(())
}
