use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install tracing only when `RUST_LOG` is set, so the comparison output stays clean.
/// Logs go to stderr; `RAG_LOG_FORMAT=json` switches to JSON lines.
pub fn init() {
    if std::env::var("RUST_LOG").is_err() {
        return;
    }
    let json = std::env::var("RAG_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
