use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bedtime_story_service::{
    AppConfig, ModelArtifacts, StoryGenerator, TextGenerator, build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        model = %config.model_path.display(),
        tokenizer = %config.tokenizer_path.display(),
        "loading model artifacts"
    );

    let text = match ModelArtifacts::load(config.as_ref()) {
        Ok(artifacts) => TextGenerator::from_artifacts(artifacts),
        Err(err) => {
            tracing::error!(%err, "model unavailable, story generation disabled");
            TextGenerator::new()
        }
    };
    let generator = Arc::new(StoryGenerator::from_config(text, config.as_ref()));
    let router = build_router(config.clone(), generator);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
