mod config;
mod routes;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use genstream_harness::vendors::openai::{OpenAiClientConfig, OpenAiProvider};
use genstream_harness::{Harness, init_observability};
use tracing::info;

use crate::config::ServerConfig;
use crate::routes::{AppState, router};

type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ServerResult<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::parse();
    init_observability(&config.log_level);

    let mut openai = OpenAiClientConfig::from_env()?;
    if let Some(base_url) = config.openai_base_url.as_deref() {
        openai = openai.base_url(base_url);
    }
    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::new(openai)?))
        .build()?;

    let state = Arc::new(AppState {
        harness,
        auth_token: config.auth_token().map(ToOwned::to_owned),
        default_provider: config.default_provider.clone(),
        default_model: config.default_model.clone(),
        run_timeout: config.run_timeout(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(
        listen = %config.listen,
        auth = state.auth_token.is_some(),
        default_model = %config.default_model,
        "genstream server listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
