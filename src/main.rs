//! chatgate server binary

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatgate::config::Config;
use chatgate::conversation::SessionKey;
use chatgate::core::{ChatEngine, MemoryStore, ModelGateway};
use chatgate::providers::{OpenAIConfig, OpenAIProvider};
use chatgate::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let models = config.load_models().context("Failed to load model options")?;
    let default_session = SessionKey::new(config.default_session_key.clone())
        .context("CHATGATE_SESSION_KEY must not be empty")?;

    let db_path = config.database_path();
    let store = Arc::new(
        MemoryStore::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?,
    );
    tracing::info!("Chat history stored in {}", db_path.display());

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, requests go out unauthenticated");
    }
    let provider = OpenAIProvider::new(OpenAIConfig {
        base_url: config.openai_base_url.clone(),
        api_key: config.openai_api_key.clone(),
        organization: config.openai_organization.clone(),
        timeout_secs: models.http.request_timeout_secs,
    })?;

    tracing::info!(
        "Chat model {} with a {}-message memory window",
        models.chat.model,
        models.memory.max_messages
    );

    let gateway = Arc::new(ModelGateway::new(Arc::new(provider), models));
    let chat_engine = Arc::new(ChatEngine::new(gateway, store.clone(), store));

    let state = AppState::new(chat_engine, default_session);

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("chatgate listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
