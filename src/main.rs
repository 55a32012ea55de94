use std::sync::Arc;
use std::time::Duration;

use auth_gate::app::build_router;
use auth_gate::auth::jwt::TokenIssuer;
use auth_gate::auth::service::AuthService;
use auth_gate::auth::social::UnconfiguredIdentityProvider;
use auth_gate::config::Config;
use auth_gate::db::PgSessionStore;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Si RUST_LOG n'est pas défini, utiliser ces règles par défaut
        tracing_subscriber::EnvFilter::new("info,auth_gate=debug,hyper_util=warn,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// ----------------- Main -----------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging().await;
    tracing::info!("Starting auth-gate...");

    let config = Config::from_env()?;

    let store = PgSessionStore::connect(&config.database_url)?;
    let issuer = TokenIssuer::new(&config.jwt_secret, config.token_policy());
    // Branché explicitement ici; les déploiements avec OAuth remplacent le
    // provider par une implémentation effectuant l'échange de code.
    let identity = Arc::new(UnconfiguredIdentityProvider);

    let service = Arc::new(AuthService::new(Arc::new(store), issuer.clone(), identity));

    // Balayage périodique des refresh tokens expirés
    let sweeper = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = sweeper.purge_expired_tokens() {
                tracing::error!("expired token sweep failed: {e}");
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = build_router(service, issuer).layer(cors);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
