//! cmd/cookbook/src/main.rs
//!
//! Wires settings, logging, the store, the token verifier and the HTTP
//! router, then serves until Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::JwtVerifier;
use configs::{LogSettings, Settings};
use secrecy::SecretString;
use services::{Repos, ServiceSettings, Services};
use storage_adapters::InMemoryStore;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(feature = "db-postgres")]
async fn build_repos(settings: &Settings) -> anyhow::Result<Repos> {
    use std::time::Duration;

    use storage_adapters::PgStore;

    let Some(url) = settings.database_url() else {
        warn!("no database URL configured; using the in-memory store");
        return Ok(Repos::from_store(Arc::new(InMemoryStore::new())));
    };
    let store = PgStore::connect(url, settings.database.max_connections, Duration::from_secs(5))
        .await
        .context("connecting to Postgres")?;
    store.migrate().await.context("running migrations")?;
    info!(max_connections = settings.database.max_connections, "connected to Postgres");
    Ok(Repos::from_store(Arc::new(store)))
}

#[cfg(not(feature = "db-postgres"))]
async fn build_repos(_settings: &Settings) -> anyhow::Result<Repos> {
    warn!("built without db-postgres; using the in-memory store");
    Ok(Repos::from_store(Arc::new(InMemoryStore::new())))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_logging(&settings.log);

    let repos = build_repos(&settings).await?;
    let services = Services::new(
        repos,
        ServiceSettings {
            fetch_timeout: settings.resolver.fetch_timeout(),
            display_cache_ttl: settings.resolver.display_cache_ttl(),
        },
    );

    // validate() guarantees the secret is present with auth-jwt enabled
    let secret: &SecretString = settings
        .auth
        .jwt_secret
        .as_ref()
        .context("auth.jwt_secret is required")?;
    let verifier = Arc::new(JwtVerifier::new(secret, &settings.auth.issuer));

    let app = router(AppState::new(services, verifier), &settings.server.cors_origins);

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "cookbook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    info!("server stopped");
    Ok(())
}
