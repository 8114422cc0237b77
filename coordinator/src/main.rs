use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coordinator::dispatch::gateway::HttpGateway;
use coordinator::ledger::LedgerSync;
use coordinator::{api, config, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coordinator=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    info!(port = config.port, "coordinator starting");

    let db = db::connect(&config.database_url).await?;

    let gateway = Arc::new(HttpGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_token.clone(),
        config.gateway_timeout,
    )?);

    let state = Arc::new(AppState {
        db,
        gateway,
        ledger: LedgerSync::new(&config.ledger_path),
    });

    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
