use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tenant_gate::auth::provider;
use tenant_gate::config::CorsConfig;
use tenant_gate::{get_authenticated_user, logging, routes, store, AppState, AuthClient, Config, RequestContext, ServerClientFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let command = std::env::args().nth(1);
    if matches!(command.as_deref(), Some("--version") | Some("-V")) {
        println!("tenant-gate {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let config = Config::load()?;

    logging::init(&config.logging.level);

    match command.as_deref() {
        None | Some("serve") => serve(config).await,
        Some("whoami") => whoami(config).await,
        Some(other) => Err(format!("unknown command: {} (expected serve, whoami or --version)", other).into()),
    }
}

/// Resolve `GATE_ACCESS_TOKEN` with a client owned by this process.
async fn whoami(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let context = std::env::var("GATE_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .map(RequestContext::with_access_token)
        .unwrap_or_default();

    let client = match provider::connect(&config.provider).await {
        Ok(provider) => AuthClient::new(provider, context),
        Err(e) => {
            tracing::warn!("Could not connect identity provider: {}", e);
            eprintln!("Unauthorized");
            std::process::exit(1);
        }
    };

    match get_authenticated_user(&client).await {
        Ok(principal) => {
            println!("{}", serde_json::to_string_pretty(&principal)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(cause = ?e.cause(), "whoami failed");
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting tenant gate");

    let stores = store::open(&config)?;
    tracing::info!(backend = ?config.database.backend, "Opened user store");

    let auth_clients = ServerClientFactory::connect_lazily(config.provider.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cors = cors_layer(&config.cors);

    let state = Arc::new(AppState::new(config, auth_clients, stores)?);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .origins
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
