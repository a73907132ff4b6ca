//! Backend of the school planning forms.
//!
//! # General Infrastructure
//! - The web form posts to this server, this server talks to Google Sheets
//! - All persistent state lives in the spreadsheets, nothing is kept between requests
//! - The OAuth access token is minted outside and dropped in `/run/secrets`
//!
//!
//!
//! # Endpoints
//!
//! | Route                 | GET                         | POST                                 |
//! |-----------------------|-----------------------------|--------------------------------------|
//! | `/plan-aula`          | rows of `<ws>!A:J`          | upsert one 10-cell classroom plan     |
//! | `/plan-mejoramiento`  | improvement plan records    | upsert one row per listed student     |
//! | `/cards`              | `{card, teachers}` pairs    | append pairs                          |
//!
//! `OPTIONS` always answers 200 with no body, other methods get a 405.
//!
//!
//!
//! # Notes
//!
//! ## Upserts are not atomic
//! Each write endpoint reads the whole range, picks the matching row and then writes.
//! Two submissions for the same key landing at the same time can both append, or one
//! update can overwrite the other. Acceptable for a handful of teachers filling forms,
//! a real database would be the fix.
//!
//!
//!
//! # Setup
//!
//! Run locally.
//! ```sh
//! RUST_LOG=info SHEETS_TOKEN_FILE=./token cargo run -p aula
//! ```
//!
//! Smoke test a running server.
//! ```sh
//! cargo run -p tester -- http://localhost:1111
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{MethodRouter, get},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod records;
pub mod routes;
pub mod state;

use config::Config;
use routes::{
    get_cards, get_improvement_plans, get_plan_aula, method_not_allowed, preflight, save_cards,
    save_improvement_plans, save_plan_aula,
};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::remote(config)?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app(state: Arc<State>) -> Router {
    let cors = cors(&state.config.allowed_origins);

    Router::new()
        .route(
            "/plan-aula",
            endpoint(get(get_plan_aula).post(save_plan_aula)),
        )
        .route(
            "/plan-mejoramiento",
            endpoint(get(get_improvement_plans).post(save_improvement_plans)),
        )
        .route("/cards", endpoint(get(get_cards).post(save_cards)))
        .layer(cors)
        .with_state(state)
}

fn endpoint(methods: MethodRouter<Arc<State>>) -> MethodRouter<Arc<State>> {
    methods.options(preflight).fallback(method_not_allowed)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| warn!("Ignoring allowed origin {origin}: {e}"))
                    .ok()
            })
            .collect();

        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
