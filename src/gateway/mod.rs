pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use anyhow::bail;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use crate::user_auth::jwt_auth_middleware;
use state::AppState;

/// Build the complete HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // User Routes (public)
    // ==========================================================================
    let user_routes = Router::new()
        .route("/api/v1/users", post(crate::user_auth::handlers::create_user))
        .route(
            "/api/v1/users/login",
            post(crate::user_auth::handlers::login_user),
        );

    // ==========================================================================
    // Ledger Routes - Protected by JWT
    // ==========================================================================
    let ledger_routes = Router::new()
        .route(
            "/api/v1/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::get_account).delete(handlers::delete_account),
        )
        .route("/api/v1/transfers", post(handlers::create_transfer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .merge(user_routes)
        .merge(ledger_routes)
        .with_state(state)
        // stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// CORS policy for browser clients; only the listed origins may send credentials
pub fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::with_capacity(allowed_origins.len());
    for origin in allowed_origins {
        if origin == "*" {
            bail!("wildcard origin cannot be combined with credentials");
        }
        let value = HeaderValue::from_str(origin)
            .with_context(|| format!("Invalid CORS origin: {}", origin))?;
        origins.push(value);
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// Router wrapped in the global request-trace and CORS layers
pub fn app(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<Router> {
    Ok(router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?))
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = app(config, state)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
