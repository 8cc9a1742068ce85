use axum::{middleware, routing, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::JwtSecret;
use crate::chat::presence;
use crate::config::RateLimitConfig;
use crate::dm::{conversations, messages};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
///
/// The REST API is rate limited per client IP. `PeerIpKeyExtractor` reads
/// `ConnectInfo<SocketAddr>`, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: AppState, rate_limit: &RateLimitConfig) -> Router {
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(rate_limit.replenish_secs.max(1))
            .burst_size(rate_limit.burst_size.max(1))
            .finish()
            .expect("non-zero rate limit values always build a governor config"),
    );

    // Spawn background task to clean up rate limiter state
    let limiter = governor_config.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            limiter.retain_recent();
        }
    });

    // Authenticated REST routes (Claims extractor validates the bearer token)
    let api_routes = Router::new()
        .route(
            "/api/chats",
            routing::get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/chats/{id}",
            routing::get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route(
            "/api/messages/{id}",
            routing::get(messages::list_messages)
                .post(messages::send_message)
                .delete(messages::delete_message),
        )
        .route("/api/presence", routing::get(presence::get_presence))
        .route("/api/presence/{user_id}", routing::get(presence::get_user_presence))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // WebSocket endpoint (auth via query param or bearer header, checked before upgrade)
    let ws_routes = Router::new().route("/ws", routing::get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", routing::get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
