// src/routes/mod.rs
pub mod chat;

use std::net::SocketAddr;

use crate::{
    config::AllowedOrigins,
    error::AppError,
    services::rate_limiter::Decision,
    state::SharedState,
};
use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chat::{chat_handler, start_handler};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const WELCOME: &str = "Welcome to the server!";


pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/", get(|| async { WELCOME }))
        .route("/health", get(|| async { "OK" }))
        .route("/start", get(start_handler))
        .route("/chat", post(chat_handler))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    match origins {
        AllowedOrigins::Any => CorsLayer::very_permissive(),
        AllowedOrigins::List(list) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(list.iter().cloned()))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE]),
    }
}

async fn rate_limit(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&req);
    match state.rate_limiter.check(&key).await {
        Decision::Allowed { remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(
                "ratelimit-limit",
                HeaderValue::from(state.rate_limiter.max_requests()),
            );
            headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
            Ok(response)
        }
        Decision::Limited { retry_after } => {
            warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
            Err(AppError::RateLimited { retry_after })
        }
    }
}

/// Peer IP when the server was started with connect info, else the first
/// `x-forwarded-for` hop.
fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
