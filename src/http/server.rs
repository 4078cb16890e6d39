//! HTTP surface wiring: router, CORS, rate limiting, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use log::info;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::db::Database;
use crate::engines::{CommentEngine, LaunchpadEngine, ReactionEngine, WatchlistEngine};
use crate::http::rate_limit::{self, RateLimiter};
use crate::http::routes;
use crate::kv::KvClient;
use crate::scanner::{TokenRepository, TokenScanner};
use crate::sse::ChannelHub;

/// Everything the handlers need, wired once by the composition root.
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub db: Database,
    pub kv: Arc<KvClient>,
    pub hub: Arc<ChannelHub>,
    pub comments: Arc<CommentEngine>,
    pub reactions: Arc<ReactionEngine>,
    pub watchlist: Arc<WatchlistEngine>,
    pub launchpad: Arc<LaunchpadEngine>,
    pub repository: Arc<TokenRepository>,
    pub scanner: Arc<TokenScanner>,
    pub rate_limiter: Option<RateLimiter>,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    let api = Router::new()
        .route("/watchlist/add", post(routes::watchlist::add))
        .route("/watchlist/remove", delete(routes::watchlist::remove))
        .route("/watchlist/get", get(routes::watchlist::list))
        .route("/watchlist/check/{wallet}/{token}", get(routes::watchlist::check))
        .route("/watchlist/count/{wallet}", get(routes::watchlist::count))
        .route("/comments", post(routes::comments::create))
        .route("/comments/stream/{token_address}", get(routes::comments::stream))
        .route("/comments/{token_address}", get(routes::comments::latest))
        .route("/emoji/react", post(routes::emoji::react))
        .route("/emoji/stream/{token_address}", get(routes::emoji::stream))
        .route("/emoji/{token_address}", get(routes::emoji::counts))
        .route("/new-tokens/tokens", get(routes::new_tokens::list))
        .route("/new-tokens/tokens/stream", get(routes::new_tokens::stream))
        .route("/tokens", get(routes::tokens::all))
        .route("/tokens/zora", get(routes::tokens::zora))
        .route("/tokens/tba", get(routes::tokens::tba))
        .route("/tokens/metadata", get(routes::tokens::metadata))
        .route("/tokens/scan", post(routes::tokens::scan))
        .route("/health", get(routes::health::basic))
        .route("/health/detailed", get(routes::health::detailed));

    let cors = cors_layer(&ctx.settings.http.cors_origins);
    let limited = ctx.rate_limiter.is_some();

    let mut router = Router::new()
        .nest("/api/v1", api)
        .with_state(ctx.clone())
        .layer(ServiceBuilder::new().layer(cors));

    if limited {
        router = router.layer(middleware::from_fn_with_state(
            ctx,
            rate_limit::limit_middleware,
        ));
    }

    router
}

/// Serve until the cancellation token fires, then drain gracefully.
pub async fn serve(ctx: Arc<AppContext>, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.settings.http.host, ctx.settings.http.port)
        .parse()
        .context("Invalid HTTP listen address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(
        listener,
        router(ctx).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .context("HTTP server failed")
}
