use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug as log_debug, info as log_info};

use crate::api_handlers::ApiHandlers;
use crate::config::ServerConfig;
use crate::error::RequestError;
use crate::models::PageResult;
use crate::upstream_trait::UpstreamClient;
use crate::validation::{FormatRule, HASHTAG_RULE, USERNAME_RULE};

/// Extra time the outer layer allows beyond the pipeline deadline, so a slow
/// upstream is reported as an error envelope instead of a bare 408.
const TIMEOUT_LAYER_MARGIN: Duration = Duration::from_secs(5);

pub struct AppState {
    pub api_handlers: ApiHandlers,
    pub server_config: ServerConfig,
}

pub struct WebServer {
    pub app_state: Arc<AppState>,
}

type QueryPairs = Vec<(String, String)>;

impl WebServer {
    pub fn new(upstream: Arc<dyn UpstreamClient>, server_config: ServerConfig) -> Self {
        let api_handlers = ApiHandlers::new(
            upstream,
            Duration::from_secs(server_config.request_timeout),
        );
        let app_state = Arc::new(AppState {
            api_handlers,
            server_config,
        });

        Self { app_state }
    }

    pub fn create_router(&self) -> Router {
        let timeout_duration = Duration::from_secs(self.app_state.server_config.request_timeout)
            + TIMEOUT_LAYER_MARGIN;

        Router::new()
            .route("/", get(handle_root))
            .route("/health", get(handle_health))
            .route("/hashtags/:hashtag", get(handle_search_hashtag))
            .route("/hashtags/:hashtag/", get(handle_search_hashtag))
            .route("/users/:username", get(handle_search_user))
            .route("/users/:username/", get(handle_search_user))
            .layer(TimeoutLayer::new(timeout_duration))
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.app_state.clone())
    }

    pub async fn serve(&self, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
        let router = self.create_router();
        let listener = TcpListener::bind(bind_address).await?;

        log_info!(
            "Web server starting on {} ({} worker threads)",
            bind_address,
            self.app_state.server_config.worker_threads
        );
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// First `pages_limit` value; later repeats are ignored.
fn first_pages_limit(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == "pages_limit")
        .map(|(_, value)| value.as_str())
}

/// Path values that cannot be decoded are reported as format errors.
fn path_value(
    path: Result<Path<String>, PathRejection>,
    rule: &FormatRule,
) -> Result<String, RequestError> {
    path.map(|Path(value)| value).map_err(|rejection| {
        log_debug!("Rejected {} path value: {}", rule.field(), rejection);
        RequestError::Format {
            field: rule.field(),
        }
    })
}

// API Handler Functions

async fn handle_root() -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>{name}</title></head>\n<body>\n\
         <h1>{name}</h1>\n\
         <p>Search posts by hashtag: <code>/hashtags/&lt;hashtag&gt;/?pages_limit=N</code></p>\n\
         <p>Recent posts of a user: <code>/users/&lt;username&gt;/?pages_limit=N</code></p>\n\
         </body>\n</html>\n",
        name = env!("CARGO_PKG_NAME")
    ))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_search_hashtag(
    State(app_state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<QueryPairs>,
) -> Result<Json<PageResult>, RequestError> {
    let hashtag = path_value(path, &HASHTAG_RULE)?;
    app_state
        .api_handlers
        .search_hashtag(&hashtag, first_pages_limit(&params))
        .await
        .map(|result| {
            log_debug!("Returning {} page(s) for #{}", result.len(), hashtag);
            Json(result)
        })
}

async fn handle_search_user(
    State(app_state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<QueryPairs>,
) -> Result<Json<PageResult>, RequestError> {
    let username = path_value(path, &USERNAME_RULE)?;
    app_state
        .api_handlers
        .search_user(&username, first_pages_limit(&params))
        .await
        .map(|result| {
            log_debug!("Returning {} page(s) for {}", result.len(), username);
            Json(result)
        })
}
