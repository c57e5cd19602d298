#![deny(warnings)]

// HTTP file server: router, request dispatch and response policy

use crate::config::ServerConfig;
use crate::error::{FileServerError, Result};
use crate::operations::delete_file::delete_file;
use crate::operations::list_directory::list_directory;
use crate::operations::write_file::write_file;
use crate::resolve::{normalize_lexically, request_relative_path, PathResolver, ResolvedPath};
use crate::routes::Route;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router};
use http_body_util::LengthLimitError;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Methods advertised to browsers in `Access-Control-Allow-Methods`
pub const ALLOWED_METHODS: &str = "GET, PUT, POST, DELETE, OPTIONS";
/// `Cache-Control` value set on every response
pub const CACHE_POLICY: &str = "no-cache, no-store, must-revalidate";
pub const HEALTH_MESSAGE: &str = "Server is running";

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub message: &'static str,
    #[serde(rename = "dataDir")]
    pub data_dir: String,
}

/// Body of a successful PUT/POST
#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub ok: bool,
    pub path: String,
    pub size: usize,
}

/// Body of a successful DELETE
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: String,
}

/// Shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<ServerConfig>,
    resolver: Arc<PathResolver>,
    static_files: ServeDir,
}

/// File server built from a [`ServerConfig`]
pub struct FileServer {
    config: ServerConfig,
}

impl FileServer {
    /// Create a new file server
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Create the writable root and its templates store
    pub fn prepare(&self) -> Result<PathBuf> {
        self.config.ensure_writable_root()
    }

    /// Build the router.
    ///
    /// Every request lands in one dispatcher that picks a handler from
    /// [`Route::classify`]. CORS and cache headers are set on all responses,
    /// errors included.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: Arc::new(self.config.clone()),
            resolver: Arc::new(PathResolver::new(
                &self.config.project_root,
                &self.config.data_dir,
            )),
            static_files: ServeDir::new(&self.config.project_root),
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static(CACHE_POLICY),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Prepare the writable root and serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.prepare()?;
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let route = Route::classify(request.method(), request.uri().path());
    debug!(?route, method = %request.method(), uri = %request.uri(), "Dispatching request");

    let result = match route {
        Route::Health => Ok(health(&state)),
        Route::Preflight => Ok(StatusCode::NO_CONTENT.into_response()),
        Route::ReadFile => read_file(&state, request).await,
        Route::WriteFile => store_file(&state, request).await,
        Route::DeleteFile => remove_file(&state, request).await,
        Route::Unsupported => Err(FileServerError::UnsupportedMethod(
            request.method().to_string(),
        )),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// Liveness only: never touches the filesystem
fn health(state: &AppState) -> Response {
    Json(HealthResponse {
        ok: true,
        message: HEALTH_MESSAGE,
        data_dir: state.config.data_dir.clone(),
    })
    .into_response()
}

async fn read_file(state: &AppState, request: Request) -> Result<Response> {
    let relative = request_relative_path(request.uri().path());
    let response = state
        .static_files
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    if response.status() == StatusCode::NOT_FOUND {
        return match listing(state, &relative).await? {
            Some(html) => Ok(Html(html).into_response()),
            None => Err(FileServerError::NotFound(relative)),
        };
    }
    Ok(response.map(Body::new))
}

/// HTML index for an existing directory under the project root that has no index.html
async fn listing(state: &AppState, relative: &str) -> Result<Option<String>> {
    if !relative.is_empty() && !relative.ends_with('/') {
        return Ok(None);
    }
    let root = state.resolver.project_root();
    let dir = normalize_lexically(&root.join(relative));
    if !dir.starts_with(root) {
        return Ok(None);
    }

    let display = format!("/{relative}");
    tokio::task::spawn_blocking(move || {
        if dir.is_dir() {
            list_directory(&dir, &display).map(Some)
        } else {
            Ok(None)
        }
    })
    .await?
}

async fn store_file(state: &AppState, request: Request) -> Result<Response> {
    let target = resolve_for_write(state, &request)?;
    let limit = state.config.max_body_bytes;

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(FileServerError::PayloadTooLarge(limit));
    }

    let body = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                FileServerError::PayloadTooLarge(limit)
            } else {
                FileServerError::RequestBody(inner.to_string())
            }
        })?;

    let size = body.len();
    let ResolvedPath {
        absolute, relative, ..
    } = target;
    tokio::task::spawn_blocking(move || write_file(&absolute, &body)).await??;

    info!("WRITE {} ({} bytes)", relative, size);
    Ok(Json(WriteResponse {
        ok: true,
        path: relative,
        size,
    })
    .into_response())
}

async fn remove_file(state: &AppState, request: Request) -> Result<Response> {
    let target = resolve_for_write(state, &request)?;
    let relative = target.relative.clone();
    tokio::task::spawn_blocking(move || delete_file(&target.absolute, &target.relative))
        .await??;

    info!("DELETE {}", relative);
    Ok(Json(DeleteResponse {
        ok: true,
        deleted: relative,
    })
    .into_response())
}

fn resolve_for_write(state: &AppState, request: &Request) -> Result<ResolvedPath> {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| request.uri().path());
    state.resolver.resolve_for_write(target)
}
