#![deny(warnings)]

// Dispatch table from (method, path) to request handlers

use axum::http::Method;

/// Liveness probe path
pub const HEALTH_PATH: &str = "/health";

/// Handler selected for an incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /health`
    Health,
    /// `OPTIONS <any>` CORS preflight
    Preflight,
    /// `GET`/`HEAD` of any other path, served from the project root
    ReadFile,
    /// `PUT`/`POST`, confined to the writable root
    WriteFile,
    /// `DELETE`, confined to the writable root
    DeleteFile,
    /// Anything else
    Unsupported,
}

impl Route {
    /// Classify a request by method and raw (undecoded) URL path
    pub fn classify(method: &Method, path: &str) -> Self {
        match (method, path) {
            (&Method::OPTIONS, _) => Route::Preflight,
            (&Method::GET, HEALTH_PATH) => Route::Health,
            (&Method::GET, _) | (&Method::HEAD, _) => Route::ReadFile,
            (&Method::PUT, _) | (&Method::POST, _) => Route::WriteFile,
            (&Method::DELETE, _) => Route::DeleteFile,
            _ => Route::Unsupported,
        }
    }

    /// Whether the route changes files on disk
    pub fn is_mutating(self) -> bool {
        matches!(self, Route::WriteFile | Route::DeleteFile)
    }
}
