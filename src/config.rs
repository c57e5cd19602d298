#![deny(warnings)]

// Server configuration

use crate::error::{FileServerError, Result};
use crate::resolve::normalize_lexically;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
/// Name of the writable directory under the project root
pub const DEFAULT_DATA_DIR: &str = "data";
/// Subdirectory of the writable root the editor keeps templates in
pub const TEMPLATES_STORE_DIR: &str = "templates_store";
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024; // 100 MB

/// File server configuration, fixed at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory served for GET requests; expected to be absolute
    pub project_root: PathBuf,
    /// Name of the writable root, relative to the project root
    pub data_dir: String,
    /// Largest accepted PUT/POST body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            project_root: PathBuf::from("."),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Config rooted at `project_root` with every other option defaulted
    pub fn with_root(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// `host:port` string handed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Normalized absolute path of the writable root
    pub fn writable_root(&self) -> PathBuf {
        normalize_lexically(&self.project_root.join(&self.data_dir))
    }

    /// Create the writable root and its templates store if absent.
    ///
    /// Returns the writable root path.
    pub fn ensure_writable_root(&self) -> Result<PathBuf> {
        let root = self.writable_root();
        let templates = root.join(TEMPLATES_STORE_DIR);
        fs::create_dir_all(&templates)
            .map_err(|e| FileServerError::filesystem("create directory", &templates, e))?;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.data_dir, "data");
    }

    #[test]
    fn test_writable_root_is_normalized() {
        let mut config = ServerConfig::with_root("/srv/project");
        config.data_dir = "./store/../data".to_string();
        assert_eq!(config.writable_root(), PathBuf::from("/srv/project/data"));
    }

    #[test]
    fn test_ensure_writable_root_creates_templates_store() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::with_root(dir.path());

        let root = config.ensure_writable_root().unwrap();

        assert_eq!(root, dir.path().join("data"));
        assert!(root.join(TEMPLATES_STORE_DIR).is_dir());

        // Second call is a no-op on an existing tree
        config.ensure_writable_root().unwrap();
    }
}
