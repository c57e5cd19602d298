#![deny(warnings)]

// URL path to filesystem path mapping and the writable-root boundary

use crate::error::{FileServerError, Result};
use std::path::{Component, Path, PathBuf};

/// A request path mapped onto the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized absolute location under the project root
    pub absolute: PathBuf,
    /// Decoded request path without its leading separator, as the client sent it
    pub relative: String,
    /// Whether `absolute` lies inside the writable root
    pub writable: bool,
}

/// Maps raw request targets onto paths under a project root.
///
/// Resolution is purely lexical: `.` and `..` segments are collapsed without
/// consulting the filesystem, so symlinks inside the project tree are not
/// followed when deciding whether a path is writable.
#[derive(Debug, Clone)]
pub struct PathResolver {
    project_root: PathBuf,
    writable_root: PathBuf,
    data_dir: String,
}

impl PathResolver {
    /// Create a resolver for `project_root` whose writable subtree is `data_dir`
    ///
    /// A relative root is anchored at the current working directory first.
    pub fn new(project_root: &Path, data_dir: &str) -> Self {
        let anchored =
            std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
        let project_root = normalize_lexically(&anchored);
        let writable_root = normalize_lexically(&project_root.join(data_dir));
        Self {
            project_root,
            writable_root,
            data_dir: data_dir.to_string(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn writable_root(&self) -> &Path {
        &self.writable_root
    }

    /// Map a raw request target (path plus optional query) to a filesystem path
    pub fn resolve(&self, target: &str) -> ResolvedPath {
        let relative = request_relative_path(target);
        let absolute = normalize_lexically(&self.project_root.join(&relative));
        let writable = self.is_writable(&absolute);
        ResolvedPath {
            absolute,
            relative,
            writable,
        }
    }

    /// Resolve a target for PUT/POST/DELETE, rejecting anything outside the writable root
    pub fn resolve_for_write(&self, target: &str) -> Result<ResolvedPath> {
        let resolved = self.resolve(target);
        if !resolved.writable {
            return Err(FileServerError::OutsideWritableRoot {
                data_dir: self.data_dir.clone(),
                requested: resolved.relative,
            });
        }
        Ok(resolved)
    }

    /// True when `path` equals the writable root or descends from it.
    ///
    /// `Path::starts_with` compares whole components, so a sibling such as
    /// `data2/` never matches a writable root named `data`.
    fn is_writable(&self, path: &Path) -> bool {
        path.starts_with(&self.writable_root)
    }
}

/// Strip query and fragment, percent-decode, and drop leading separators.
///
/// Invalid UTF-8 produced by decoding is replaced rather than rejected.
pub fn request_relative_path(target: &str) -> String {
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let decoded = urlencoding::decode_binary(path.as_bytes());
    String::from_utf8_lossy(&decoded)
        .trim_start_matches('/')
        .to_string()
}

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` at the root of an absolute path stays at the root. Leading `..`
/// components of a relative path are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::Prefix(_) | Component::RootDir) => {}
                _ => normalized.push(".."),
            },
            Component::Normal(name) => normalized.push(name),
        }
    }
    normalized
}
