#![deny(warnings)]

// Remove a single stored file

use crate::error::{FileServerError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Remove the regular file at `path`.
///
/// A missing file is reported as [`FileServerError::NotFound`] carrying
/// `relative`; directories and every other failure surface as
/// [`FileServerError::Filesystem`].
pub fn delete_file(path: &Path, relative: &str) -> Result<()> {
    fs::remove_file(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FileServerError::NotFound(relative.to_string()),
        _ => FileServerError::filesystem("remove", path, e),
    })
}
