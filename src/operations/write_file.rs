#![deny(warnings)]

// Atomically replace a file's contents

use crate::error::{FileServerError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Suffix of the temporary sibling a write goes through
pub const TEMP_SUFFIX: &str = ".tmp";

/// Write `contents` to `path` so readers only ever see the old or the new file.
///
/// Parent directories are created as needed. The bytes go to a uniquely named
/// temporary sibling (`<name>.<random>.tmp`), are synced, and the temporary
/// file is then renamed onto `path`. If anything fails the temporary file is
/// removed when its handle drops and `path` keeps its previous content.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if path.is_dir() {
        return Err(FileServerError::filesystem(
            "write",
            path,
            std::io::Error::other("target is a directory"),
        ));
    }

    let parent = path.parent().ok_or_else(|| {
        FileServerError::filesystem(
            "write",
            path,
            std::io::Error::other("target has no parent directory"),
        )
    })?;
    let file_name = path.file_name().ok_or_else(|| {
        FileServerError::filesystem(
            "write",
            path,
            std::io::Error::other("target has no file name"),
        )
    })?;

    // Create parent directories if they don't exist
    fs::create_dir_all(parent)
        .map_err(|e| FileServerError::filesystem("create parent directories for", path, e))?;

    let prefix = format!("{}.", file_name.to_string_lossy());
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(TEMP_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }

    let mut temp = builder
        .tempfile_in(parent)
        .map_err(|e| FileServerError::filesystem("create temp file for", path, e))?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| FileServerError::filesystem("write temp file for", path, e))?;

    // PersistError hands the temp file back; dropping it removes it
    temp.persist(path)
        .map_err(|e| FileServerError::filesystem("rename temp file onto", path, e.error))?;

    Ok(())
}
