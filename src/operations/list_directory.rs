#![deny(warnings)]

// HTML index for directories that have no index.html

use crate::error::{FileServerError, Result};
use std::fs;
use std::path::Path;

/// Render an HTML listing of the entries in `path`.
///
/// `display` is the decoded request path shown in the title. Entries are
/// sorted case-insensitively; directories get a trailing `/` and symlinks
/// an `@`.
pub fn list_directory(path: &Path, display: &str) -> Result<String> {
    let entries = fs::read_dir(path)
        .map_err(|e| FileServerError::filesystem("list directory", path, e))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FileServerError::filesystem("list directory", path, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry
            .file_type()
            .map_err(|e| FileServerError::filesystem("stat", &entry.path(), e))?;

        let (shown, link) = if file_type.is_symlink() {
            let link = if entry.path().is_dir() {
                format!("{}/", urlencoding::encode(&name))
            } else {
                urlencoding::encode(&name).into_owned()
            };
            (format!("{name}@"), link)
        } else if file_type.is_dir() {
            (format!("{name}/"), format!("{}/", urlencoding::encode(&name)))
        } else {
            (name.clone(), urlencoding::encode(&name).into_owned())
        };
        items.push((name.to_lowercase(), shown, link));
    }
    items.sort();

    let title = html_escape(&format!("Directory listing for {display}"));
    let mut html = String::new();
    html.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{title}</h1>\n<hr>\n<ul>\n"));
    for (_, shown, link) in &items {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape(link),
            html_escape(shown)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
