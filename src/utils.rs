// src/utils.rs
use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// host[.host...].tld with an optional port and path
static URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?::\d{1,5})?(?:[/?#]\S*)?$")
        .expect("url shape pattern compiles")
});

/// Job boards are only accepted on a TLD we recognise.
static JOB_SITE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:www\.)?(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:com|org|net|io|co|dev|jobs|ai|app|us|uk|ca|de|fr|in|au|eu|nl|ch|se|es|it)(?:\.[a-z]{2})?(?:/\S*)?$",
    )
    .expect("job site pattern compiles")
});

/// Prefix `https://` when the scheme is missing.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Check a scrape target against the host/path shape
pub fn is_valid_url_shape(raw: &str) -> bool {
    URL_SHAPE.is_match(raw.trim())
}

pub fn is_valid_job_site(raw: &str) -> bool {
    JOB_SITE_SHAPE.is_match(raw.trim())
}

/// Resolve a possibly relative href against the page it was found on.
pub fn absolute_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    Url::parse(base)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
}

/// Collapse whitespace runs and newlines into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve relative paths from the current working directory
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(current_dir.join(path))
    }
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
