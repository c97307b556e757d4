// src/resume/document.rs
//! Plain-text access to resume documents.

use crate::utils::{get_file_extension, resolve_path};
use anyhow::{Context, Result};
use std::path::Path;

/// Document-to-text collaborator. Implementations must be usable from any session.
pub trait DocumentText: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Reads `.pdf` files through `pdf-extract` and anything else as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDocumentText;

impl DocumentText for FileDocumentText {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let path = resolve_path(path)?;
        if !path.exists() {
            anyhow::bail!("Resume file not found: {}", path.display());
        }

        match get_file_extension(&path).as_deref() {
            Some("pdf") => pdf_extract::extract_text(&path).map_err(|e| {
                anyhow::anyhow!("Failed to extract text from PDF {}: {}", path.display(), e)
            }),
            _ => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read resume {}", path.display())),
        }
    }
}
