// src/resume/mod.rs
//! Resume text to [`ResumeProfile`](crate::types::ResumeProfile).

pub mod document;
pub mod extractor;

pub use document::{DocumentText, FileDocumentText};
pub use extractor::{extract_profile, ResumeExtractor};
