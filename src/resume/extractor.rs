// src/resume/extractor.rs
//! Best-effort pattern extraction of candidate facts.
//!
//! Every field is searched independently over the whole text, so a resume
//! with no phone number still yields its email and job history. Nothing here
//! can fail: an unmatched pattern leaves the field empty.

use crate::types::{DateRange, JobHistoryEntry, ResumeProfile};
use regex::Regex;
use std::sync::LazyLock;

/// Names are only looked for near the top of the document.
const NAME_LINES: usize = 5;

static DEFAULT_EXTRACTOR: LazyLock<ResumeExtractor> = LazyLock::new(ResumeExtractor::new);

/// Extract with the shared default patterns.
pub fn extract_profile(text: &str) -> ResumeProfile {
    DEFAULT_EXTRACTOR.extract(text)
}

#[derive(Debug, Clone)]
pub struct ResumeExtractor {
    email: Regex,
    phone: Regex,
    name: Regex,
    job_history: Regex,
}

impl Default for ResumeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumeExtractor {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("email pattern compiles"),
            phone: Regex::new(r"(?:\(\d{3}\)|\b\d{3})[-. \t]?\d{3}[-. \t]?\d{4}\b")
                .expect("phone pattern compiles"),
            name: Regex::new(r"\b(\p{Lu}\p{Ll}+)[ \t]+(\p{Lu}\p{Ll}+)\b").expect("name pattern compiles"),
            job_history: Regex::new(
                r"(?m)([^,\n]+?),[ \t]*([^,\n]+?),[ \t]*(\d{4})[ \t]*[-–][ \t]*(\d{4}|Present)\b",
            )
            .expect("job history pattern compiles"),
        }
    }

    pub fn extract(&self, text: &str) -> ResumeProfile {
        let (first_name, last_name) = self.name(text).unzip();
        let profile = ResumeProfile {
            first_name,
            last_name,
            email: self.email.find(text).map(|m| m.as_str().to_string()),
            phone: self.phone.find(text).map(|m| m.as_str().trim().to_string()),
            job_history: self.job_history(text),
        };

        app_log!(
            debug,
            "Extracted profile: name={}, email={}, phone={}, {} job(s)",
            profile.full_name().is_some(),
            profile.email.is_some(),
            profile.phone.is_some(),
            profile.job_history.len()
        );
        profile
    }

    fn name(&self, text: &str) -> Option<(String, String)> {
        text.lines()
            .take(NAME_LINES)
            .find_map(|line| self.name.captures(line))
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
    }

    fn job_history(&self, text: &str) -> Vec<JobHistoryEntry> {
        self.job_history
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps[3].parse::<u16>().ok()?;
                let end = match &caps[4] {
                    "Present" => None,
                    year => Some(year.parse::<u16>().ok()?),
                };
                Some(JobHistoryEntry {
                    company: caps[1].trim().to_string(),
                    role: caps[2].trim().to_string(),
                    date_range: DateRange { start, end },
                })
            })
            .collect()
    }
}
