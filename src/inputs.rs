// src/inputs.rs
//! Candidate-supplied run inputs and their validation.

use crate::utils::{is_valid_job_site, is_valid_url_shape, normalize_url, resolve_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOCATION: &str = "Remote";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{0} is required")]
    MissingName(&'static str),
    #[error("invalid scrape URL '{0}'")]
    InvalidScrapeUrl(String),
    #[error("invalid job site URL '{0}'")]
    InvalidJobSite(String),
    #[error("at least one desired job title is required")]
    NoDesiredTitles,
}

/// Login details for one run. Never serialized; `Debug` hides the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub desired_titles: Vec<String>,
    pub location: String,
}

impl SearchCriteria {
    pub fn new(desired_titles: Vec<String>, location: Option<String>) -> Result<Self, InputError> {
        let desired_titles: Vec<String> = desired_titles
            .into_iter()
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .collect();
        if desired_titles.is_empty() {
            return Err(InputError::NoDesiredTitles);
        }
        let location = location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        Ok(Self { desired_titles, location })
    }

    /// Titles joined into one keyword query.
    pub fn keywords(&self) -> String {
        self.desired_titles.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Everything the candidate provides before a run, as read from a YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateInputs {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub social_links: Vec<String>,
    #[serde(default)]
    pub scrape_urls: Vec<String>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub desired_titles: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_site_url: String,
    #[serde(default)]
    pub resume_path: Option<PathBuf>,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl CandidateInputs {
    pub fn load(path: &Path) -> Result<Self> {
        let path = resolve_path(path)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read candidate file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse candidate file {}", path.display()))
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Check required fields and normalise every URL before anything is navigated.
    pub fn validate(mut self) -> Result<Self, InputError> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        if self.first_name.is_empty() {
            return Err(InputError::MissingName("first name"));
        }
        if self.last_name.is_empty() {
            return Err(InputError::MissingName("last name"));
        }

        self.scrape_urls = self
            .scrape_urls
            .iter()
            .map(|url| {
                if is_valid_url_shape(url) {
                    Ok(normalize_url(url))
                } else {
                    Err(InputError::InvalidScrapeUrl(url.trim().to_string()))
                }
            })
            .collect::<Result<_, _>>()?;

        if !is_valid_job_site(&self.job_site_url) {
            return Err(InputError::InvalidJobSite(self.job_site_url.trim().to_string()));
        }
        self.job_site_url = normalize_url(&self.job_site_url);

        let criteria = SearchCriteria::new(std::mem::take(&mut self.desired_titles), self.location.take())?;
        self.desired_titles = criteria.desired_titles;
        self.location = Some(criteria.location);
        self.social_links.retain(|link| !link.trim().is_empty());
        self.work_experience.retain(|entry| !entry.title.trim().is_empty());

        Ok(self)
    }

    pub fn search_criteria(&self) -> Result<SearchCriteria, InputError> {
        SearchCriteria::new(self.desired_titles.clone(), self.location.clone())
    }
}
