// src/scrape.rs
//! Title and outbound links for each candidate-supplied scrape URL.

use crate::utils::{absolute_link, clean_text};
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

const TITLE_SELECTORS: [&str; 3] = ["title", "meta[property='og:title']", "h1"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScrapeResult {
    Page {
        url: String,
        title: Option<String>,
        links: Vec<String>,
    },
    Error {
        url: String,
        error: String,
    },
}

impl ScrapeResult {
    pub fn url(&self) -> &str {
        match self {
            ScrapeResult::Page { url, .. } | ScrapeResult::Error { url, .. } => url,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScrapeResult::Error { .. })
    }
}

pub struct PageScraper {
    client: Client,
}

impl PageScraper {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Scrape each URL in turn; one failing page never stops the rest.
    pub async fn scrape_all(&self, urls: &[String]) -> Vec<ScrapeResult> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(self.scrape(url).await);
        }
        results
    }

    pub async fn scrape(&self, url: &str) -> ScrapeResult {
        match self.fetch_summary(url).await {
            Ok(summary) => {
                app_log!(info, "Scraped {}: {} link(s)", url, summary.links.len());
                ScrapeResult::Page {
                    url: url.to_string(),
                    title: summary.title,
                    links: summary.links,
                }
            }
            Err(e) => {
                app_log!(warn, "Failed to scrape {}: {:#}", url, e);
                ScrapeResult::Error {
                    url: url.to_string(),
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn fetch_summary(&self, url: &str) -> Result<PageSummary> {
        app_log!(debug, "Fetching page: {}", url);

        let response = self.client.get(url).send().await.context("Failed to fetch page")?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }
        let final_url = response.url().to_string();
        let html = response.text().await.context("Failed to read response body")?;

        Ok(parse_page(&html, &final_url))
    }
}

/// Page title and the de-duplicated absolute links it points to, in document order.
pub fn parse_page(html: &str, base: &str) -> PageSummary {
    let document = Html::parse_document(html);

    let title = TITLE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let text = match element.value().attr("content") {
            Some(content) => clean_text(content),
            None => clean_text(&element.text().collect::<Vec<_>>().join(" ")),
        };
        (!text.is_empty()).then_some(text)
    });

    let mut seen = HashSet::new();
    let links = match Selector::parse("a[href]") {
        Ok(anchors) => document
            .select(&anchors)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| absolute_link(base, href))
            .filter(|link| seen.insert(link.clone()))
            .collect(),
        Err(_) => Vec::new(),
    };

    PageSummary { title, links }
}
