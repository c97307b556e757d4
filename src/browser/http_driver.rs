// src/browser/http_driver.rs
//! Driver for server-rendered job boards.
//!
//! Pages are fetched with reqwest (cookies kept across requests, so a login
//! survives into the search) and queried with scraper. Clicking a link
//! follows it, clicking a submit control or pressing Return submits the
//! enclosing form with whatever was typed into it. There is no script
//! engine, so scrolling never reveals anything new.

use super::locator::TEXT_CANDIDATES;
use super::{BrowserDriver, DriverError, ElementHandle, ElementId, Locator, Strategy};
use crate::utils::{absolute_link, clean_text};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;

const FORM_FIELDS: &str = "input, textarea, select";

pub struct HttpDriver {
    client: Client,
    page_load_timeout: Duration,
    current_url: Option<String>,
    html: String,
    generation: u64,
    staged: HashMap<usize, String>,
    closed: bool,
}

/// What a click or Return press turns into once the document is inspected.
#[derive(Debug, PartialEq)]
enum Activation {
    Follow(String),
    Submit(FormRequest),
    Nothing,
}

#[derive(Debug, PartialEq)]
struct FormRequest {
    method: Method,
    action: String,
    fields: Vec<(String, String)>,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn all_elements(document: &Html) -> Vec<ElementRef<'_>> {
    match selector("*") {
        Some(all) => document.select(&all).collect(),
        None => Vec::new(),
    }
}

fn is_interactable(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    let style = value
        .attr("style")
        .map(|s| s.replace(' ', "").to_lowercase())
        .unwrap_or_default();
    value.attr("hidden").is_none()
        && value.attr("disabled").is_none()
        && value.attr("type").map(|t| !t.eq_ignore_ascii_case("hidden")).unwrap_or(true)
        && value.attr("aria-hidden") != Some("true")
        && !style.contains("display:none")
        && !style.contains("visibility:hidden")
}

fn selected_option(select: &ElementRef<'_>) -> String {
    let Some(options) = selector("option") else {
        return String::new();
    };
    let options: Vec<_> = select.select(&options).collect();
    options
        .iter()
        .find(|option| option.value().attr("selected").is_some())
        .or_else(|| options.first())
        .map(|option| {
            option
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| clean_text(&option.text().collect::<String>()))
        })
        .unwrap_or_default()
}

fn element_label(element: &ElementRef<'_>) -> String {
    let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        element.value().attr("value").map(clean_text).unwrap_or_default()
    } else {
        text
    }
}

impl HttpDriver {
    pub fn new(user_agent: &str, page_load_timeout: Duration) -> Result<Self, DriverError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .timeout(page_load_timeout)
            .build()
            .map_err(|e| DriverError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            page_load_timeout,
            current_url: None,
            html: String::new(),
            generation: 0,
            staged: HashMap::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Transport("driver session already closed".into()));
        }
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.current_url.as_deref().unwrap_or("about:blank")
    }

    fn element_id(&self, ordinal: usize) -> ElementId {
        ElementId(format!("{}:{}", self.generation, ordinal))
    }

    /// Ordinal of an element in the current document, rejecting ids from earlier pages.
    fn ordinal(&self, id: &ElementId) -> Result<usize, DriverError> {
        let (generation, ordinal) = id
            .0
            .split_once(':')
            .ok_or_else(|| DriverError::StaleElement(id.clone()))?;
        if generation.parse::<u64>().ok() != Some(self.generation) {
            return Err(DriverError::StaleElement(id.clone()));
        }
        ordinal
            .parse::<usize>()
            .map_err(|_| DriverError::StaleElement(id.clone()))
    }

    fn handle(&self, element: &ElementRef<'_>, ordinal: usize) -> ElementHandle {
        let value = element.value();
        let mut attributes: HashMap<String, String> = value
            .attrs()
            .map(|(name, v)| (name.to_string(), v.to_string()))
            .collect();
        if let Some(staged) = self.staged.get(&ordinal) {
            attributes.insert("value".to_string(), staged.clone());
        }

        let own_href = value.attr("href").map(str::to_string);
        let nested_href = || {
            selector("a[href]")
                .and_then(|anchors| element.select(&anchors).next())
                .and_then(|anchor| anchor.value().attr("href").map(str::to_string))
        };
        let link = own_href
            .or_else(nested_href)
            .and_then(|href| absolute_link(self.base_url(), &href));

        ElementHandle {
            id: self.element_id(ordinal),
            tag: value.name().to_string(),
            text: clean_text(&element.text().collect::<Vec<_>>().join(" ")),
            attributes,
            link,
            interactable: is_interactable(element),
        }
    }

    fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let document = Html::parse_document(&self.html);
        let ordinals: HashMap<_, usize> = all_elements(&document)
            .iter()
            .enumerate()
            .map(|(ordinal, element)| (element.id(), ordinal))
            .collect();

        let (css, needle) = match locator.strategy() {
            Strategy::Text => (TEXT_CANDIDATES.to_string(), Some(locator.pattern().to_lowercase())),
            _ => match locator.to_css() {
                Some(css) => (css, None),
                None => return Ok(Vec::new()),
            },
        };
        let Some(compiled) = selector(&css) else {
            return Err(DriverError::Unsupported(format!("unparseable selector for {}: {}", locator, css)));
        };

        let found = document
            .select(&compiled)
            .filter(|element| match &needle {
                Some(needle) => element_label(element).to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter_map(|element| {
                ordinals
                    .get(&element.id())
                    .map(|ordinal| self.handle(&element, *ordinal))
            })
            .collect();
        Ok(found)
    }

    /// Decide what activating an element does, without touching the network.
    fn activation_for(&self, id: &ElementId, submit_only: bool) -> Result<Activation, DriverError> {
        let ordinal = self.ordinal(id)?;
        let document = Html::parse_document(&self.html);
        let elements = all_elements(&document);
        let element = elements
            .get(ordinal)
            .copied()
            .ok_or_else(|| DriverError::StaleElement(id.clone()))?;

        let value = element.value();
        let tag = value.name();
        let kind = value.attr("type").unwrap_or_default().to_lowercase();

        if !submit_only {
            if tag == "a" {
                return Ok(value
                    .attr("href")
                    .and_then(|href| absolute_link(self.base_url(), href))
                    .map(Activation::Follow)
                    .unwrap_or(Activation::Nothing));
            }
            let submits = (tag == "button" && !matches!(kind.as_str(), "button" | "reset"))
                || (tag == "input" && matches!(kind.as_str(), "submit" | "image"));
            if !submits {
                let nested = selector("a[href]")
                    .and_then(|anchors| element.select(&anchors).next())
                    .and_then(|anchor| anchor.value().attr("href"))
                    .and_then(|href| absolute_link(self.base_url(), href));
                return Ok(nested.map(Activation::Follow).unwrap_or(Activation::Nothing));
            }
        }

        let Some(form) = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "form")
        else {
            return Ok(Activation::Nothing);
        };

        let submitter = if submit_only { None } else { Some(ordinal) };
        Ok(Activation::Submit(self.form_request(&form, &elements, submitter)))
    }

    fn form_request(
        &self,
        form: &ElementRef<'_>,
        elements: &[ElementRef<'_>],
        submitter: Option<usize>,
    ) -> FormRequest {
        let ordinals: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(ordinal, element)| (element.id(), ordinal))
            .collect();

        let mut fields = Vec::new();
        if let Some(controls) = selector(FORM_FIELDS) {
            for field in form.select(&controls) {
                let value = field.value();
                let Some(name) = value.attr("name").filter(|n| !n.is_empty()) else {
                    continue;
                };
                if value.attr("disabled").is_some() {
                    continue;
                }
                let ordinal = ordinals.get(&field.id()).copied();
                let kind = value.attr("type").unwrap_or("text").to_lowercase();

                if value.name() == "input" {
                    match kind.as_str() {
                        "submit" | "image" | "button" | "reset" => {
                            if ordinal.is_some() && ordinal == submitter {
                                fields.push((name.to_string(), value.attr("value").unwrap_or_default().to_string()));
                            }
                            continue;
                        }
                        "file" => continue,
                        "checkbox" | "radio" if value.attr("checked").is_none() => continue,
                        _ => {}
                    }
                }

                let current = match value.name() {
                    "textarea" => field.text().collect::<String>(),
                    "select" => selected_option(&field),
                    _ if matches!(kind.as_str(), "checkbox" | "radio") => {
                        value.attr("value").unwrap_or("on").to_string()
                    }
                    _ => value.attr("value").unwrap_or_default().to_string(),
                };
                let staged = ordinal.and_then(|o| self.staged.get(&o)).cloned();
                fields.push((name.to_string(), staged.unwrap_or(current)));
            }
        }

        // <button> submitters are not form controls in the selector above
        if let Some(button) = submitter
            .and_then(|ordinal| elements.get(ordinal))
            .filter(|element| element.value().name() == "button")
        {
            if let Some(name) = button.value().attr("name") {
                fields.push((name.to_string(), button.value().attr("value").unwrap_or_default().to_string()));
            }
        }

        let action = form
            .value()
            .attr("action")
            .filter(|action| !action.trim().is_empty())
            .and_then(|action| absolute_link(self.base_url(), action))
            .unwrap_or_else(|| self.base_url().to_string());
        let method = match form.value().attr("method") {
            Some(method) if method.eq_ignore_ascii_case("post") => Method::POST,
            _ => Method::GET,
        };

        FormRequest { method, action, fields }
    }

    async fn execute(&mut self, activation: Activation) -> Result<(), DriverError> {
        match activation {
            Activation::Follow(url) => self.load(Method::GET, &url, None).await,
            Activation::Submit(form) => {
                app_log!(debug, "Submitting form to {} ({} field(s))", form.action, form.fields.len());
                self.load(form.method, &form.action, Some(form.fields)).await
            }
            Activation::Nothing => Ok(()),
        }
    }

    async fn load(
        &mut self,
        method: Method,
        url: &str,
        fields: Option<Vec<(String, String)>>,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;

        let request = match fields {
            Some(fields) if method == Method::POST => self.client.post(url).form(&fields),
            Some(fields) => {
                let mut target = Url::parse(url).map_err(|e| DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                target.query_pairs_mut().clear().extend_pairs(fields.iter());
                self.client.get(target)
            }
            None => self.client.get(url),
        };

        let response = match tokio::time::timeout(self.page_load_timeout, request.send()).await {
            Err(_) => {
                return Err(DriverError::Timeout {
                    action: format!("loading {}", url),
                    after: self.page_load_timeout,
                })
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(DriverError::Timeout {
                    action: format!("loading {}", url),
                    after: self.page_load_timeout,
                })
            }
            Ok(Err(e)) => {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            app_log!(warn, "{} answered {}", url, status);
        }
        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| DriverError::Navigation {
            url: url.to_string(),
            reason: format!("failed to read response body: {}", e),
        })?;

        app_log!(debug, "Loaded {} ({} bytes)", final_url, html.len());
        self.current_url = Some(final_url);
        self.html = html;
        self.generation += 1;
        self.staged.clear();
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        app_log!(info, "Navigating to {}", url);
        self.load(Method::GET, url, None).await
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.ensure_open()?;
        Ok(self.base_url().to_string())
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        self.ensure_open()?;
        self.query(locator)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.ensure_open()?;
        let activation = self.activation_for(&element.id, false)?;
        if activation == Activation::Nothing {
            app_log!(debug, "Click on <{}> {} has no effect without scripts", element.tag, element.id);
        }
        self.execute(activation).await
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let ordinal = self.ordinal(&element.id)?;
        self.staged.insert(ordinal, text.to_string());
        Ok(())
    }

    async fn press_return(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.ensure_open()?;
        let activation = self.activation_for(&element.id, true)?;
        self.execute(activation).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.ensure_open()
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.html);
        let text = selector("body")
            .and_then(|body| document.select(&body).next())
            .map(|body| body.text().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();
        Ok(text)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            app_log!(debug, "Closing HTTP driver session");
        }
        self.closed = true;
        self.html.clear();
        self.staged.clear();
        Ok(())
    }
}
