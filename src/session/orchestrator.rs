// src/session/orchestrator.rs
//! Drives one run: login, search, collect, export, apply.
//!
//! A [`Session`] owns its driver for the whole run and always closes it
//! before handing back the [`RunReport`]. Locator misses, a failed apply and
//! a bad page load are soft and only affect the current attempt or listing;
//! a transport failure ends the run.

use super::cancel::CancelSignal;
use super::site::SiteProfile;
use super::{ApplicationOutcome, ApplicationRecord, Failure, FailureKind, RunReport, SessionError, SessionState};
use crate::browser::{BrowserDriver, DriverError, ElementHandle, LocatorChain, LocatorError, WaitPolicy};
use crate::config::{ConfigError, EngineConfig, DEFAULT_LOGIN_PATTERN};
use crate::export::ResultsExporter;
use crate::inputs::{CandidateInputs, Credentials, InputError, SearchCriteria};
use crate::resume::{extract_profile, DocumentText, FileDocumentText};
use crate::types::{JobListing, ListingSet, ResumeProfile};
use crate::utils::absolute_link;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Per-candidate wait for targets the stage cannot do without.
    pub wait: WaitPolicy,
    /// Shorter wait for targets that are merely nice to have.
    pub optional_wait: WaitPolicy,
    pub settle_delay: Duration,
    pub max_login_attempts: u32,
    /// A post-login URL matching this means the login did not take.
    pub login_pattern: Regex,
    pub scroll_passes: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            optional_wait: WaitPolicy::new(Duration::from_secs(1), WaitPolicy::default().poll_interval),
            settle_delay: Duration::from_millis(1_500),
            max_login_attempts: 3,
            login_pattern: Regex::new(DEFAULT_LOGIN_PATTERN).expect("default login pattern compiles"),
            scroll_passes: 3,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            wait: WaitPolicy::new(config.locator_wait(), config.poll_interval()),
            optional_wait: WaitPolicy::new(config.optional_wait(), config.poll_interval()),
            settle_delay: config.settle_delay(),
            max_login_attempts: config.max_login_attempts.max(1),
            login_pattern: config.login_regex()?,
            scroll_passes: config.scroll_passes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSource {
    /// Local document read through the [`DocumentText`] collaborator.
    File(PathBuf),
    /// Page whose visible text is the resume (e.g. a hosted profile).
    Page(String),
}

/// Values typed into application forms when a site asks for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applicant {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Defaults to the search page when absent.
    pub login_url: Option<String>,
    pub search_url: String,
    pub credentials: Option<Credentials>,
    pub criteria: SearchCriteria,
    pub resume: Option<ResumeSource>,
    pub applicant: Applicant,
}

impl RunPlan {
    /// Build from validated inputs, placing the site's login and search paths on the board URL.
    pub fn from_inputs(inputs: &CandidateInputs, site: &SiteProfile) -> Result<Self, InputError> {
        let base = inputs.job_site_url.as_str();
        let on_site = |path: &str| {
            absolute_link(base, path).ok_or_else(|| InputError::InvalidJobSite(base.to_string()))
        };

        let login_url = match inputs.credentials {
            Some(_) => Some(on_site(&site.login_path)?),
            None => None,
        };

        Ok(Self {
            login_url,
            search_url: on_site(&site.search_path)?,
            credentials: inputs.credentials.clone(),
            criteria: inputs.search_criteria()?,
            resume: inputs.resume_path.clone().map(ResumeSource::File),
            applicant: Applicant {
                first_name: Some(inputs.first_name.clone()).filter(|n| !n.is_empty()),
                last_name: Some(inputs.last_name.clone()).filter(|n| !n.is_empty()),
            },
        })
    }
}

/// Fatal driver errors end the run; anything else goes back to the caller as a soft failure.
fn escalate<T>(result: Result<T, DriverError>) -> Result<Result<T, DriverError>, SessionError> {
    match result {
        Err(err) if err.is_fatal() => Err(SessionError::Transport(err)),
        other => Ok(other),
    }
}

/// First interactable element for `chain`, `None` when every candidate missed.
async fn locate<D>(driver: &mut D, chain: &LocatorChain, wait: &WaitPolicy) -> Result<Option<ElementHandle>, SessionError>
where
    D: BrowserDriver + ?Sized,
{
    match chain.resolve(driver, wait).await {
        Ok(element) => Ok(Some(element)),
        Err(LocatorError::Driver(err)) if err.is_fatal() => Err(SessionError::Transport(err)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => {
            app_log!(warn, "Lookup of '{}' failed: {}", chain.target(), err);
            Ok(None)
        }
    }
}

async fn locate_all<D>(driver: &mut D, chain: &LocatorChain, wait: &WaitPolicy) -> Result<Vec<ElementHandle>, SessionError>
where
    D: BrowserDriver + ?Sized,
{
    match chain.resolve_all(driver, wait).await {
        Ok(elements) => Ok(elements),
        Err(LocatorError::Driver(err)) if err.is_fatal() => Err(SessionError::Transport(err)),
        Err(err) => {
            app_log!(debug, "No elements for '{}': {}", chain.target(), err);
            Ok(Vec::new())
        }
    }
}

fn to_listing(element: &ElementHandle) -> Option<JobListing> {
    let title = element.label()?;
    let link = element.link.clone()?;
    Some(JobListing::new(title, link))
}

pub struct Session<D: BrowserDriver> {
    id: Uuid,
    driver: D,
    settings: SessionSettings,
    site: SiteProfile,
    exporter: ResultsExporter,
    documents: Arc<dyn DocumentText>,
    cancel: CancelSignal,
    state: SessionState,
    report: RunReport,
}

impl<D: BrowserDriver> Session<D> {
    pub fn new(driver: D, settings: SessionSettings) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            driver,
            settings,
            site: SiteProfile::default(),
            exporter: ResultsExporter::default(),
            documents: Arc::new(FileDocumentText),
            cancel: CancelSignal::never(),
            state: SessionState::Idle,
            report: RunReport::new(id),
        }
    }

    pub fn with_site(mut self, site: SiteProfile) -> Self {
        self.site = site;
        self
    }

    pub fn with_exporter(mut self, exporter: ResultsExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentText>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole pipeline. The driver is closed before this returns, whatever the outcome.
    pub async fn run(mut self, plan: RunPlan) -> RunReport {
        app_log!(info, "Session {} starting against {}", self.id, plan.search_url);

        let result = self.drive(&plan).await;
        self.release().await;
        if let Err(err) = result {
            self.fail(err.into_failure());
        }

        self.report.final_state = self.state.clone();
        app_log!(
            info,
            "Session {} finished as {} ({} listing(s), {} submitted)",
            self.id,
            self.state,
            self.report.listings.len(),
            self.report.submitted()
        );
        self.report
    }

    async fn drive(&mut self, plan: &RunPlan) -> Result<(), SessionError> {
        self.checkpoint()?;

        match &plan.credentials {
            Some(credentials) => {
                let login_url = plan.login_url.as_deref().unwrap_or(&plan.search_url);
                self.login(credentials, login_url).await?;
            }
            None => app_log!(info, "No credentials supplied, searching without login"),
        }

        self.search(plan).await?;
        let listings = self.collect().await?;
        self.report.listings = listings.clone();
        self.export(&listings, &plan.criteria.location).await;

        if listings.is_empty() {
            return Err(SessionError::Halted(Failure::new(
                FailureKind::NoListings,
                format!("no listings found after {} scroll pass(es)", self.settings.scroll_passes),
            )));
        }

        self.load_profile(plan).await?;
        self.apply_all(&listings, plan).await?;
        self.transition(SessionState::Done)
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(&next) {
            return Err(SessionError::IllegalTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        app_log!(debug, "Session {}: {} -> {}", self.id, self.state, next);
        self.report.transitions.push(next.clone());
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, failure: Failure) {
        if self.state.is_terminal() {
            return;
        }
        match failure.kind {
            FailureKind::Transport | FailureKind::Internal => {
                app_log!(error, "Session {} failed: {}", self.id, failure)
            }
            _ => app_log!(warn, "Session {} stopped: {}", self.id, failure),
        }
        let failed = SessionState::Failed(failure);
        self.report.transitions.push(failed.clone());
        self.state = failed;
    }

    fn checkpoint(&self) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        Ok(())
    }

    fn cancelled(&self) -> SessionError {
        SessionError::Halted(Failure::new(
            FailureKind::Cancelled,
            format!("cancelled while {}", self.state.name()),
        ))
    }

    /// Let page scripts settle. Cancellation cuts the delay short.
    async fn settle(&mut self) -> Result<(), SessionError> {
        self.checkpoint()?;
        let delay = self.settings.settle_delay;
        if delay.is_zero() {
            return Ok(());
        }
        let mut cancel = self.cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(self.cancelled()),
        }
    }

    async fn release(&mut self) {
        match self.driver.close().await {
            Ok(()) => app_log!(debug, "Session {} released its browser", self.id),
            Err(err) => app_log!(warn, "Session {} could not close its browser cleanly: {}", self.id, err),
        }
    }

    async fn login(&mut self, credentials: &Credentials, login_url: &str) -> Result<(), SessionError> {
        let max = self.settings.max_login_attempts;
        for attempt in 1..=max {
            self.checkpoint()?;
            self.transition(SessionState::LoggingIn)?;
            self.report.login_attempts = attempt;
            app_log!(info, "Login attempt {}/{}", attempt, max);

            if self.attempt_login(credentials, login_url).await? {
                app_log!(info, "Logged in on attempt {}", attempt);
                return Ok(());
            }
            app_log!(warn, "Login attempt {}/{} did not succeed", attempt, max);
        }

        Err(SessionError::Halted(Failure::new(
            FailureKind::LoginExhausted,
            format!("no login success after {} attempt(s)", max),
        )))
    }

    async fn attempt_login(&mut self, credentials: &Credentials, login_url: &str) -> Result<bool, SessionError> {
        if let Err(err) = escalate(self.driver.navigate(login_url).await)? {
            app_log!(warn, "Login page unavailable: {}", err);
            return Ok(false);
        }

        let wait = self.settings.wait;
        let Some(username) = locate(&mut self.driver, &self.site.username, &wait).await? else {
            return Ok(false);
        };
        if let Err(err) = escalate(self.driver.type_text(&username, &credentials.identifier).await)? {
            app_log!(warn, "Could not enter username: {}", err);
            return Ok(false);
        }
        let Some(password) = locate(&mut self.driver, &self.site.password, &wait).await? else {
            return Ok(false);
        };
        if let Err(err) = escalate(self.driver.type_text(&password, credentials.secret()).await)? {
            app_log!(warn, "Could not enter password: {}", err);
            return Ok(false);
        }

        let optional = self.settings.optional_wait;
        let submitted = match locate(&mut self.driver, &self.site.login_submit, &optional).await? {
            Some(button) => escalate(self.driver.click(&button).await)?,
            None => escalate(self.driver.press_return(&password).await)?,
        };
        if let Err(err) = submitted {
            app_log!(warn, "Login submission failed: {}", err);
            return Ok(false);
        }
        self.settle().await?;

        match escalate(self.driver.current_url().await)? {
            Ok(url) => Ok(!self.settings.login_pattern.is_match(&url)),
            Err(err) => {
                app_log!(warn, "Could not read post-login URL: {}", err);
                Ok(false)
            }
        }
    }

    async fn search(&mut self, plan: &RunPlan) -> Result<(), SessionError> {
        self.checkpoint()?;
        self.transition(SessionState::Searching)?;

        if let Err(err) = escalate(self.driver.navigate(&plan.search_url).await)? {
            return Err(SessionError::Halted(Failure::new(
                FailureKind::SearchUnavailable,
                format!("could not open {}: {}", plan.search_url, err),
            )));
        }

        let wait = self.settings.wait;
        let optional = self.settings.optional_wait;
        let Some(keywords) = locate(&mut self.driver, &self.site.search_keywords, &wait).await? else {
            return Err(SessionError::Halted(Failure::new(
                FailureKind::SearchFieldNotFound,
                format!("no keyword field on {}", plan.search_url),
            )));
        };
        if let Err(err) = escalate(self.driver.type_text(&keywords, &plan.criteria.keywords()).await)? {
            return Err(SessionError::Halted(Failure::new(
                FailureKind::SearchUnavailable,
                format!("could not enter keywords: {}", err),
            )));
        }

        match locate(&mut self.driver, &self.site.search_location, &optional).await? {
            Some(location) => {
                if let Err(err) = escalate(self.driver.type_text(&location, &plan.criteria.location).await)? {
                    app_log!(warn, "Could not enter location: {}", err);
                }
            }
            None => app_log!(debug, "No location field, searching on keywords only"),
        }

        // Button first, Return in the keyword field as the fallback.
        let submitted = match locate(&mut self.driver, &self.site.search_submit, &optional).await? {
            Some(button) => escalate(self.driver.click(&button).await)?,
            None => escalate(self.driver.press_return(&keywords).await)?,
        };
        if let Err(err) = submitted {
            return Err(SessionError::Halted(Failure::new(
                FailureKind::SearchUnavailable,
                format!("search submission failed: {}", err),
            )));
        }
        self.settle().await?;

        if locate_all(&mut self.driver, &self.site.listing_container, &wait).await?.is_empty() {
            app_log!(warn, "No listing container found, scanning the whole page");
        }
        Ok(())
    }

    async fn collect(&mut self) -> Result<Vec<JobListing>, SessionError> {
        self.checkpoint()?;
        self.transition(SessionState::Collecting)?;

        let mut listings = ListingSet::default();
        let wait = self.settings.wait;
        let initial = self.scan(&wait).await?;
        app_log!(info, "Initial scan found {} listing(s)", listings.merge(initial));

        let passes = self.settings.scroll_passes;
        let optional = self.settings.optional_wait;
        for pass in 1..=passes {
            self.checkpoint()?;
            if let Err(err) = escalate(self.driver.scroll_to_bottom().await)? {
                app_log!(warn, "Scroll pass {} failed: {}", pass, err);
            }
            self.settle().await?;
            let added = listings.merge(self.scan(&optional).await?);
            self.transition(SessionState::Collecting)?;
            app_log!(debug, "Scroll pass {}/{} added {} listing(s)", pass, passes, added);
        }

        app_log!(info, "Collected {} unique listing(s)", listings.len());
        Ok(listings.into_vec())
    }

    async fn scan(&mut self, wait: &WaitPolicy) -> Result<Vec<JobListing>, SessionError> {
        let elements = locate_all(&mut self.driver, &self.site.listing_item, wait).await?;
        Ok(elements.iter().filter_map(to_listing).collect())
    }

    async fn export(&mut self, listings: &[JobListing], location: &str) {
        let exporter = self.exporter.clone();
        let rows = listings.to_vec();
        let location = location.to_string();
        match tokio::task::spawn_blocking(move || exporter.export(&rows, &location)).await {
            Ok(Ok(summary)) => self.report.export = Some(summary),
            Ok(Err(err)) => app_log!(error, "Failed to export listings: {}", err),
            Err(err) => app_log!(error, "Listing export task panicked: {}", err),
        }
    }

    /// Computes the profile once per run. Unreadable resumes give an empty profile.
    async fn load_profile(&mut self, plan: &RunPlan) -> Result<(), SessionError> {
        if self.report.profile.is_some() {
            return Ok(());
        }
        let text = match &plan.resume {
            None => return Ok(()),
            Some(ResumeSource::File(path)) => {
                let documents = Arc::clone(&self.documents);
                let path = path.clone();
                match tokio::task::spawn_blocking(move || documents.extract_text(&path)).await {
                    Ok(Ok(text)) => text,
                    Ok(Err(err)) => {
                        app_log!(warn, "Could not read resume: {:#}", err);
                        String::new()
                    }
                    Err(err) => {
                        app_log!(warn, "Resume reader panicked: {}", err);
                        String::new()
                    }
                }
            }
            Some(ResumeSource::Page(url)) => {
                let loaded = match escalate(self.driver.navigate(url).await)? {
                    Ok(()) => escalate(self.driver.page_text().await)?,
                    Err(err) => Err(err),
                };
                loaded.unwrap_or_else(|err| {
                    app_log!(warn, "Could not read resume page {}: {}", url, err);
                    String::new()
                })
            }
        };

        self.report.profile = Some(extract_profile(&text));
        Ok(())
    }

    async fn apply_all(&mut self, listings: &[JobListing], plan: &RunPlan) -> Result<(), SessionError> {
        let total = listings.len();
        for (index, listing) in listings.iter().enumerate() {
            self.checkpoint()?;
            self.transition(SessionState::Applying)?;
            app_log!(info, "Applying {}/{}: {}", index + 1, total, listing.title);

            let outcome = self.apply_one(listing, plan).await?;
            match &outcome {
                ApplicationOutcome::Submitted => app_log!(info, "Submitted application for {}", listing.link),
                ApplicationOutcome::Skipped(reason) => app_log!(warn, "Skipped {}: {}", listing.link, reason),
                ApplicationOutcome::Failed(reason) => app_log!(warn, "Application to {} failed: {}", listing.link, reason),
            }
            self.report.applications.push(ApplicationRecord {
                listing: listing.clone(),
                outcome,
            });
        }
        Ok(())
    }

    async fn apply_one(&mut self, listing: &JobListing, plan: &RunPlan) -> Result<ApplicationOutcome, SessionError> {
        if let Err(err) = escalate(self.driver.navigate(&listing.link).await)? {
            return Ok(ApplicationOutcome::Failed(format!("navigation failed: {}", err)));
        }

        let wait = self.settings.wait;
        let Some(apply) = locate(&mut self.driver, &self.site.apply_button, &wait).await? else {
            return Ok(ApplicationOutcome::Skipped("apply_button_not_found".to_string()));
        };
        if let Err(err) = escalate(self.driver.click(&apply).await)? {
            return Ok(ApplicationOutcome::Failed(format!("apply click failed: {}", err)));
        }
        self.settle().await?;

        self.fill_applicant_fields(plan).await?;

        let Some(submit) = locate(&mut self.driver, &self.site.submit_application, &wait).await? else {
            return Ok(ApplicationOutcome::Skipped("submit_button_not_found".to_string()));
        };
        if let Err(err) = escalate(self.driver.click(&submit).await)? {
            return Ok(ApplicationOutcome::Failed(format!("submit click failed: {}", err)));
        }
        self.settle().await?;

        Ok(ApplicationOutcome::Submitted)
    }

    /// Type whatever the form asks for and we know. Missing fields are fine.
    async fn fill_applicant_fields(&mut self, plan: &RunPlan) -> Result<(), SessionError> {
        let profile = self.report.profile.clone().unwrap_or_else(ResumeProfile::default);
        let values = [
            plan.applicant.first_name.clone().or(profile.first_name),
            plan.applicant.last_name.clone().or(profile.last_name),
            profile.email,
            profile.phone,
        ];
        let chains = [
            &self.site.applicant_first_name,
            &self.site.applicant_last_name,
            &self.site.applicant_email,
            &self.site.applicant_phone,
        ];
        let optional = self.settings.optional_wait;

        for (chain, value) in chains.into_iter().zip(values) {
            let Some(value) = value else { continue };
            let Some(field) = locate(&mut self.driver, chain, &optional).await? else {
                continue;
            };
            if let Err(err) = escalate(self.driver.type_text(&field, &value).await)? {
                app_log!(debug, "Could not fill '{}': {}", chain.target(), err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeAction, FakeDriver, FakeElement};
    use crate::browser::Locator;
    use crate::export::ExportSummary;
    use crate::session::cancel_pair;
    use std::path::Path;

    /// Serves a fixed resume text, or fails, without touching the filesystem.
    struct StubDocuments(Option<&'static str>);

    impl DocumentText for StubDocuments {
        fn extract_text(&self, path: &Path) -> anyhow::Result<String> {
            match self.0 {
                Some(text) => Ok(text.to_string()),
                None => anyhow::bail!("cannot read {}", path.display()),
            }
        }
    }

    const LOGIN: &str = "https://board.example.com/login";
    const FEED: &str = "https://board.example.com/feed";
    const SEARCH: &str = "https://board.example.com/jobs";
    const RESULTS: &str = "https://board.example.com/jobs/search?keywords=rust";
    const PROFILE_PAGE: &str = "https://profiles.example.com/ada";

    fn settings() -> SessionSettings {
        SessionSettings {
            wait: WaitPolicy::new(Duration::from_millis(20), Duration::from_millis(5)),
            optional_wait: WaitPolicy::new(Duration::from_millis(10), Duration::from_millis(5)),
            settle_delay: Duration::ZERO,
            max_login_attempts: 3,
            login_pattern: Regex::new(DEFAULT_LOGIN_PATTERN).unwrap(),
            scroll_passes: 3,
        }
    }

    fn plan(with_credentials: bool) -> RunPlan {
        RunPlan {
            login_url: Some(LOGIN.to_string()),
            search_url: SEARCH.to_string(),
            credentials: with_credentials.then(|| Credentials::new("ada@example.com", "hunter2")),
            criteria: SearchCriteria::new(vec!["Rust Engineer".into()], None).unwrap(),
            resume: None,
            applicant: Applicant::default(),
        }
    }

    fn temp_exporter() -> ResultsExporter {
        ResultsExporter::new(std::env::temp_dir().join(format!("listings-{}.csv", uuid::Uuid::new_v4())))
    }

    fn session(driver: &FakeDriver, exporter: &ResultsExporter) -> Session<FakeDriver> {
        Session::new(driver.clone(), settings()).with_exporter(exporter.clone())
    }

    fn login_page(driver: &FakeDriver, succeed_on: u32) {
        driver
            .page(LOGIN)
            .with(FakeElement::new("user", "input").matching(Locator::name("session_key")))
            .with(FakeElement::new("pass", "input").matching(Locator::input_type("password")))
            .with(
                FakeElement::new("sign-in", "button")
                    .matching(Locator::css("button[type='submit']"))
                    .on_click(FakeAction::NavigateOnAttempt {
                        succeed_on,
                        success: FEED.to_string(),
                        failure: format!("{}?error=1", LOGIN),
                    }),
            );
    }

    fn search_page(driver: &FakeDriver) {
        driver
            .page(SEARCH)
            .with(
                FakeElement::new("keywords", "input")
                    .matching(Locator::name("keywords"))
                    .on_return(FakeAction::Navigate(RESULTS.to_string())),
            )
            .with(FakeElement::new("where", "input").matching(Locator::name("location")));
    }

    fn card(id: &str, title: &str, link: &str) -> FakeElement {
        FakeElement::new(id, "a")
            .matching(Locator::css("a.base-card__full-link"))
            .text(title)
            .link(link)
    }

    fn results_page(driver: &FakeDriver, cards: Vec<FakeElement>) {
        let mut page = driver
            .page(RESULTS)
            .with(FakeElement::new("results", "ul").matching(Locator::class_name("jobs-search__results-list")));
        for card in cards {
            page = page.with(card);
        }
    }

    fn job_page(driver: &FakeDriver, url: &str, with_apply: bool) {
        let page = driver.page(url).with(
            FakeElement::new("submit", "button").matching(Locator::text("submit application")),
        );
        if with_apply {
            page.with(FakeElement::new("apply", "button").matching(Locator::class_name("jobs-apply-button")));
        }
    }

    fn job_url(n: u32) -> String {
        format!("https://board.example.com/jobs/view/{}", n)
    }

    /// Board with three listings, each applicable.
    fn full_board(driver: &FakeDriver, succeed_on: u32) {
        login_page(driver, succeed_on);
        search_page(driver);
        results_page(
            driver,
            (1..=3)
                .map(|n| card(&format!("card-{}", n), &format!("Rust Engineer {}", n), &job_url(n)))
                .collect(),
        );
        for n in 1..=3 {
            job_page(driver, &job_url(n), true);
        }
    }

    fn count(report: &RunReport, state: &SessionState) -> usize {
        report.transitions.iter().filter(|s| *s == state).count()
    }

    fn assert_monotonic(report: &RunReport) {
        for pair in report.transitions.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn test_login_succeeds_on_retry() {
        let driver = FakeDriver::new();
        full_board(&driver, 2);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(true)).await;

        assert!(report.is_done(), "ended as {}", report.final_state);
        assert_eq!(report.login_attempts, 2);
        assert_eq!(driver.activations("sign-in"), 2);
        assert_eq!(count(&report, &SessionState::LoggingIn), 2);
        assert_eq!(report.submitted(), 3);
        assert_eq!(report.export, Some(ExportSummary::Appended { rows: 3 }));
        assert_monotonic(&report);
        assert_eq!(driver.closed(), 1);
        assert!(driver.typed().contains(&("pass".to_string(), "hunter2".to_string())));

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_login_exhausted_after_max_attempts() {
        let driver = FakeDriver::new();
        full_board(&driver, 99);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(true)).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.reason(), "login_exhausted");
        assert_eq!(failure.to_string(), "login_exhausted: no login success after 3 attempt(s)");
        assert_eq!(driver.activations("sign-in"), 3);
        assert_eq!(report.login_attempts, 3);
        assert!(!driver.visits().contains(&SEARCH.to_string()));
        assert_eq!(driver.closed(), 1);
        assert_monotonic(&report);
    }

    #[tokio::test]
    async fn test_without_credentials_login_is_skipped() {
        let driver = FakeDriver::new();
        full_board(&driver, 1);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert!(report.is_done());
        assert_eq!(report.transitions[1], SessionState::Searching);
        assert_eq!(report.login_attempts, 0);
        assert!(!driver.visits().contains(&LOGIN.to_string()));
        assert!(driver.typed().contains(&("keywords".to_string(), "Rust Engineer".to_string())));
        assert!(driver.typed().contains(&("where".to_string(), "Remote".to_string())));

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_duplicates_across_scroll_passes_collapse() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(
            &driver,
            vec![
                card("a1", "Rust Engineer", &job_url(1)),
                card("a1-again", "Rust Engineer", &job_url(1)).after_scrolls(1),
                card("a2", "Rust Engineer", &job_url(2)).after_scrolls(2),
            ],
        );
        job_page(&driver, &job_url(1), true);
        job_page(&driver, &job_url(2), true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert_eq!(report.listings.len(), 2);
        assert_eq!(report.listings[0].link, job_url(1));
        assert_eq!(report.listings[1].link, job_url(2));
        assert_eq!(count(&report, &SessionState::Collecting), 4);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_no_listings_is_a_clean_stage_failure() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(&driver, Vec::new());
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert_eq!(report.failure().map(Failure::reason), Some("no_listings"));
        assert_eq!(report.export, Some(ExportSummary::NothingToSave));
        assert!(!exporter.path().exists());
        assert!(report.applications.is_empty());
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_one_bad_listing_does_not_stop_the_rest() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(
            &driver,
            (1..=3)
                .map(|n| card(&format!("card-{}", n), &format!("Role {}", n), &job_url(n)))
                .collect(),
        );
        job_page(&driver, &job_url(1), true);
        job_page(&driver, &job_url(2), false);
        job_page(&driver, &job_url(3), true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        let outcomes: Vec<_> = report.applications.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                ApplicationOutcome::Submitted,
                ApplicationOutcome::Skipped("apply_button_not_found".into()),
                ApplicationOutcome::Submitted,
            ]
        );
        assert!(report.is_done());
        assert_eq!(count(&report, &SessionState::Applying), 3);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_timed_out_click_fails_only_that_listing() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(
            &driver,
            vec![card("c1", "Role 1", &job_url(1)), card("c2", "Role 2", &job_url(2))],
        );
        driver.page(&job_url(1)).with(
            FakeElement::new("apply", "button")
                .matching(Locator::class_name("jobs-apply-button"))
                .on_click(FakeAction::Timeout),
        );
        job_page(&driver, &job_url(2), true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert!(matches!(&report.applications[0].outcome, ApplicationOutcome::Failed(reason) if reason.contains("timed out")));
        assert_eq!(report.applications[1].outcome, ApplicationOutcome::Submitted);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_search_field_halts_search() {
        let driver = FakeDriver::new();
        driver.page(SEARCH);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert_eq!(report.failure().map(Failure::reason), Some("search_field_not_found"));
        assert_eq!(report.export, None);
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_releases_browser() {
        let driver = FakeDriver::new();
        full_board(&driver, 1);
        driver.set_transport_down(true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(true)).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Transport);
        assert_eq!(report.login_attempts, 1);
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let driver = FakeDriver::new();
        full_board(&driver, 1);
        let exporter = temp_exporter();
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let report = session(&driver, &exporter).with_cancel(signal).run(plan(true)).await;

        assert_eq!(report.failure().map(Failure::reason), Some("cancelled"));
        assert!(driver.visits().is_empty());
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_settle_delay() {
        let driver = FakeDriver::new();
        full_board(&driver, 1);
        let exporter = temp_exporter();
        let (handle, signal) = cancel_pair();
        let mut slow = settings();
        slow.settle_delay = Duration::from_secs(30);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });
        let run = Session::new(driver.clone(), slow)
            .with_exporter(exporter.clone())
            .with_cancel(signal)
            .run(plan(true));
        let report = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap();

        let failure = report.failure().unwrap();
        assert_eq!(failure.detail, "cancelled while logging_in");
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_profile_from_page_fills_application() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(&driver, vec![card("c1", "Role 1", &job_url(1))]);
        driver
            .page(&job_url(1))
            .with(FakeElement::new("apply", "button").matching(Locator::class_name("jobs-apply-button")))
            .with(FakeElement::new("email", "input").matching(Locator::input_type("email")))
            .with(FakeElement::new("first", "input").matching(Locator::name_contains("first")))
            .with(FakeElement::new("submit", "button").matching(Locator::text("submit application")));
        driver
            .page(PROFILE_PAGE)
            .body("Ada Lovelace\nada@example.com\nBabbage Works, Programmer, 1842-1843");
        let exporter = temp_exporter();

        let mut plan = plan(false);
        plan.resume = Some(ResumeSource::Page(PROFILE_PAGE.to_string()));
        plan.applicant.first_name = Some("Augusta".to_string());
        let report = session(&driver, &exporter).run(plan).await;

        let profile = report.profile.as_ref().unwrap();
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(profile.job_history.len(), 1);
        assert_eq!(driver.visits().iter().filter(|v| *v == PROFILE_PAGE).count(), 1);

        let typed = driver.typed();
        assert!(typed.contains(&("email".to_string(), "ada@example.com".to_string())));
        assert!(typed.contains(&("first".to_string(), "Augusta".to_string())));
        assert_eq!(report.submitted(), 1);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    fn applicable_job(driver: &FakeDriver, url: &str) {
        driver
            .page(url)
            .with(FakeElement::new("apply", "button").matching(Locator::class_name("jobs-apply-button")))
            .with(FakeElement::new("email", "input").matching(Locator::input_type("email")))
            .with(FakeElement::new("phone", "input").matching(Locator::input_type("tel")))
            .with(FakeElement::new("submit", "button").matching(Locator::text("submit application")));
    }

    #[tokio::test]
    async fn test_profile_from_resume_file_fills_application() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(&driver, vec![card("c1", "Role 1", &job_url(1))]);
        applicable_job(&driver, &job_url(1));
        let exporter = temp_exporter();

        let mut plan = plan(false);
        plan.resume = Some(ResumeSource::File(PathBuf::from("cv.pdf")));
        let report = session(&driver, &exporter)
            .with_documents(Arc::new(StubDocuments(Some(
                "Grace Hopper\ngrace@navy.mil | 555-010-0199\nNavy, Rear Admiral, 1943-1986",
            ))))
            .run(plan)
            .await;

        let profile = report.profile.as_ref().unwrap();
        assert_eq!(profile.full_name().as_deref(), Some("Grace Hopper"));
        assert_eq!(profile.job_history.len(), 1);

        let typed = driver.typed();
        assert!(typed.contains(&("email".to_string(), "grace@navy.mil".to_string())));
        assert!(typed.contains(&("phone".to_string(), "555-010-0199".to_string())));
        assert_eq!(report.submitted(), 1);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_resume_still_applies() {
        let driver = FakeDriver::new();
        search_page(&driver);
        results_page(
            &driver,
            vec![card("c1", "Role 1", &job_url(1)), card("c2", "Role 2", &job_url(2))],
        );
        applicable_job(&driver, &job_url(1));
        applicable_job(&driver, &job_url(2));
        let exporter = temp_exporter();

        let mut plan = plan(false);
        plan.resume = Some(ResumeSource::File(PathBuf::from("missing.pdf")));
        let report = session(&driver, &exporter)
            .with_documents(Arc::new(StubDocuments(None)))
            .run(plan)
            .await;

        assert_eq!(report.profile, Some(ResumeProfile::default()));
        assert!(report.is_done());
        assert_eq!(report.submitted(), 2);
        assert!(!driver.typed().iter().any(|(id, _)| id == "email" || id == "phone"));

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_cancel_between_applications_keeps_exported_rows() {
        let driver = FakeDriver::new();
        full_board(&driver, 1);
        let exporter = temp_exporter();
        let (handle, signal) = cancel_pair();
        driver.on_visit(&job_url(2), move || handle.cancel());

        let report = session(&driver, &exporter).with_cancel(signal).run(plan(false)).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.reason(), "cancelled");
        assert_eq!(failure.detail, "cancelled while applying");
        assert_eq!(report.applications.len(), 1);
        assert_eq!(report.applications[0].outcome, ApplicationOutcome::Submitted);
        assert!(!driver.visits().contains(&job_url(3)));
        assert_eq!(driver.closed(), 1);

        assert_eq!(report.export, Some(ExportSummary::Appended { rows: 3 }));
        let stored = std::fs::read_to_string(exporter.path()).unwrap();
        assert_eq!(stored.lines().count(), 1 + 3);
        assert!(stored.contains(&job_url(3)));

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_search_submitted_with_button() {
        let driver = FakeDriver::new();
        driver
            .page(SEARCH)
            .with(FakeElement::new("keywords", "input").matching(Locator::name("keywords")))
            .with(
                FakeElement::new("search-button", "button")
                    .matching(Locator::class_name("jobs-search-box__submit-button"))
                    .on_click(FakeAction::Navigate(RESULTS.to_string())),
            );
        results_page(
            &driver,
            vec![FakeElement::new("icon-card", "a")
                .matching(Locator::css("a.base-card__full-link"))
                .attr("aria-label", "Rust Engineer")
                .attr("href", &job_url(1))],
        );
        job_page(&driver, &job_url(1), true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(false)).await;

        assert!(report.is_done(), "ended as {}", report.final_state);
        assert_eq!(driver.clicks()[0], "search-button");
        assert_eq!(driver.activations("keywords"), 0);
        assert_eq!(report.listings[0].title, "Rust Engineer");
        assert_eq!(report.listings[0].link, job_url(1));

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[tokio::test]
    async fn test_login_submitted_with_return_without_button() {
        let driver = FakeDriver::new();
        driver
            .page(LOGIN)
            .with(FakeElement::new("user", "input").matching(Locator::name("session_key")))
            .with(
                FakeElement::new("pass", "input")
                    .matching(Locator::input_type("password"))
                    .on_return(FakeAction::Navigate(FEED.to_string())),
            );
        search_page(&driver);
        results_page(&driver, vec![card("c1", "Role 1", &job_url(1))]);
        job_page(&driver, &job_url(1), true);
        let exporter = temp_exporter();

        let report = session(&driver, &exporter).run(plan(true)).await;

        assert!(report.is_done(), "ended as {}", report.final_state);
        assert_eq!(report.login_attempts, 1);
        assert_eq!(driver.activations("pass"), 1);
        assert_eq!(driver.clicks(), vec!["apply".to_string(), "submit".to_string()]);

        std::fs::remove_file(exporter.path()).unwrap();
    }

    #[test]
    fn test_plan_from_inputs() {
        let inputs = CandidateInputs {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            desired_titles: vec!["Rust Engineer".into()],
            job_site_url: "www.linkedin.com".into(),
            resume_path: Some(PathBuf::from("cv.pdf")),
            ..Default::default()
        }
        .with_credentials(Some(Credentials::new("ada@example.com", "hunter2")))
        .validate()
        .unwrap();

        let plan = RunPlan::from_inputs(&inputs, &SiteProfile::default()).unwrap();
        assert_eq!(plan.login_url.as_deref(), Some("https://www.linkedin.com/login"));
        assert_eq!(plan.search_url, "https://www.linkedin.com/jobs");
        assert_eq!(plan.criteria.location, "Remote");
        assert_eq!(plan.resume, Some(ResumeSource::File(PathBuf::from("cv.pdf"))));
        assert_eq!(plan.applicant.first_name.as_deref(), Some("Ada"));
    }
}
