// src/browser/fake.rs
//! Scripted in-memory driver for unit tests.

use super::{BrowserDriver, DriverError, ElementHandle, ElementId, Locator};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What happens when a scripted element is clicked or receives Return.
#[derive(Debug, Clone)]
pub enum FakeAction {
    Navigate(String),
    /// Lands on `success` from the `succeed_on`-th activation onwards, `failure` before.
    NavigateOnAttempt {
        succeed_on: u32,
        success: String,
        failure: String,
    },
    Timeout,
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    id: String,
    tag: String,
    text: String,
    attributes: HashMap<String, String>,
    link: Option<String>,
    locators: Vec<Locator>,
    interactable: bool,
    after_scrolls: u32,
    on_click: Option<FakeAction>,
    on_return: Option<FakeAction>,
}

impl FakeElement {
    pub fn new(id: &str, tag: &str) -> Self {
        Self {
            id: id.to_string(),
            tag: tag.to_string(),
            text: String::new(),
            attributes: HashMap::new(),
            link: None,
            locators: Vec::new(),
            interactable: true,
            after_scrolls: 0,
            on_click: None,
            on_return: None,
        }
    }

    pub fn matching(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn link(mut self, href: &str) -> Self {
        self.link = Some(href.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.interactable = false;
        self
    }

    /// Only present once the page has been scrolled `passes` times.
    pub fn after_scrolls(mut self, passes: u32) -> Self {
        self.after_scrolls = passes;
        self
    }

    pub fn on_click(mut self, action: FakeAction) -> Self {
        self.on_click = Some(action);
        self
    }

    pub fn on_return(mut self, action: FakeAction) -> Self {
        self.on_return = Some(action);
        self
    }

    fn handle(&self) -> ElementHandle {
        ElementHandle {
            id: ElementId(self.id.clone()),
            tag: self.tag.clone(),
            text: self.text.clone(),
            attributes: self.attributes.clone(),
            link: self.link.clone().or_else(|| self.attributes.get("href").cloned()),
            interactable: self.interactable,
        }
    }
}

type VisitHook = Box<dyn Fn() + Send>;

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, Vec<FakeElement>>,
    bodies: HashMap<String, String>,
    current: String,
    scrolls: u32,
    transport_down: bool,
    rejected: HashSet<Locator>,
    visit_hooks: HashMap<String, VisitHook>,
    activations: HashMap<String, u32>,
    visits: Vec<String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    closed: u32,
}

impl FakeState {
    fn check_transport(&self) -> Result<(), DriverError> {
        if self.transport_down {
            return Err(DriverError::Transport("fake browser is down".into()));
        }
        Ok(())
    }

    fn element(&self, id: &ElementId) -> Result<FakeElement, DriverError> {
        self.pages
            .get(&self.current)
            .and_then(|elements| elements.iter().find(|e| e.id == id.0))
            .cloned()
            .ok_or_else(|| DriverError::StaleElement(id.clone()))
    }

    fn go(&mut self, url: &str) -> Result<(), DriverError> {
        self.visits.push(url.to_string());
        self.current = url.to_string();
        self.scrolls = 0;
        if let Some(hook) = self.visit_hooks.get(url) {
            hook();
        }
        Ok(())
    }

    fn activate(&mut self, element: &FakeElement, action: Option<FakeAction>) -> Result<(), DriverError> {
        let count = self.activations.entry(element.id.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        match action {
            Some(FakeAction::Navigate(url)) => self.go(&url),
            Some(FakeAction::NavigateOnAttempt {
                succeed_on,
                success,
                failure,
            }) => {
                let target = if count >= succeed_on { success } else { failure };
                self.go(&target)
            }
            Some(FakeAction::Timeout) => Err(DriverError::Timeout {
                action: format!("activating {}", element.id),
                after: Duration::from_secs(5),
            }),
            None => Ok(()),
        }
    }
}

/// Cloning shares the script, so a test can keep a probe after the
/// driver has moved into a session.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakePage<'a> {
    driver: &'a FakeDriver,
    url: String,
}

impl FakePage<'_> {
    pub fn with(self, element: FakeElement) -> Self {
        self.driver
            .lock()
            .pages
            .entry(self.url.clone())
            .or_default()
            .push(element);
        self
    }

    pub fn body(self, text: &str) -> Self {
        self.driver.lock().bodies.insert(self.url.clone(), text.to_string());
        self
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn page(&self, url: &str) -> FakePage<'_> {
        self.lock().pages.entry(url.to_string()).or_default();
        FakePage {
            driver: self,
            url: url.to_string(),
        }
    }

    pub fn at(self, url: &str) -> Self {
        self.lock().current = url.to_string();
        self
    }

    pub fn set_transport_down(&self, down: bool) {
        self.lock().transport_down = down;
    }

    /// Run `hook` every time `url` is loaded.
    pub fn on_visit(&self, url: &str, hook: impl Fn() + Send + 'static) {
        self.lock().visit_hooks.insert(url.to_string(), Box::new(hook));
    }

    /// `find_elements` fails with `Unsupported` for this locator.
    pub fn reject(&self, locator: Locator) {
        self.lock().rejected.insert(locator);
    }

    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.lock().typed.clone()
    }

    pub fn activations(&self, id: &str) -> u32 {
        self.lock().activations.get(id).copied().unwrap_or(0)
    }

    pub fn closed(&self) -> u32 {
        self.lock().closed
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.check_transport()?;
        state.go(url)
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let state = self.lock();
        state.check_transport()?;
        Ok(state.current.clone())
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.lock();
        state.check_transport()?;
        if state.rejected.contains(locator) {
            return Err(DriverError::Unsupported(format!("selector engine rejected {}", locator)));
        }
        let scrolls = state.scrolls;
        Ok(state
            .pages
            .get(&state.current)
            .map(|elements| {
                elements
                    .iter()
                    .filter(|e| e.after_scrolls <= scrolls && e.locators.contains(locator))
                    .map(FakeElement::handle)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.check_transport()?;
        let scripted = state.element(&element.id)?;
        state.clicks.push(scripted.id.clone());
        let action = scripted.on_click.clone();
        state.activate(&scripted, action)
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.check_transport()?;
        let scripted = state.element(&element.id)?;
        state.typed.push((scripted.id, text.to_string()));
        Ok(())
    }

    async fn press_return(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.check_transport()?;
        let scripted = state.element(&element.id)?;
        let action = scripted.on_return.clone();
        state.activate(&scripted, action)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.check_transport()?;
        state.scrolls += 1;
        Ok(())
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        let state = self.lock();
        state.check_transport()?;
        Ok(state.bodies.get(&state.current).cloned().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.lock().closed += 1;
        Ok(())
    }
}
