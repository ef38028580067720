//! Mock browser backend for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    BrowserBackend, BrowserError, BrowserResult, BrowserSession, ElementRef, Locator,
    SessionOptions,
};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Open,
    Navigate,
    Find,
    SendKeys,
    Click,
    Text,
    IsEnabled,
    IsDisplayed,
    Close,
}

/// What an injected fault does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// Return a `BrowserError::Command`
    Error,
    /// Panic inside the call
    Panic,
}

/// Recorded interaction with the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open,
    Navigate(String),
    Find(Locator),
    SendKeys { target: Locator, text: String },
    Click(Locator),
    Text(Locator),
    IsEnabled(Locator),
    IsDisplayed(Locator),
    Close,
}

/// Element on the mock page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    pub text: String,
    pub enabled: bool,
    pub displayed: bool,
}

impl MockElement {
    /// Visible, enabled element without text
    pub fn new() -> Self {
        Self {
            text: String::new(),
            enabled: true,
            displayed: true,
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }
}

impl Default for MockElement {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct MockState {
    elements: HashMap<Locator, MockElement>,
    reveals: HashMap<Locator, Vec<(Locator, MockElement)>>,
    faults: HashMap<MockOp, MockFault>,
    calls: Vec<MockCall>,
    opened: usize,
    closed: usize,
}

impl MockState {
    fn check_fault(&self, op: MockOp) -> BrowserResult<()> {
        match self.faults.get(&op) {
            None => Ok(()),
            Some(MockFault::Error) => Err(BrowserError::Command {
                error: "unknown error".into(),
                message: format!("injected failure on {:?}", op),
            }),
            Some(MockFault::Panic) => panic!("injected panic on {:?}", op),
        }
    }

    fn resolve(&self, element: &ElementRef) -> BrowserResult<Locator> {
        self.elements
            .keys()
            .find(|locator| locator.to_string() == element.as_str())
            .cloned()
            .ok_or_else(|| BrowserError::NoSuchElement(format!("stale element {}", element)))
    }

    fn element(&self, locator: &Locator) -> BrowserResult<&MockElement> {
        self.elements
            .get(locator)
            .ok_or_else(|| BrowserError::NoSuchElement(locator.to_string()))
    }
}

/// Scripted browser for unit and integration testing.
///
/// The page is a static set of elements, shared by every session the mock
/// hands out. Each call is logged, and any operation can be set up to fail
/// or panic.
#[derive(Clone, Default)]
pub struct MockBrowser {
    state: Arc<Mutex<MockState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder form of [`MockBrowser::set_element`]
    pub fn with_element(self, locator: Locator, element: MockElement) -> Self {
        self.set_element(locator, element);
        self
    }

    /// Put an element on the page, replacing any previous one
    pub fn set_element(&self, locator: Locator, element: MockElement) {
        self.lock().elements.insert(locator, element);
    }

    /// Take an element off the page
    pub fn remove_element(&self, locator: &Locator) {
        self.lock().elements.remove(locator);
    }

    /// Make `revealed` appear once `trigger` has been clicked
    pub fn reveal_on_click(&self, trigger: Locator, revealed: Locator, element: MockElement) {
        self.lock()
            .reveals
            .entry(trigger)
            .or_default()
            .push((revealed, element));
    }

    /// Make an operation return an error
    pub fn fail_on(&self, op: MockOp) {
        self.lock().faults.insert(op, MockFault::Error);
    }

    /// Make an operation panic
    pub fn panic_on(&self, op: MockOp) {
        self.lock().faults.insert(op, MockFault::Panic);
    }

    /// Every call seen so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Whether the element behind `locator` was clicked
    pub fn was_clicked(&self, locator: &Locator) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|call| matches!(call, MockCall::Click(l) if l == locator))
    }

    /// Text typed into the element behind `locator`, concatenated
    pub fn typed_into(&self, locator: &Locator) -> Option<String> {
        let state = self.lock();
        let typed: Vec<&str> = state
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::SendKeys { target, text } if target == locator => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if typed.is_empty() {
            None
        } else {
            Some(typed.concat())
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }
}

#[async_trait]
impl BrowserBackend for MockBrowser {
    async fn open_session(
        &self,
        _options: &SessionOptions,
    ) -> BrowserResult<Arc<dyn BrowserSession>> {
        let mut state = self.lock();
        state.calls.push(MockCall::Open);

        if let Some(fault) = state.faults.get(&MockOp::Open).copied() {
            drop(state);
            if fault == MockFault::Panic {
                panic!("injected panic on {:?}", MockOp::Open);
            }
            return Err(BrowserError::SessionUnavailable("injected failure on Open".into()));
        }

        state.opened += 1;
        Ok(Arc::new(MockSession {
            browser: self.clone(),
        }))
    }
}

/// Session handed out by [`MockBrowser`]
struct MockSession {
    browser: MockBrowser,
}

impl MockSession {
    /// Log `call`, then apply any fault configured for `op`.
    ///
    /// The state lock is released before a panic fault fires.
    fn enter(&self, op: MockOp, call: MockCall) -> BrowserResult<MutexGuard<'_, MockState>> {
        let mut state = self.browser.lock();
        state.calls.push(call);

        if state.faults.get(&op) == Some(&MockFault::Panic) {
            drop(state);
            panic!("injected panic on {:?}", op);
        }
        state.check_fault(op)?;
        Ok(state)
    }

    fn locator_of(&self, element: &ElementRef) -> BrowserResult<Locator> {
        self.browser.lock().resolve(element)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let _state = self.enter(MockOp::Navigate, MockCall::Navigate(url.to_string()))?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<ElementRef>> {
        let state = self.enter(MockOp::Find, MockCall::Find(locator.clone()))?;
        Ok(state
            .elements
            .contains_key(locator)
            .then(|| ElementRef::new(locator.to_string())))
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        let target = self.locator_of(element)?;
        let state = self.enter(
            MockOp::SendKeys,
            MockCall::SendKeys {
                target: target.clone(),
                text: text.to_string(),
            },
        )?;
        state.element(&target)?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> BrowserResult<()> {
        let target = self.locator_of(element)?;
        let mut state = self.enter(MockOp::Click, MockCall::Click(target.clone()))?;

        if !state.element(&target)?.enabled {
            return Err(BrowserError::Command {
                error: "element not interactable".into(),
                message: format!("{} is disabled", target),
            });
        }

        if let Some(revealed) = state.reveals.remove(&target) {
            state.elements.extend(revealed);
        }
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> BrowserResult<String> {
        let target = self.locator_of(element)?;
        let state = self.enter(MockOp::Text, MockCall::Text(target.clone()))?;
        Ok(state.element(&target)?.text.clone())
    }

    async fn is_enabled(&self, element: &ElementRef) -> BrowserResult<bool> {
        let target = self.locator_of(element)?;
        let state = self.enter(MockOp::IsEnabled, MockCall::IsEnabled(target.clone()))?;
        Ok(state.element(&target)?.enabled)
    }

    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool> {
        let target = self.locator_of(element)?;
        let state = self.enter(MockOp::IsDisplayed, MockCall::IsDisplayed(target.clone()))?;
        Ok(state.element(&target)?.displayed)
    }

    async fn close(&self) -> BrowserResult<()> {
        let mut state = self.browser.lock();
        state.calls.push(MockCall::Close);
        state.closed += 1;
        state.check_fault(MockOp::Close)
    }
}
