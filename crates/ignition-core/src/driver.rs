//! Console automation state machine
//!
//! One run opens a fresh browser session, logs in, reads the server status
//! and presses start when the server is offline. Every failure is folded into
//! an [`AutomationOutcome`]; nothing escapes [`AutomationDriver::run`].

use async_trait::async_trait;
use ignition_browser_api::{
    BrowserBackend, BrowserError, BrowserResult, BrowserSession, ElementRef, Locator,
    SessionOptions,
};
use ignition_config::{AutomationTiming, Config, SiteConfig};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::AutomationOutcome;

/// Something that can attempt a server start
#[async_trait]
pub trait Automation: Send + Sync {
    async fn run(&self) -> AutomationOutcome;
}

/// What the driver needs from the configuration
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub site: SiteConfig,
    pub timing: AutomationTiming,
    pub session: SessionOptions,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            site: config.site.clone(),
            timing: config.timing,
            session: config.browser.session.clone(),
        }
    }
}

/// Session opened by the current run, kept outside the run's task so it can
/// be closed no matter how the task ends
type SessionSlot = Arc<Mutex<Option<Arc<dyn BrowserSession>>>>;

#[derive(Debug, Error)]
enum StepError {
    #[error("{0} did not become ready in time")]
    WaitTimedOut(String),

    #[error("{0} not found")]
    Missing(String),

    #[error("{step}: {source}")]
    Browser {
        step: &'static str,
        #[source]
        source: BrowserError,
    },
}

fn step(step: &'static str) -> impl FnOnce(BrowserError) -> StepError {
    move |source| StepError::Browser { step, source }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// In the DOM
    Present,
    /// In the DOM, rendered and enabled
    Interactable,
}

/// Drives the web console through a [`BrowserBackend`]
#[derive(Clone)]
pub struct AutomationDriver {
    backend: Arc<dyn BrowserBackend>,
    settings: Arc<DriverSettings>,
}

impl AutomationDriver {
    pub fn new(backend: Arc<dyn BrowserBackend>, settings: DriverSettings) -> Self {
        Self {
            backend,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Run one full attempt.
    ///
    /// The steps run on their own task. A panic in there, or the run
    /// exceeding `run_timeout`, still ends in an outcome, and the session is
    /// closed exactly once if one was opened.
    pub async fn run(&self) -> AutomationOutcome {
        let slot: SessionSlot = Arc::default();
        let run_timeout = self.settings.timing.run_timeout;

        let mut task = tokio::spawn({
            let backend = self.backend.clone();
            let settings = self.settings.clone();
            let slot = slot.clone();
            async move { drive(backend.as_ref(), &settings, &slot).await }
        });

        let joined = tokio::time::timeout(run_timeout, &mut task).await;
        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.is_panic() => {
                error!("Automation task panicked");
                AutomationOutcome::unknown_error("automation crashed")
            }
            Ok(Err(e)) => {
                error!(error = %e, "Automation task failed");
                AutomationOutcome::unknown_error(e)
            }
            Err(_) => {
                warn!(timeout_secs = run_timeout.as_secs(), "Automation run exceeded its deadline");
                task.abort();
                let _ = task.await;
                AutomationOutcome::timeout()
            }
        };

        teardown(&slot).await;

        info!(
            category = %outcome.category,
            success = outcome.success,
            "Automation run finished"
        );
        outcome
    }
}

#[async_trait]
impl Automation for AutomationDriver {
    async fn run(&self) -> AutomationOutcome {
        AutomationDriver::run(self).await
    }
}

fn lock_slot(slot: &SessionSlot) -> std::sync::MutexGuard<'_, Option<Arc<dyn BrowserSession>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn teardown(slot: &SessionSlot) {
    let session = lock_slot(slot).take();
    let Some(session) = session else {
        debug!("No browser session to close");
        return;
    };

    match session.close().await {
        Ok(()) => debug!("Browser session closed"),
        Err(e) => warn!(error = %e, "Failed to close browser session"),
    }
}

async fn drive(
    backend: &dyn BrowserBackend,
    settings: &DriverSettings,
    slot: &SessionSlot,
) -> AutomationOutcome {
    let session = match backend.open_session(&settings.session).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Could not open browser session");
            return AutomationOutcome::unknown_error(e);
        }
    };
    *lock_slot(slot) = Some(session.clone());

    match steps(session.as_ref(), settings).await {
        Ok(outcome) => outcome,
        Err(StepError::WaitTimedOut(what)) => {
            warn!(element = %what, "Console did not become ready");
            AutomationOutcome::timeout()
        }
        Err(StepError::Browser {
            step,
            source: BrowserError::Timeout(detail),
        }) => {
            warn!(step, detail = %detail, "Browser timed out");
            AutomationOutcome::timeout()
        }
        Err(e) => {
            error!(error = %e, "Automation step failed");
            AutomationOutcome::unknown_error(e)
        }
    }
}

async fn steps(
    session: &dyn BrowserSession,
    settings: &DriverSettings,
) -> Result<AutomationOutcome, StepError> {
    let site = &settings.site;
    let timing = &settings.timing;
    let locators = &site.locators;

    info!(url = %site.url, "Opening server console");
    session.navigate(&site.url).await.map_err(step("navigate"))?;

    let login_field =
        wait_for(session, &locators.login_field, Readiness::Interactable, timing).await?;
    session
        .send_keys(&login_field, &site.credentials.username)
        .await
        .map_err(step("enter username"))?;

    let password_field = require(session, &locators.password_field).await?;
    session
        .send_keys(&password_field, &site.credentials.password)
        .await
        .map_err(step("enter password"))?;

    let login_button = require(session, &locators.login_button).await?;
    session.click(&login_button).await.map_err(step("submit login"))?;

    sleep(timing.login_settle).await;

    if let Some(login_error) = session
        .find(&locators.login_error)
        .await
        .map_err(step("check login"))?
        && session
            .is_displayed(&login_error)
            .await
            .map_err(step("check login"))?
    {
        warn!(account = %site.credentials.username, "Console rejected the login");
        return Ok(AutomationOutcome::login_failed());
    }

    let start_button = wait_for(session, &locators.start_button, Readiness::Present, timing).await?;
    let status_label = require(session, &locators.status_label).await?;
    let status = session
        .text(&status_label)
        .await
        .map_err(step("read status"))?
        .to_lowercase();
    debug!(status = %status, "Server status");

    if status.contains("online") {
        return Ok(AutomationOutcome::already_online());
    }

    if status.contains("offline")
        && session
            .is_enabled(&start_button)
            .await
            .map_err(step("check start button"))?
    {
        info!("Pressing start");
        session.click(&start_button).await.map_err(step("press start"))?;
        sleep(timing.click_settle).await;
        confirm(session, &locators.confirm_button).await;
        return Ok(AutomationOutcome::starting());
    }

    Ok(AutomationOutcome::busy())
}

/// Click the confirmation dialog if one showed up. Failures are only logged.
async fn confirm(session: &dyn BrowserSession, locator: &Locator) {
    match click_if_visible(session, locator).await {
        Ok(true) => debug!("Confirmation clicked"),
        Ok(false) => debug!("No confirmation shown"),
        Err(e) => warn!(error = %e, "Could not handle confirmation"),
    }
}

async fn click_if_visible(session: &dyn BrowserSession, locator: &Locator) -> BrowserResult<bool> {
    let Some(button) = session.find(locator).await? else {
        return Ok(false);
    };
    if !session.is_displayed(&button).await? {
        return Ok(false);
    }
    session.click(&button).await?;
    Ok(true)
}

/// Look an element up once
async fn require(session: &dyn BrowserSession, locator: &Locator) -> Result<ElementRef, StepError> {
    session
        .find(locator)
        .await
        .map_err(step("find element"))?
        .ok_or_else(|| StepError::Missing(locator.to_string()))
}

/// Poll until the element reaches `readiness` or `wait_timeout` runs out
async fn wait_for(
    session: &dyn BrowserSession,
    locator: &Locator,
    readiness: Readiness,
    timing: &AutomationTiming,
) -> Result<ElementRef, StepError> {
    let deadline = Instant::now() + timing.wait_timeout;

    loop {
        if let Some(element) = session.find(locator).await.map_err(step("find element"))?
            && is_ready(session, &element, readiness).await?
        {
            return Ok(element);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(StepError::WaitTimedOut(locator.to_string()));
        }
        sleep(timing.poll_interval.min(deadline - now)).await;
    }
}

async fn is_ready(
    session: &dyn BrowserSession,
    element: &ElementRef,
    readiness: Readiness,
) -> Result<bool, StepError> {
    if readiness == Readiness::Present {
        return Ok(true);
    }

    let state = match session.is_displayed(element).await {
        Ok(true) => session.is_enabled(element).await,
        other => other,
    };

    match state {
        Ok(ready) => Ok(ready),
        // Replaced between lookup and check; look again next round.
        Err(BrowserError::NoSuchElement(_)) => Ok(false),
        Err(e) => Err(step("check element")(e)),
    }
}
