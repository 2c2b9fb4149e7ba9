//! One browser session plus the tab and frame the next action runs against

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::CatastroConfig;
use crate::error::ScraperError;
use crate::traits::{BrowserSession, FrameContext, Locator, TabId};
use crate::wait;

use super::locators;

/// Tab focus state machine.
///
/// `open` keeps tabs in the order they were first seen; `previous` is the
/// stack of tabs focus came from, so closing a tab returns to the one that
/// was focused before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabFocus {
    open: Vec<TabId>,
    focused: TabId,
    previous: Vec<TabId>,
}

impl TabFocus {
    pub fn new(first: TabId) -> Self {
        Self {
            open: vec![first.clone()],
            focused: first,
            previous: Vec::new(),
        }
    }

    pub fn focused(&self) -> &TabId {
        &self.focused
    }

    pub fn first(&self) -> &TabId {
        &self.open[0]
    }

    pub fn open_tabs(&self) -> &[TabId] {
        &self.open
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Focus `tab`, tracking it as open if it is new
    pub fn focus(&mut self, tab: TabId) {
        if !self.open.contains(&tab) {
            self.open.push(tab.clone());
        }
        if tab != self.focused {
            let from = std::mem::replace(&mut self.focused, tab);
            self.previous.push(from);
        }
    }

    pub fn can_close_focused(&self) -> bool {
        self.open.len() > 1
    }

    /// Forget the focused tab and fall back to the previously focused one
    pub fn close_focused(&mut self) -> Result<TabId, ScraperError> {
        if !self.can_close_focused() {
            return Err(ScraperError::Navigation(
                "refusing to close the last open tab".into(),
            ));
        }

        let closed = self.focused.clone();
        self.open.retain(|t| t != &closed);
        self.previous.retain(|t| t != &closed);
        self.focused = self
            .previous
            .pop()
            .unwrap_or_else(|| self.open[0].clone());

        Ok(closed)
    }

    pub fn restore_first(&mut self) -> &TabId {
        self.focused = self.open[0].clone();
        self.previous.clear();
        &self.focused
    }
}

/// Drives one borrowed session. The session stays owned by the caller, which
/// is responsible for closing it.
pub struct PageNavigator<'a, S: BrowserSession + ?Sized> {
    session: &'a mut S,
    config: &'a CatastroConfig,
    focus: TabFocus,
    frame: FrameContext,
}

impl<'a, S: BrowserSession + ?Sized> PageNavigator<'a, S> {
    /// Focus the first tab of a freshly launched session
    pub async fn attach(
        session: &'a mut S,
        config: &'a CatastroConfig,
    ) -> Result<Self, ScraperError> {
        let first = match session.tabs().await?.into_iter().next() {
            Some(tab) => tab,
            None => session.open_tab("about:blank").await?,
        };

        Ok(Self {
            session,
            config,
            focus: TabFocus::new(first),
            frame: FrameContext::Top,
        })
    }

    pub fn config(&self) -> &'a CatastroConfig {
        self.config
    }

    pub fn focus(&self) -> &TabFocus {
        &self.focus
    }

    pub fn focused_tab(&self) -> &TabId {
        self.focus.focused()
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    // ========================================
    // Navigation
    // ========================================

    pub async fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        info!("Opening {}", url);
        let tab = self.focus.focused().clone();
        self.session.navigate(&tab, url).await?;
        self.frame = FrameContext::Top;
        Ok(())
    }

    /// Click the cookie consent on the page and inside its iframe, when shown.
    /// Returns whether anything was dismissed.
    pub async fn dismiss_consent_if_present(&mut self) -> Result<bool, ScraperError> {
        let wait = self.config.consent_wait;
        let mut dismissed = self.click_if_present(&locators::CONSENT, wait).await;

        if self.is_present_within(&locators::CONSENT_FRAME, wait).await {
            self.frame = FrameContext::Frame(locators::CONSENT_FRAME);
            dismissed |= self.click_if_present(&locators::CONSENT, wait).await;
            self.frame = FrameContext::Top;
        }

        debug!("Consent dismissed: {}", dismissed);
        Ok(dismissed)
    }

    /// Type the reference into the search form and ask for its data
    pub async fn submit_parcel_query(&mut self, cadastral_ref: &str) -> Result<(), ScraperError> {
        info!("Submitting parcel query for {}", cadastral_ref);
        self.frame = FrameContext::Top;
        self.type_text(&locators::SEARCH_INPUT, cadastral_ref).await?;
        self.click(&locators::SEARCH_SUBMIT).await?;
        Ok(())
    }

    /// Open the "other viewers" page for `cadastral_ref` in a new tab and focus it
    pub async fn open_secondary_viewer(
        &mut self,
        cadastral_ref: &str,
    ) -> Result<TabId, ScraperError> {
        let url = self.config.other_viewers_url_for(cadastral_ref);
        info!("Opening secondary viewer: {}", url);

        let tab = self.session.open_tab(&url).await?;
        self.focus.focus(tab.clone());
        self.frame = FrameContext::Top;
        Ok(tab)
    }

    pub async fn tab_count(&mut self) -> Result<usize, ScraperError> {
        Ok(self.session.tabs().await?.len())
    }

    /// Wait for a tab beyond `baseline_count` to appear and focus it
    pub async fn switch_to_new_tab(
        &mut self,
        baseline_count: usize,
    ) -> Result<TabId, ScraperError> {
        let tab = wait::wait_for_new_window(
            &mut *self.session,
            baseline_count,
            self.config.new_tab_timeout,
            self.config.poll_interval,
        )
        .await?;

        self.focus.focus(tab.clone());
        self.frame = FrameContext::Top;
        Ok(tab)
    }

    pub async fn go_back(&mut self) -> Result<(), ScraperError> {
        let tab = self.focus.focused().clone();
        self.session.go_back(&tab).await?;
        self.frame = FrameContext::Top;
        Ok(())
    }

    pub async fn close_focused_tab(&mut self) -> Result<(), ScraperError> {
        if !self.focus.can_close_focused() {
            return Err(ScraperError::Navigation(
                "refusing to close the last open tab".into(),
            ));
        }

        let tab = self.focus.focused().clone();
        self.session.close_tab(&tab).await?;
        self.focus.close_focused()?;
        self.frame = FrameContext::Top;
        debug!("Closed tab {}, focus on {}", tab, self.focus.focused());
        Ok(())
    }

    pub fn restore_focus_to_first_tab(&mut self) -> &TabId {
        self.frame = FrameContext::Top;
        self.focus.restore_first()
    }

    // ========================================
    // Elements on the focused tab/frame
    // ========================================

    async fn locate(&mut self, locator: &Locator) -> Result<TabId, ScraperError> {
        let tab = self.focus.focused().clone();
        wait::wait_for_element(
            &mut *self.session,
            &tab,
            &self.frame,
            locator,
            self.config.implicit_wait,
            self.config.poll_interval,
        )
        .await?;
        Ok(tab)
    }

    pub async fn click(&mut self, locator: &Locator) -> Result<(), ScraperError> {
        let tab = self.locate(locator).await?;
        debug!("Click {}", locator.name);
        self.session.click(&tab, &self.frame, locator).await
    }

    pub async fn type_text(&mut self, locator: &Locator, text: &str) -> Result<(), ScraperError> {
        let tab = self.locate(locator).await?;
        self.session.type_text(&tab, &self.frame, locator, text).await
    }

    pub async fn text(&mut self, locator: &Locator) -> Result<String, ScraperError> {
        let tab = self.locate(locator).await?;
        self.session.text(&tab, &self.frame, locator).await
    }

    pub async fn value(&mut self, locator: &Locator) -> Result<String, ScraperError> {
        let tab = self.locate(locator).await?;
        self.session.value(&tab, &self.frame, locator).await
    }

    /// Whether `locator` shows up within `wait`
    pub async fn is_present_within(&mut self, locator: &Locator, wait: Duration) -> bool {
        let tab = self.focus.focused().clone();
        wait::wait_for_element(
            &mut *self.session,
            &tab,
            &self.frame,
            locator,
            wait,
            self.config.poll_interval,
        )
        .await
        .is_ok()
    }

    /// Click `locator` if it shows up within `wait`. A failed click is logged
    /// and reported as `false`.
    pub(crate) async fn click_if_present(&mut self, locator: &Locator, wait: Duration) -> bool {
        if !self.is_present_within(locator, wait).await {
            return false;
        }
        let tab = self.focus.focused().clone();
        match self.session.click(&tab, &self.frame, locator).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Optional click on {} failed: {}", locator.name, e);
                false
            }
        }
    }

    pub async fn wait_until_gone(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let tab = self.focus.focused().clone();
        wait::wait_for_element_gone(
            &mut *self.session,
            &tab,
            &self.frame,
            locator,
            timeout,
            self.config.poll_interval,
        )
        .await
    }

    pub async fn save_screenshot(&mut self, path: &Path) -> Result<(), ScraperError> {
        let tab = self.focus.focused().clone();
        self.session.save_screenshot(&tab, path).await
    }
}
