use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::config::CatastroConfig;
use crate::error::ScraperError;

/// Opaque handle of one browser tab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named XPath locator. The name only shows up in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub name: &'static str,
    pub xpath: &'static str,
}

impl Locator {
    pub const fn new(name: &'static str, xpath: &'static str) -> Self {
        Self { name, xpath }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.xpath)
    }
}

/// Document an element lookup runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameContext {
    #[default]
    Top,
    /// The document embedded by the iframe matching this locator. Only
    /// same-origin iframes are reachable.
    Frame(Locator),
}

/// Tab/frame/locator level browser operations.
///
/// Element operations fail with `ElementNotFound` when the locator matches
/// nothing at call time; they never wait. Waiting lives in [`crate::wait`].
#[async_trait]
pub trait BrowserSession: Send {
    /// Open tabs, oldest first
    async fn tabs(&mut self) -> Result<Vec<TabId>, ScraperError>;

    /// Open a new tab at `url`
    async fn open_tab(&mut self, url: &str) -> Result<TabId, ScraperError>;

    async fn close_tab(&mut self, tab: &TabId) -> Result<(), ScraperError>;

    async fn navigate(&mut self, tab: &TabId, url: &str) -> Result<(), ScraperError>;

    async fn go_back(&mut self, tab: &TabId) -> Result<(), ScraperError>;

    async fn is_present(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
    ) -> Result<bool, ScraperError>;

    /// Present and rendered (not `display: none` / `visibility: hidden`)
    async fn is_visible(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
    ) -> Result<bool, ScraperError>;

    async fn click(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
    ) -> Result<(), ScraperError>;

    async fn type_text(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
        text: &str,
    ) -> Result<(), ScraperError>;

    /// Rendered text of the element
    async fn text(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
    ) -> Result<String, ScraperError>;

    /// `value` of a form control
    async fn value(
        &mut self,
        tab: &TabId,
        frame: &FrameContext,
        locator: &Locator,
    ) -> Result<String, ScraperError>;

    /// PNG of the tab's viewport
    async fn save_screenshot(&mut self, tab: &TabId, path: &Path) -> Result<(), ScraperError>;

    /// Close the whole browser session
    async fn quit(&mut self) -> Result<(), ScraperError>;
}

/// Starts one fresh browser session per parcel run
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, config: &CatastroConfig) -> Result<Self::Session, ScraperError>;
}
