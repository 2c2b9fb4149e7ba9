//! Scripted in-memory browser for unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::catastro::locators;
use crate::config::CatastroConfig;
use crate::error::ScraperError;
use crate::traits::{BrowserSession, FrameContext, Locator, SessionLauncher, TabId};

pub(crate) type SharedState = Arc<Mutex<MockState>>;

#[derive(Debug, Clone)]
pub(crate) enum ClickEffect {
    OpenTab(String),
    /// Writes `<name>.crdownload`, then renames it to `name` after `delay`
    Download {
        dir: PathBuf,
        name: String,
        delay: Duration,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct MockTab {
    pub id: TabId,
    pub url: String,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub tabs: Vec<MockTab>,
    next_tab: usize,
    pub missing: HashSet<&'static str>,
    /// Present elements whose click the browser rejects
    pub unclickable: HashSet<&'static str>,
    pub texts: HashMap<&'static str, String>,
    pub values: HashMap<&'static str, String>,
    /// How many more visibility checks report the element as visible
    pub visible_polls: HashMap<&'static str, usize>,
    pub click_effects: HashMap<&'static str, ClickEffect>,
    pub clicks: Vec<&'static str>,
    pub typed: Vec<(&'static str, String)>,
    pub screenshots: Vec<PathBuf>,
    pub backs: usize,
    pub launches: usize,
    pub quits: usize,
    pub fail_launch: bool,
    /// Every element probe fails as if the websocket had dropped
    pub disconnected: bool,
}

impl MockState {
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::default()))
    }

    /// A portal that answers every step for a parcel of the given class
    pub fn portal(download_dir: &Path, class: &str) -> SharedState {
        let state = Self::shared();
        {
            let mut s = state.lock().unwrap();
            s.texts.insert(
                locators::LOCATION.xpath,
                "Polígono 12 Parcela 34\nLOS LLANOS. 44001 TERUEL (TERUEL)".to_string(),
            );
            s.texts.insert(locators::CLASS.xpath, class.to_string());
            s.texts.insert(locators::PRIMARY_USE.xpath, "Agrario".to_string());
            s.texts.insert(locators::CULTIVATION.xpath, "C- Labor o Labradío secano".to_string());
            s.values.insert(locators::MAPS_SEARCH_BOX.xpath, "40.3456, -1.1069".to_string());
            s.visible_polls.insert(locators::CANVAS_LOADING.xpath, 2);
            s.click_effects.insert(
                locators::EXPORT_KML.xpath,
                ClickEffect::Download {
                    dir: download_dir.to_path_buf(),
                    name: "parcela.kml".to_string(),
                    delay: Duration::from_millis(30),
                },
            );
            s.click_effects.insert(
                locators::OPEN_GOOGLE_MAPS.xpath,
                ClickEffect::OpenTab("https://maps.test/search".to_string()),
            );
        }
        state
    }

    fn push_tab(&mut self, url: &str) -> TabId {
        self.next_tab += 1;
        let id = TabId(format!("tab-{}", self.next_tab));
        self.tabs.push(MockTab {
            id: id.clone(),
            url: url.to_string(),
        });
        id
    }

    fn probe(&self) -> Result<(), ScraperError> {
        if self.disconnected {
            return Err(ScraperError::Session("websocket closed".into()));
        }
        Ok(())
    }

    fn lookup(&self, locator: &Locator) -> Result<(), ScraperError> {
        if self.missing.contains(locator.xpath) {
            return Err(ScraperError::ElementNotFound(locator.to_string()));
        }
        Ok(())
    }
}

pub(crate) struct MockSession {
    state: SharedState,
}

impl MockSession {
    /// Opens the initial blank tab, like a freshly launched browser
    pub fn new(state: SharedState) -> Self {
        state.lock().unwrap().push_tab("about:blank");
        Self { state }
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn tabs(&mut self) -> Result<Vec<TabId>, ScraperError> {
        Ok(self.state.lock().unwrap().tabs.iter().map(|t| t.id.clone()).collect())
    }

    async fn open_tab(&mut self, url: &str) -> Result<TabId, ScraperError> {
        Ok(self.state.lock().unwrap().push_tab(url))
    }

    async fn close_tab(&mut self, tab: &TabId) -> Result<(), ScraperError> {
        let mut s = self.state.lock().unwrap();
        let before = s.tabs.len();
        s.tabs.retain(|t| &t.id != tab);
        if s.tabs.len() == before {
            return Err(ScraperError::Session(format!("unknown tab {}", tab)));
        }
        Ok(())
    }

    async fn navigate(&mut self, tab: &TabId, url: &str) -> Result<(), ScraperError> {
        let mut s = self.state.lock().unwrap();
        let entry = s
            .tabs
            .iter_mut()
            .find(|t| &t.id == tab)
            .ok_or_else(|| ScraperError::Session(format!("unknown tab {}", tab)))?;
        entry.url = url.to_string();
        Ok(())
    }

    async fn go_back(&mut self, _tab: &TabId) -> Result<(), ScraperError> {
        self.state.lock().unwrap().backs += 1;
        Ok(())
    }

    async fn is_present(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
    ) -> Result<bool, ScraperError> {
        let s = self.state.lock().unwrap();
        s.probe()?;
        Ok(!s.missing.contains(locator.xpath))
    }

    async fn is_visible(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
    ) -> Result<bool, ScraperError> {
        let mut s = self.state.lock().unwrap();
        s.probe()?;
        if s.missing.contains(locator.xpath) {
            return Ok(false);
        }
        match s.visible_polls.get_mut(locator.xpath) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn click(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
    ) -> Result<(), ScraperError> {
        let mut s = self.state.lock().unwrap();
        s.lookup(locator)?;
        if s.unclickable.contains(locator.xpath) {
            return Err(ScraperError::Session(format!("{} is not clickable", locator)));
        }
        s.clicks.push(locator.xpath);

        match s.click_effects.get(locator.xpath).cloned() {
            Some(ClickEffect::OpenTab(url)) => {
                s.push_tab(&url);
            }
            Some(ClickEffect::Download { dir, name, delay }) => {
                let partial = dir.join(format!("{}.crdownload", name));
                std::fs::write(&partial, b"<kml/>")?;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = std::fs::rename(&partial, dir.join(name));
                });
            }
            None => {}
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
        text: &str,
    ) -> Result<(), ScraperError> {
        let mut s = self.state.lock().unwrap();
        s.lookup(locator)?;
        s.typed.push((locator.xpath, text.to_string()));
        Ok(())
    }

    async fn text(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
    ) -> Result<String, ScraperError> {
        let s = self.state.lock().unwrap();
        s.lookup(locator)?;
        s.texts
            .get(locator.xpath)
            .cloned()
            .ok_or_else(|| ScraperError::ElementNotFound(locator.to_string()))
    }

    async fn value(
        &mut self,
        _tab: &TabId,
        _frame: &FrameContext,
        locator: &Locator,
    ) -> Result<String, ScraperError> {
        let s = self.state.lock().unwrap();
        s.lookup(locator)?;
        s.values
            .get(locator.xpath)
            .cloned()
            .ok_or_else(|| ScraperError::ElementNotFound(locator.to_string()))
    }

    async fn save_screenshot(&mut self, _tab: &TabId, path: &Path) -> Result<(), ScraperError> {
        std::fs::write(path, b"\x89PNG\r\n\x1a\n")?;
        self.state.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), ScraperError> {
        let mut s = self.state.lock().unwrap();
        s.quits += 1;
        s.tabs.clear();
        Ok(())
    }
}

pub(crate) struct MockLauncher {
    pub state: SharedState,
}

impl MockLauncher {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self, _config: &CatastroConfig) -> Result<MockSession, ScraperError> {
        {
            let mut s = self.state.lock().unwrap();
            s.launches += 1;
            if s.fail_launch {
                return Err(ScraperError::BrowserInit("chrome not found".into()));
            }
        }
        Ok(MockSession::new(self.state.clone()))
    }
}

/// Timeouts short enough for tests
pub(crate) fn fast_config(download_dir: &Path) -> CatastroConfig {
    CatastroConfig::new(download_dir)
        .with_implicit_wait(Duration::from_millis(40))
        .with_consent_wait(Duration::from_millis(10))
        .with_new_tab_timeout(Duration::from_millis(200))
        .with_render_timeout(Duration::from_millis(200))
        .with_download_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(5))
}
