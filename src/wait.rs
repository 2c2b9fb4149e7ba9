//! Blocking wait conditions used between page actions.
//!
//! Everything here polls: the DOM conditions ask the session on every tick,
//! download completion diffs the download directory against a snapshot.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::traits::{BrowserSession, FrameContext, Locator, TabId};

/// Suffixes of files Chrome is still writing
pub const PARTIAL_DOWNLOAD_SUFFIXES: &[&str] = &[".crdownload", ".tmp"];

/// Poll until `locator` is present.
///
/// Lookup errors count as "not yet" while the timeout runs. If the last poll
/// still failed, that error is returned instead of `ElementNotFound`, so a
/// dead browser is not reported as a missing element.
pub async fn wait_for_element<S>(
    session: &mut S,
    tab: &TabId,
    frame: &FrameContext,
    locator: &Locator,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), ScraperError>
where
    S: BrowserSession + ?Sized,
{
    let start = Instant::now();
    let mut last_error = None;

    loop {
        match session.is_present(tab, frame, locator).await {
            Ok(true) => return Ok(()),
            Ok(false) => last_error = None,
            Err(e) => {
                debug!("Presence check for {} failed: {}", locator.name, e);
                last_error = Some(e);
            }
        }

        if start.elapsed() >= timeout {
            return Err(last_error.unwrap_or_else(|| {
                ScraperError::ElementNotFound(format!(
                    "{} not present after {:?}",
                    locator, timeout
                ))
            }));
        }

        sleep(poll_interval).await;
    }
}

/// Poll until `locator` is absent from the DOM or no longer rendered.
/// Lookup errors are handled as in [`wait_for_element`].
pub async fn wait_for_element_gone<S>(
    session: &mut S,
    tab: &TabId,
    frame: &FrameContext,
    locator: &Locator,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), ScraperError>
where
    S: BrowserSession + ?Sized,
{
    let start = Instant::now();
    let mut last_error = None;

    loop {
        match session.is_visible(tab, frame, locator).await {
            Ok(false) => {
                debug!("{} gone after {:?}", locator.name, start.elapsed());
                return Ok(());
            }
            Ok(true) => last_error = None,
            Err(e) => {
                debug!("Visibility check for {} failed: {}", locator.name, e);
                last_error = Some(e);
            }
        }

        if start.elapsed() >= timeout {
            return Err(last_error.unwrap_or_else(|| {
                ScraperError::Timeout(format!(
                    "{} still visible after {:?}",
                    locator.name, timeout
                ))
            }));
        }

        sleep(poll_interval).await;
    }
}

/// Wait until more than `baseline_count` tabs are open and return the newest
pub async fn wait_for_new_window<S>(
    session: &mut S,
    baseline_count: usize,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TabId, ScraperError>
where
    S: BrowserSession + ?Sized,
{
    let start = Instant::now();

    loop {
        let tabs = session.tabs().await?;
        if tabs.len() > baseline_count {
            if let Some(newest) = tabs.last() {
                info!("New tab detected: {} ({} open)", newest, tabs.len());
                return Ok(newest.clone());
            }
        }

        if start.elapsed() >= timeout {
            return Err(ScraperError::Timeout(format!(
                "no new tab beyond {} within {:?}",
                baseline_count, timeout
            )));
        }

        sleep(poll_interval).await;
    }
}

/// File names present in a directory at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot {
    names: HashSet<OsString>,
}

impl DirSnapshot {
    /// A missing directory is an empty snapshot
    pub fn capture(dir: &Path) -> Result<Self, ScraperError> {
        if !dir.exists() {
            return Ok(Self::default());
        }

        let names = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();

        Ok(Self { names })
    }

    pub fn contains(&self, name: &OsString) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn is_partial_download(path: &Path) -> bool {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    PARTIAL_DOWNLOAD_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

/// Completed files in `dir` that are not in `baseline`
pub fn completed_new_files(
    dir: &Path,
    baseline: &DirSnapshot,
) -> Result<Vec<PathBuf>, ScraperError> {
    let current = DirSnapshot::capture(dir)?;
    let mut files: Vec<PathBuf> = current
        .names
        .into_iter()
        .filter(|name| !baseline.contains(name))
        .map(|name| dir.join(name))
        .filter(|path| !is_partial_download(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Wait for at least one new, fully written file in `dir`
pub async fn wait_for_new_completed_file(
    dir: &Path,
    baseline: &DirSnapshot,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<PathBuf>, ScraperError> {
    let start = Instant::now();

    loop {
        let files = completed_new_files(dir, baseline)?;
        if !files.is_empty() {
            info!("Download completed: {:?}", files);
            return Ok(files);
        }

        if start.elapsed() >= timeout {
            return Err(ScraperError::Timeout(format!(
                "no new file downloaded into {:?} within {:?}",
                dir, timeout
            )));
        }

        sleep(poll_interval).await;
    }
}
