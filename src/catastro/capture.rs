//! Artifact capture: aerial screenshot, KML boundary download, map coordinates

use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::ScraperError;
use crate::traits::BrowserSession;
use crate::wait::{self, DirSnapshot};

use super::locators;
use super::navigator::PageNavigator;

/// Zoom-out clicks after the first one; each is followed by a render wait
const EXTRA_ZOOM_OUT_STEPS: usize = 2;

/// Expand the cartography, switch to the aerial layer, zoom out and save
/// `<ref>.png` into the download directory. Leaves the navigator back on the
/// parcel data page.
pub async fn capture_screenshot<S: BrowserSession>(
    nav: &mut PageNavigator<'_, S>,
    cadastral_ref: &str,
) -> Result<PathBuf, ScraperError> {
    info!("Capturing aerial screenshot...");
    let render_timeout = nav.config().render_timeout;

    nav.click(&locators::CARTOGRAPHY_PANEL).await?;
    nav.click(&locators::SHOW_CARTOGRAPHY).await?;
    nav.click(&locators::LAYERS_BUTTON).await?;
    nav.click(&locators::AERIAL_LAYER).await?;
    nav.wait_until_gone(&locators::CANVAS_LOADING, render_timeout).await?;

    nav.click(&locators::ZOOM_OUT).await?;
    nav.wait_until_gone(&locators::CANVAS_LOADING, render_timeout).await?;
    for step in 0..EXTRA_ZOOM_OUT_STEPS {
        debug!("Extra zoom out {}/{}", step + 1, EXTRA_ZOOM_OUT_STEPS);
        nav.click(&locators::ZOOM_OUT).await?;
        nav.wait_until_gone(&locators::CANVAS_LOADING, render_timeout).await?;
    }

    // tiles can still be pending right after the last zoom settles
    nav.wait_until_gone(&locators::CANVAS_LOADING, render_timeout).await?;

    let path = nav.config().download_dir.join(format!("{}.png", cadastral_ref));
    nav.save_screenshot(&path).await?;
    info!("Screenshot saved: {:?}", path);

    nav.go_back().await?;
    Ok(path)
}

/// Export the parcel boundary from the secondary viewer and rename the
/// download to `<ref>.<ext>`. Focus ends on the first tab.
pub async fn capture_boundary_file<S: BrowserSession>(
    nav: &mut PageNavigator<'_, S>,
    cadastral_ref: &str,
) -> Result<PathBuf, ScraperError> {
    info!("Capturing boundary file...");
    let download_dir = nav.config().download_dir.clone();
    let baseline = DirSnapshot::capture(&download_dir)?;

    nav.open_secondary_viewer(cadastral_ref).await?;
    nav.click(&locators::EXPORT_KML).await?;

    // the baseline was taken after the screenshot, so only the export is new
    let downloads = wait::wait_for_new_completed_file(
        &download_dir,
        &baseline,
        nav.config().download_timeout,
        nav.config().poll_interval,
    )
    .await?;

    let path = rename_most_recent(&downloads, cadastral_ref)?;

    nav.close_focused_tab().await?;
    nav.restore_focus_to_first_tab();
    Ok(path)
}

/// Read the coordinates Google Maps shows for the parcel. Opens the secondary
/// viewer, follows its maps link into a third tab and closes both afterwards.
pub async fn resolve_coordinates<S: BrowserSession>(
    nav: &mut PageNavigator<'_, S>,
    cadastral_ref: &str,
) -> Result<String, ScraperError> {
    info!("Resolving coordinates...");
    nav.open_secondary_viewer(cadastral_ref).await?;

    let baseline = nav.tab_count().await?;
    nav.click(&locators::OPEN_GOOGLE_MAPS).await?;
    nav.switch_to_new_tab(baseline).await?;

    let consent_wait = nav.config().consent_wait;
    nav.click_if_present(&locators::MAPS_CONSENT, consent_wait).await;

    let coordinates = nav.value(&locators::MAPS_SEARCH_BOX).await?.trim().to_string();
    if coordinates.is_empty() {
        return Err(ScraperError::Extraction("maps search box is empty".into()));
    }
    info!("Coordinates: {}", coordinates);

    // maps tab, then the viewer it was opened from
    nav.close_focused_tab().await?;
    nav.close_focused_tab().await?;
    nav.restore_focus_to_first_tab();
    Ok(coordinates)
}

/// The most recently written regular file among `files`. Equal timestamps go
/// to the path that sorts last, so the pick never depends on listing order.
pub fn most_recent_file(files: &[PathBuf]) -> Result<PathBuf, ScraperError> {
    let mut newest: Option<(SystemTime, &PathBuf)> = None;

    for path in files {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            continue;
        }
        let stamp = metadata.modified()?;
        if newest.map_or(true, |best| (stamp, path) > best) {
            newest = Some((stamp, path));
        }
    }

    newest
        .map(|(_, path)| path.clone())
        .ok_or_else(|| ScraperError::Download(format!("no completed file among {:?}", files)))
}

/// Rename the most recent of the freshly downloaded `files` to
/// `<stem>.<its extension>` next to it.
///
/// Assumes nothing else downloads into the same directory concurrently.
pub fn rename_most_recent(files: &[PathBuf], stem: &str) -> Result<PathBuf, ScraperError> {
    let original = most_recent_file(files)?;
    if wait::is_partial_download(&original) {
        warn!("Most recent file is still downloading: {:?}", original);
    }

    let new_name = match original.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem.to_string(),
    };
    let new_path = original.with_file_name(new_name);

    std::fs::rename(&original, &new_path)?;
    info!("Renamed download: {:?} -> {:?}", original, new_path);
    Ok(new_path)
}
