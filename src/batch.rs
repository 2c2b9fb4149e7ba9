//! Sequential batch runs over a list of parcels

use std::path::Path;

use tracing::{info, warn};

use crate::catastro::{FetchMode, ParcelIdentity, ParcelRecord, ParcelScraper};
use crate::error::{FetchFailure, ScraperError};
use crate::traits::SessionLauncher;

/// Outcome of one parcel in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub identity: ParcelIdentity,
    pub outcome: Result<ParcelRecord, FetchFailure>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Fetch every identity back-to-back, one browser session each.
///
/// Runs never overlap: each one renames its own download before the next
/// starts, which the download-directory diff relies on.
pub async fn fetch_batch<L: SessionLauncher>(
    scraper: &ParcelScraper<L>,
    identities: &[ParcelIdentity],
    mode: FetchMode,
) -> Vec<BatchEntry> {
    let mut entries = Vec::with_capacity(identities.len());

    for identity in identities {
        let outcome = scraper.fetch_parcel_record(identity, mode).await;
        entries.push(BatchEntry {
            identity: identity.clone(),
            outcome,
        });
    }

    let succeeded = entries.iter().filter(|e| e.is_ok()).count();
    info!(
        "Batch finished: {} succeeded, {} failed",
        succeeded,
        entries.len() - succeeded
    );
    entries
}

/// One cadastral reference per line; blank lines are skipped. Lands are
/// numbered from 1 in file order.
pub fn parse_reference_list(
    text: &str,
    delegation: u32,
    lote: u32,
) -> Result<Vec<ParcelIdentity>, ScraperError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, reference)| ParcelIdentity::new(delegation, lote, i as u32 + 1, reference))
        .collect()
}

pub fn load_reference_list(
    path: &Path,
    delegation: u32,
    lote: u32,
) -> Result<Vec<ParcelIdentity>, ScraperError> {
    let text = std::fs::read_to_string(path)?;
    let identities = parse_reference_list(&text, delegation, lote)?;
    if identities.is_empty() {
        warn!("No cadastral references in {:?}", path);
    }
    Ok(identities)
}
