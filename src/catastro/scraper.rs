//! Catastro parcel scraper: one browser session per parcel, torn down on
//! every exit path.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::chromium::ChromiumLauncher;
use crate::config::CatastroConfig;
use crate::error::{FetchFailure, ScraperError};
use crate::traits::{BrowserSession, SessionLauncher};

use super::capture;
use super::extractor;
use super::navigator::PageNavigator;
use super::types::{ArtifactPaths, FetchMode, ParcelIdentity, ParcelRecord, Step};

pub struct ParcelScraper<L: SessionLauncher> {
    config: CatastroConfig,
    launcher: L,
    /// Sessions left open because `keep_session_open` is set
    retained: Mutex<Vec<L::Session>>,
}

impl ParcelScraper<ChromiumLauncher> {
    /// Scraper backed by a local Chrome/Chromium
    pub fn chromium(config: CatastroConfig) -> Self {
        Self::new(config, ChromiumLauncher)
    }
}

impl<L: SessionLauncher> ParcelScraper<L> {
    pub fn new(config: CatastroConfig, launcher: L) -> Self {
        Self {
            config,
            launcher,
            retained: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CatastroConfig {
        &self.config
    }

    /// Fetch fields and artifacts of one parcel.
    ///
    /// Every failure comes back as a [`FetchFailure`] tagged with the step
    /// that failed; nothing panics out to the caller's batch.
    pub async fn fetch_parcel_record(
        &self,
        identity: &ParcelIdentity,
        mode: FetchMode,
    ) -> Result<ParcelRecord, FetchFailure> {
        let span = info_span!(
            "parcel",
            delegation = identity.delegation,
            lote = identity.lote,
            land = identity.land,
            cadastral_ref = %identity.cadastral_ref
        );

        self.fetch_in_session(identity, mode).instrument(span).await
    }

    async fn fetch_in_session(
        &self,
        identity: &ParcelIdentity,
        mode: FetchMode,
    ) -> Result<ParcelRecord, FetchFailure> {
        info!("Fetching parcel {} ({:?})", identity, mode);

        let mut session = self
            .launcher
            .launch(&self.config)
            .await
            .map_err(at(identity, Step::LaunchSession))?;

        let result = self.run(&mut session, identity, mode).await;

        match &result {
            Ok(record) => info!(
                "Fetched parcel {}: screenshot={:?}, boundary={:?}, coordinates={:?}",
                identity,
                record.artifacts.screenshot,
                record.artifacts.boundary_file,
                record.coordinates
            ),
            Err(failure) => error!("Failed to fetch parcel: {}", failure),
        }

        self.teardown(session).await;
        result
    }

    async fn run(
        &self,
        session: &mut L::Session,
        identity: &ParcelIdentity,
        mode: FetchMode,
    ) -> Result<ParcelRecord, FetchFailure> {
        let cadastral_ref = identity.cadastral_ref.as_str();

        let mut nav = PageNavigator::attach(session, &self.config)
            .await
            .map_err(at(identity, Step::LaunchSession))?;

        nav.open(&self.config.search_url)
            .await
            .map_err(at(identity, Step::LandSearchPage))?;

        nav.dismiss_consent_if_present()
            .await
            .map_err(at(identity, Step::DismissConsent))?;

        nav.submit_parcel_query(cadastral_ref)
            .await
            .map_err(at(identity, Step::SubmitParcelQuery))?;

        let fields = extractor::extract_fields(&mut nav)
            .await
            .map_err(at(identity, Step::ExtractFields))?;

        let screenshot = capture::capture_screenshot(&mut nav, cadastral_ref)
            .await
            .map_err(at(identity, Step::CaptureScreenshot))?;

        let boundary_file = capture::capture_boundary_file(&mut nav, cadastral_ref)
            .await
            .map_err(at(identity, Step::CaptureBoundaryFile))?;

        let coordinates = match mode {
            FetchMode::Basic => None,
            FetchMode::Extended => Some(
                capture::resolve_coordinates(&mut nav, cadastral_ref)
                    .await
                    .map_err(at(identity, Step::ResolveCoordinates))?,
            ),
        };

        Ok(ParcelRecord {
            identity: identity.clone(),
            fields,
            coordinates,
            artifacts: ArtifactPaths {
                screenshot,
                boundary_file,
            },
            fetched_at: Utc::now(),
        })
    }

    async fn teardown(&self, mut session: L::Session) {
        if self.config.keep_session_open {
            warn!("Leaving browser session open for inspection");
            match self.retained.lock() {
                Ok(mut retained) => retained.push(session),
                Err(poisoned) => poisoned.into_inner().push(session),
            }
            return;
        }

        if let Err(e) = session.quit().await {
            warn!("Failed to close browser session: {}", e);
        }
    }

    /// Number of sessions currently kept open for inspection
    pub fn retained_sessions(&self) -> usize {
        match self.retained.lock() {
            Ok(retained) => retained.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Close every session kept open by `keep_session_open`
    pub async fn release_retained(&self) -> Result<(), ScraperError> {
        let sessions: Vec<L::Session> = match self.retained.lock() {
            Ok(mut retained) => retained.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        for mut session in sessions {
            session.quit().await?;
        }
        Ok(())
    }
}

fn at(identity: &ParcelIdentity, step: Step) -> impl FnOnce(ScraperError) -> FetchFailure + '_ {
    move |source| FetchFailure::new(identity.clone(), step, source)
}
