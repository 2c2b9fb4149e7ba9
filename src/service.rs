use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::catastro::{FetchMode, ParcelIdentity, ParcelRecord, ParcelScraper};
use crate::chromium::ChromiumLauncher;
use crate::config::CatastroConfig;
use crate::error::FetchFailure;
use crate::traits::SessionLauncher;

/// One parcel to fetch
#[derive(Debug, Clone)]
pub struct ParcelRequest {
    pub identity: ParcelIdentity,
    pub mode: FetchMode,
}

impl ParcelRequest {
    pub fn new(identity: ParcelIdentity) -> Self {
        Self {
            identity,
            mode: FetchMode::Basic,
        }
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }
}

/// `tower::Service` front for [`ParcelScraper`]
pub struct CatastroService<L: SessionLauncher = ChromiumLauncher> {
    scraper: Arc<ParcelScraper<L>>,
}

impl<L: SessionLauncher> Clone for CatastroService<L> {
    fn clone(&self) -> Self {
        Self {
            scraper: Arc::clone(&self.scraper),
        }
    }
}

impl CatastroService<ChromiumLauncher> {
    pub fn new(config: CatastroConfig) -> Self {
        Self::with_scraper(ParcelScraper::chromium(config))
    }
}

impl<L: SessionLauncher> CatastroService<L> {
    pub fn with_scraper(scraper: ParcelScraper<L>) -> Self {
        Self {
            scraper: Arc::new(scraper),
        }
    }

    pub fn scraper(&self) -> &ParcelScraper<L> {
        &self.scraper
    }
}

impl<L> Service<ParcelRequest> for CatastroService<L>
where
    L: SessionLauncher + 'static,
{
    type Response = ParcelRecord;
    type Error = FetchFailure;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ParcelRequest) -> Self::Future {
        info!("Parcel request received: {}", req.identity);
        let scraper = Arc::clone(&self.scraper);

        Box::pin(async move { scraper.fetch_parcel_record(&req.identity, req.mode).await })
    }
}
