use thiserror::Error;

use crate::catastro::{ParcelIdentity, Step};

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Underlying browser/CDP session failure
    #[error("session error: {0}")]
    Session(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("invalid parcel identity: {0}")]
    InvalidIdentity(String),

    #[error("file error: {0}")]
    FileIO(#[from] std::io::Error),
}

/// A failed `fetch_parcel_record` run: who, where, and why.
#[derive(Error, Debug)]
#[error("{identity}: {step} failed: {source}")]
pub struct FetchFailure {
    pub identity: ParcelIdentity,
    pub step: Step,
    pub source: ScraperError,
}

impl FetchFailure {
    pub fn new(identity: ParcelIdentity, step: Step, source: ScraperError) -> Self {
        Self {
            identity,
            step,
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.source, ScraperError::Timeout(_))
    }

    pub fn is_element_not_found(&self) -> bool {
        matches!(self.source, ScraperError::ElementNotFound(_))
    }
}
