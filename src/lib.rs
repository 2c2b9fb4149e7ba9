//! Catastro scraper library
//!
//! - Reads location, class, use and cultivation of a parcel from the Catastro
//!   electronic office
//! - Saves an aerial (PNOA) screenshot of the parcel as `<ref>.png`
//! - Downloads the parcel boundary KML as `<ref>.kml`
//!
//! # Usage
//!
//! ```rust,ignore
//! use catastro_scraper::{CatastroConfig, FetchMode, ParcelIdentity, ParcelScraper};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CatastroConfig::new("./downloads").with_headless(false);
//!     let scraper = ParcelScraper::chromium(config);
//!
//!     let identity = ParcelIdentity::new(1, 1, 1, "1234567AB1234C").unwrap();
//!     match scraper.fetch_parcel_record(&identity, FetchMode::Basic).await {
//!         Ok(record) => println!("{:?}", record.fields),
//!         Err(failure) => eprintln!("{} failed at {}", failure.identity, failure.step),
//!     }
//! }
//! ```
//!
//! # tower Service
//!
//! ```rust,ignore
//! use catastro_scraper::{CatastroConfig, CatastroService, ParcelIdentity, ParcelRequest};
//! use tower::Service;
//!
//! let mut service = CatastroService::new(CatastroConfig::from_env());
//! let identity = ParcelIdentity::new(1, 1, 1, "1234567AB1234C")?;
//! let record = service.call(ParcelRequest::new(identity)).await?;
//! ```

pub mod batch;
pub mod catastro;
pub mod chromium;
pub mod config;
pub mod error;
pub mod service;
pub mod traits;
pub mod wait;

#[cfg(test)]
mod mock;

// Main types
pub use batch::{fetch_batch, load_reference_list, parse_reference_list, BatchEntry};
pub use catastro::{
    ArtifactPaths, ExtractedFields, FetchMode, PageNavigator, ParcelIdentity, ParcelRecord,
    ParcelScraper, PropertyClass, Step, TabFocus,
};
pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use config::CatastroConfig;
pub use error::{FetchFailure, ScraperError};
pub use service::{CatastroService, ParcelRequest};
pub use traits::{BrowserSession, FrameContext, Locator, SessionLauncher, TabId};
