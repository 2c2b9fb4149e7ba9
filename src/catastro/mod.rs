//! Catastro parcel scraper
//!
//! Looks up one cadastral reference on the Catastro electronic office, reads
//! the parcel fields, saves an aerial screenshot and downloads the KML
//! boundary.

pub mod capture;
pub mod extractor;
pub mod locators;
pub mod navigator;
mod scraper;
mod types;

pub use navigator::{PageNavigator, TabFocus};
pub use scraper::ParcelScraper;
pub use types::{
    ArtifactPaths, ExtractedFields, FetchMode, ParcelIdentity, ParcelRecord, PropertyClass, Step,
    RUSTIC_CLASS_TEXT,
};
