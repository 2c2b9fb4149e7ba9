//! Catastro data model

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

/// Class text the portal shows for rustic parcels
pub const RUSTIC_CLASS_TEXT: &str = "Rústico";

/// Who a run is for. Only used for logging and correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedIdentity")]
pub struct ParcelIdentity {
    pub delegation: u32,
    pub lote: u32,
    pub land: u32,
    pub cadastral_ref: String,
}

impl ParcelIdentity {
    pub fn new(
        delegation: u32,
        lote: u32,
        land: u32,
        cadastral_ref: impl Into<String>,
    ) -> Result<Self, ScraperError> {
        let cadastral_ref = cadastral_ref.into().trim().to_string();

        for (name, value) in [("delegation", delegation), ("lote", lote), ("land", land)] {
            if value == 0 {
                return Err(ScraperError::InvalidIdentity(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if cadastral_ref.is_empty() {
            return Err(ScraperError::InvalidIdentity(
                "cadastral reference is empty".into(),
            ));
        }

        Ok(Self {
            delegation,
            lote,
            land,
            cadastral_ref,
        })
    }
}

/// Wire form of [`ParcelIdentity`]; deserialized values go through `new`
#[derive(Deserialize)]
struct UncheckedIdentity {
    delegation: u32,
    lote: u32,
    land: u32,
    cadastral_ref: String,
}

impl TryFrom<UncheckedIdentity> for ParcelIdentity {
    type Error = ScraperError;

    fn try_from(raw: UncheckedIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.delegation, raw.lote, raw.land, raw.cadastral_ref)
    }
}

impl fmt::Display for ParcelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[D{}-L{}-F{}] {}",
            self.delegation, self.lote, self.land, self.cadastral_ref
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchMode {
    #[default]
    Basic,
    /// Also resolves human-readable coordinates through the maps viewer
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyClass {
    Rustic,
    /// Any other class, as the portal spells it
    Other(String),
}

impl PropertyClass {
    pub fn from_site_text(text: &str) -> Self {
        let text = text.trim();
        if text == RUSTIC_CLASS_TEXT {
            PropertyClass::Rustic
        } else {
            PropertyClass::Other(text.to_string())
        }
    }

    pub fn is_rustic(&self) -> bool {
        matches!(self, PropertyClass::Rustic)
    }
}

impl fmt::Display for PropertyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyClass::Rustic => f.write_str(RUSTIC_CLASS_TEXT),
            PropertyClass::Other(text) => f.write_str(text),
        }
    }
}

/// Fields read from the parcel data page.
///
/// `cultivation` is `Some` exactly when `property_class` is rustic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub raw_location: String,
    pub province: String,
    pub municipality: String,
    pub property_class: PropertyClass,
    pub primary_use: String,
    pub cultivation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// `<ref>.png`
    pub screenshot: PathBuf,
    /// `<ref>.<ext>` as exported by the portal
    pub boundary_file: PathBuf,
}

/// Result of one successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelRecord {
    pub identity: ParcelIdentity,
    pub fields: ExtractedFields,
    /// Only resolved in [`FetchMode::Extended`]
    pub coordinates: Option<String>,
    pub artifacts: ArtifactPaths,
    pub fetched_at: DateTime<Utc>,
}

/// Steps of a run, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    LaunchSession,
    LandSearchPage,
    DismissConsent,
    SubmitParcelQuery,
    ExtractFields,
    CaptureScreenshot,
    CaptureBoundaryFile,
    ResolveCoordinates,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LaunchSession => "launch_session",
            Step::LandSearchPage => "land_search_page",
            Step::DismissConsent => "dismiss_consent",
            Step::SubmitParcelQuery => "submit_parcel_query",
            Step::ExtractFields => "extract_fields",
            Step::CaptureScreenshot => "capture_screenshot",
            Step::CaptureBoundaryFile => "capture_boundary_file",
            Step::ResolveCoordinates => "resolve_coordinates",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_validation() {
        let id = ParcelIdentity::new(1, 2, 3, " 1234567AB1234C ").unwrap();
        assert_eq!(id.cadastral_ref, "1234567AB1234C");
        assert_eq!(id.to_string(), "[D1-L2-F3] 1234567AB1234C");

        assert!(matches!(
            ParcelIdentity::new(0, 1, 1, "X"),
            Err(ScraperError::InvalidIdentity(_))
        ));
        assert!(matches!(
            ParcelIdentity::new(1, 1, 0, "X"),
            Err(ScraperError::InvalidIdentity(_))
        ));
        assert!(matches!(
            ParcelIdentity::new(1, 1, 1, "   "),
            Err(ScraperError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_identity_deserialization_is_validated() {
        let id: ParcelIdentity = serde_json::from_str(
            r#"{"delegation":1,"lote":2,"land":3,"cadastral_ref":" 1234567AB1234C "}"#,
        )
        .unwrap();
        assert_eq!(id, ParcelIdentity::new(1, 2, 3, "1234567AB1234C").unwrap());

        let zero = serde_json::from_str::<ParcelIdentity>(
            r#"{"delegation":0,"lote":2,"land":3,"cadastral_ref":"1234567AB1234C"}"#,
        );
        assert!(zero.is_err());

        let blank = serde_json::from_str::<ParcelIdentity>(
            r#"{"delegation":1,"lote":2,"land":3,"cadastral_ref":"  "}"#,
        );
        assert!(blank.unwrap_err().to_string().contains("cadastral reference is empty"));
    }

    #[test]
    fn test_property_class_from_site_text() {
        assert_eq!(PropertyClass::from_site_text("Rústico"), PropertyClass::Rustic);
        assert_eq!(
            PropertyClass::from_site_text(" Urbano "),
            PropertyClass::Other("Urbano".into())
        );
        assert!(!PropertyClass::from_site_text("Rustico").is_rustic());
    }
}
