//! Field extraction from the parcel data page

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::traits::BrowserSession;

use super::locators;
use super::navigator::PageNavigator;
use super::types::{ExtractedFields, PropertyClass};

/// "... (PROVINCE)"
static PROVINCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\((.*)\)").expect("valid province regex"));

/// "... 44001 MUNICIPALITY (" or "... . MUNICIPALITY ("
static MUNICIPALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s).*(?:\.|\d{5}) (.+)\(").expect("valid municipality regex"));

/// Split the portal's location text into (province, municipality)
pub fn parse_location(raw_location: &str) -> Result<(String, String), ScraperError> {
    let province = PROVINCE_RE
        .captures(raw_location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| {
            ScraperError::Extraction(format!("no province in location {:?}", raw_location))
        })?;

    let municipality = MUNICIPALITY_RE
        .captures(raw_location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| {
            ScraperError::Extraction(format!("no municipality in location {:?}", raw_location))
        })?;

    Ok((province, municipality))
}

/// Read the parcel fields from the page currently focused by `nav`
pub async fn extract_fields<S: BrowserSession>(
    nav: &mut PageNavigator<'_, S>,
) -> Result<ExtractedFields, ScraperError> {
    let raw_location = nav.text(&locators::LOCATION).await?;
    let (province, municipality) = parse_location(&raw_location)?;
    debug!("Location: {:?} -> {} / {}", raw_location, municipality, province);

    let property_class = PropertyClass::from_site_text(&nav.text(&locators::CLASS).await?);
    let primary_use = nav.text(&locators::PRIMARY_USE).await?.trim().to_string();

    let cultivation = if property_class.is_rustic() {
        Some(nav.text(&locators::CULTIVATION).await?.trim().to_string())
    } else {
        None
    };

    info!(
        "Extracted fields: class={}, use={}, municipality={}, province={}",
        property_class, primary_use, municipality, province
    );

    Ok(ExtractedFields {
        raw_location,
        province,
        municipality,
        property_class,
        primary_use,
        cultivation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{fast_config, MockSession, MockState};

    #[test]
    fn test_parse_location_with_postal_code() {
        let (province, municipality) =
            parse_location("Polígono 12 Parcela 34\nLOS LLANOS. 44001 TERUEL (TERUEL)").unwrap();
        assert_eq!(province, "TERUEL");
        assert_eq!(municipality, "TERUEL");
    }

    #[test]
    fn test_parse_location_with_period_marker() {
        let (province, municipality) =
            parse_location("Polígono 5 Parcela 87. VILLANUEVA DEL ARZOBISPO (JAÉN)").unwrap();
        assert_eq!(province, "JAÉN");
        assert_eq!(municipality, "VILLANUEVA DEL ARZOBISPO");
    }

    #[test]
    fn test_parse_location_multiline_postal_code() {
        let (province, municipality) = parse_location(
            "CL MAYOR 3\nPl:00 Pt:01\n28013 MADRID (MADRID)",
        )
        .unwrap();
        assert_eq!(province, "MADRID");
        assert_eq!(municipality, "MADRID");
    }

    #[test]
    fn test_parse_location_rejects_unexpected_shape() {
        assert!(matches!(
            parse_location("no parenthesis here"),
            Err(ScraperError::Extraction(_))
        ));
        assert!(matches!(
            parse_location("NOMARKER(CUENCA)"),
            Err(ScraperError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_rustic_parcel_has_cultivation() {
        let dir = tempfile::tempdir().unwrap();
        let state = MockState::portal(dir.path(), "Rústico");
        let config = fast_config(dir.path());
        let mut session = MockSession::new(state);
        let mut nav = PageNavigator::attach(&mut session, &config).await.unwrap();

        let fields = extract_fields(&mut nav).await.unwrap();
        assert_eq!(fields.property_class, PropertyClass::Rustic);
        assert_eq!(fields.cultivation.as_deref(), Some("C- Labor o Labradío secano"));
        assert_eq!(fields.province, "TERUEL");
        assert_eq!(fields.primary_use, "Agrario");
    }

    #[tokio::test]
    async fn test_urban_parcel_skips_cultivation_table() {
        let dir = tempfile::tempdir().unwrap();
        let state = MockState::portal(dir.path(), "Urbano");
        // the crops table does not exist on urban parcels
        state.lock().unwrap().missing.insert(locators::CULTIVATION.xpath);
        let config = fast_config(dir.path());
        let mut session = MockSession::new(state);
        let mut nav = PageNavigator::attach(&mut session, &config).await.unwrap();

        let fields = extract_fields(&mut nav).await.unwrap();
        assert_eq!(fields.property_class, PropertyClass::Other("Urbano".into()));
        assert_eq!(fields.cultivation, None);
    }

    #[tokio::test]
    async fn test_missing_field_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let state = MockState::portal(dir.path(), "Rústico");
        state.lock().unwrap().missing.insert(locators::PRIMARY_USE.xpath);
        let config = fast_config(dir.path());
        let mut session = MockSession::new(state);
        let mut nav = PageNavigator::attach(&mut session, &config).await.unwrap();

        assert!(matches!(
            extract_fields(&mut nav).await,
            Err(ScraperError::ElementNotFound(_))
        ));
    }
}
