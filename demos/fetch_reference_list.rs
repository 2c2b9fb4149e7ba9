//! Fetch every cadastral reference listed in a text file, one per line.
//!
//! ```text
//! cargo run --example fetch_reference_list -- fincas.txt
//! ```

use std::path::PathBuf;

use catastro_scraper::{fetch_batch, load_reference_list, CatastroConfig, FetchMode, ParcelScraper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "fincas.txt".to_string()),
    );
    let identities = load_reference_list(&path, 1, 1)?;
    println!("{} references in {:?}", identities.len(), path);

    let scraper = ParcelScraper::chromium(CatastroConfig::from_env());
    let entries = fetch_batch(&scraper, &identities, FetchMode::Basic).await;

    for entry in &entries {
        match &entry.outcome {
            Ok(record) => println!(
                "OK   {} {} ({}) {:?}",
                entry.identity.cadastral_ref,
                record.fields.municipality,
                record.fields.property_class,
                record.artifacts.boundary_file
            ),
            Err(failure) => println!(
                "FAIL {} at {}: {}",
                entry.identity.cadastral_ref, failure.step, failure.source
            ),
        }
    }

    let records: Vec<_> = entries.iter().filter_map(|e| e.outcome.as_ref().ok()).collect();
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
