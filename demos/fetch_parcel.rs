use catastro_scraper::{CatastroConfig, FetchMode, ParcelIdentity, ParcelScraper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,catastro_scraper=debug")
                }),
        )
        .init();

    let reference = std::env::args()
        .nth(1)
        .expect("usage: fetch_parcel <cadastral reference> [extended]");
    let mode = match std::env::args().nth(2).as_deref() {
        Some("extended") => FetchMode::Extended,
        _ => FetchMode::Basic,
    };

    let identity = ParcelIdentity::new(1, 1, 1, reference).expect("invalid cadastral reference");
    let config = CatastroConfig::from_env();
    let scraper = ParcelScraper::chromium(config);

    println!("=== Catastro Scraper ===");

    match scraper.fetch_parcel_record(&identity, mode).await {
        Ok(record) => {
            println!("Location:     {}", record.fields.raw_location);
            println!("Municipality: {}", record.fields.municipality);
            println!("Province:     {}", record.fields.province);
            println!("Class:        {}", record.fields.property_class);
            println!("Use:          {}", record.fields.primary_use);
            if let Some(cultivation) = &record.fields.cultivation {
                println!("Cultivation:  {}", cultivation);
            }
            if let Some(coordinates) = &record.coordinates {
                println!("Coordinates:  {}", coordinates);
            }
            println!("Screenshot:   {:?}", record.artifacts.screenshot);
            println!("KML:          {:?}", record.artifacts.boundary_file);
        }
        Err(failure) => {
            eprintln!("Error at {}: {}", failure.step, failure.source);
        }
    }
}
