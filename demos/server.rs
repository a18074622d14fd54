use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use estate_nav_core::config::NavConfig;
use estate_nav_core::driver::ServiceRunner;
use estate_nav_core::estate_data::EstateData;
use estate_nav_core::geocoding::NominatimGeocoder;
use estate_nav_core::routing::OsrmRouter;
use estate_nav_core::server::{MapServer, NavigationContext};

// usage: cargo run --example server -- [config.json]
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };
    let config = Arc::new(config);

    let (data, warnings) = EstateData::load(&config.datasets);
    println!(
        "Loaded {} houses and {} roads",
        data.houses.len(),
        data.roads.len()
    );
    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    let services = ServiceRunner::new(
        &config,
        Arc::new(OsrmRouter::new(&config.routing)?),
        Arc::new(NominatimGeocoder::new(&config.geocoding)?),
    );
    let mut server = MapServer::create_and_start(
        &config.server.host,
        config.server.port,
        NavigationContext {
            config: config.clone(),
            data: Arc::new(data),
            warnings,
            services,
        },
    )?;

    println!("================================================");
    println!("[Navigation API]:  {}/api/config", server.url());
    println!("Press Ctrl+C to exit");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    println!("Stopping server...");
    server.stop();
    Ok(())
}
