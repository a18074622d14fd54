use std::sync::Arc;

use estate_nav_core::config::NavConfig;
use estate_nav_core::driver::{ServiceRunner, SessionDriver};
use estate_nav_core::estate_data::EstateData;
use estate_nav_core::geocoding::NominatimGeocoder;
use estate_nav_core::location::{GpxReplaySource, LocationEvent, LocationSource};
use estate_nav_core::narrator::Narrator;
use estate_nav_core::routing::OsrmRouter;
use estate_nav_core::session::{MapSession, SessionEvent};
use estate_nav_core::speech::{LogSpeech, SpeechSettings};

// Drives a session along a recorded track, speaking into the log.
// usage: cargo run --example replay -- <track.gpx> <house number or address>
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let mut args = std::env::args().skip(1);
    let (track, destination) = match (args.next(), args.next()) {
        (Some(track), Some(destination)) => (track, destination),
        _ => {
            eprintln!("usage: replay <track.gpx> <house number or address>");
            std::process::exit(2);
        }
    };

    let config = Arc::new(NavConfig::default());
    let (data, warnings) = EstateData::load(&config.datasets);
    let services = ServiceRunner::new(
        &config,
        Arc::new(OsrmRouter::new(&config.routing)?),
        Arc::new(NominatimGeocoder::new(&config.geocoding)?),
    );
    let narrator = Narrator::new(Box::new(LogSpeech), SpeechSettings::default());
    let session = MapSession::new(config.clone(), Arc::new(data), narrator);
    let mut driver = SessionDriver::new(session, services);

    let mut source = GpxReplaySource::load(&track)?;
    driver.dispatch(SessionEvent::Start { warnings }).await;
    let first = match source.next_event() {
        Some(LocationEvent::Fix(fix)) => SessionEvent::PositionFix(fix),
        Some(LocationEvent::Failed(error)) => SessionEvent::LocationFailed(error),
        None => return Err(format!("{} has no track points", track).into()),
    };
    driver.dispatch(first).await;
    driver.dispatch(SessionEvent::SearchSubmitted(destination)).await;

    let commands = driver.follow(&mut source).await;
    println!("{} map commands during replay", commands.len());
    driver.teardown(&mut source).await;
    Ok(())
}
