pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use estate_nav_core::config::NavConfig;
use estate_nav_core::driver::{ServiceRunner, SessionDriver};
use estate_nav_core::geo_utils::GeoPoint;
use estate_nav_core::geocoding::{GeocodeError, GeocodeRequest};
use estate_nav_core::location::{GpxReplaySource, LocationError, LocationEvent, LocationSource};
use estate_nav_core::routing::{RouteError, RouteRequest};
use estate_nav_core::session::{MapCommand, ServiceRequest, SessionEvent, ARRIVED};
use test_utils::*;

fn driver(
    config: NavConfig,
    router: FakeRouter,
    geocoder: FakeGeocoder,
) -> (
    SessionDriver<FakeRouter, FakeGeocoder>,
    RecordingSpeech,
    Arc<FakeRouter>,
    Arc<FakeGeocoder>,
) {
    let router = Arc::new(router);
    let geocoder = Arc::new(geocoder);
    let services = ServiceRunner::new(&config, router.clone(), geocoder.clone());
    let (session, speech) = session_with(config, sample_estate());
    (SessionDriver::new(session, services), speech, router, geocoder)
}

#[tokio::test]
async fn house_search_routes_and_starts_guidance() {
    let (mut driver, speech, router, geocoder) = driver(
        NavConfig::default(),
        FakeRouter::answering([Ok(palm_avenue_route())]),
        FakeGeocoder::default(),
    );
    driver.dispatch(SessionEvent::PositionFix(fix(START))).await;
    let commands = driver
        .dispatch(SessionEvent::SearchSubmitted("A1".to_owned()))
        .await;

    assert!(geocoder.queries().is_empty());
    assert_eq!(router.requests().len(), 1);
    assert_eq!(router.requests()[0].waypoints.len(), 3);
    assert_eq!(
        commands.last(),
        Some(&MapCommand::DrawRoute {
            path: palm_avenue_route().path,
            total_distance_m: 460.0
        })
    );
    assert!(driver.session().tracker().is_active());
    assert_eq!(speech.last().as_deref(), Some("Head north on Palm Avenue"));
}

#[tokio::test]
async fn address_search_goes_through_geocoder() {
    let (mut driver, speech, router, geocoder) = driver(
        NavConfig::default(),
        FakeRouter::answering([Ok(palm_avenue_route())]),
        FakeGeocoder::answering([Ok(Some(TEMA))]),
    );
    driver.dispatch(SessionEvent::PositionFix(fix(START))).await;
    driver
        .dispatch(SessionEvent::SearchSubmitted("Tema Station".to_owned()))
        .await;

    assert_eq!(geocoder.queries(), vec!["Tema Station Ghana"]);
    assert_eq!(
        router.requests(),
        vec![RouteRequest {
            id: 1,
            waypoints: vec![START, TEMA],
            profile: None
        }]
    );
    assert!(speech.texts().contains(&"Routing to Tema Station".to_owned()));
    assert!(driver.session().tracker().is_active());
}

#[tokio::test]
async fn routing_failure_is_spoken() {
    let (mut driver, speech, _, _) = driver(
        NavConfig::default(),
        FakeRouter::answering([Err(RouteError::NoRoute("NoRoute".to_owned()))]),
        FakeGeocoder::default(),
    );
    driver.dispatch(SessionEvent::PositionFix(fix(START))).await;
    let commands = driver
        .dispatch(SessionEvent::HouseSelected("B1".to_owned()))
        .await;

    assert_eq!(
        commands.last(),
        Some(&MapCommand::Alert {
            message: "Routing error: Unable to find a route. Please try again or check road data."
                .to_owned()
        })
    );
    assert_eq!(
        speech.last().as_deref(),
        Some("Unable to calculate route. Please try a different location or check your connection.")
    );
    assert!(!driver.session().tracker().is_active());
}

#[tokio::test]
async fn slow_routing_times_out() {
    let config = NavConfig::from_json(r#"{ "routing": { "timeout_ms": 50 } }"#).unwrap();
    let router = FakeRouter {
        delay: Some(Duration::from_secs(10)),
        ..FakeRouter::answering([Ok(palm_avenue_route())])
    };
    let services = ServiceRunner::new(&config, Arc::new(router), Arc::new(FakeGeocoder::default()));

    let event = services
        .execute(ServiceRequest::Route(RouteRequest {
            id: 7,
            waypoints: vec![START, TEMA],
            profile: None,
        }))
        .await;
    assert_eq!(
        event,
        SessionEvent::RoutingFailed {
            request_id: 7,
            error: "routing request timed out".to_owned()
        }
    );
}

#[tokio::test]
async fn geocoding_errors_become_events() {
    let config = NavConfig::default();
    let services = ServiceRunner::new(
        &config,
        Arc::new(FakeRouter::default()),
        Arc::new(FakeGeocoder::answering([Err(GeocodeError::Http(
            "HTTP 503 Service Unavailable".to_owned(),
        ))])),
    );
    let request = GeocodeRequest {
        query: "Tema".to_owned(),
        scoped_query: "Tema Ghana".to_owned(),
    };
    let event = services
        .execute(ServiceRequest::Geocode(request.clone()))
        .await;
    assert_eq!(
        event,
        SessionEvent::GeocodeFailed {
            request,
            error: "geocoding request failed: HTTP 503 Service Unavailable".to_owned()
        }
    );
}

#[tokio::test]
async fn replayed_drive_arrives() {
    let (mut driver, speech, _, _) = driver(
        NavConfig::default(),
        FakeRouter::answering([Ok(palm_avenue_route())]),
        FakeGeocoder::default(),
    );
    let mut source = GpxReplaySource::load("./tests/data/palm_avenue.gpx").unwrap();

    // first fix, then pick the destination
    let first = match source.next_event() {
        Some(LocationEvent::Fix(fix)) => fix,
        other => panic!("unexpected event: {:?}", other),
    };
    driver.dispatch(SessionEvent::PositionFix(first)).await;
    driver
        .dispatch(SessionEvent::HouseSelected("A1".to_owned()))
        .await;
    speech.clear();

    driver.follow(&mut source).await;

    assert_eq!(
        speech.texts(),
        vec![
            "In 220 meters, Bear right onto Palm Avenue",
            "In 230 meters, You have reached your destination",
            ARRIVED,
        ]
    );
    assert!(!driver.session().tracker().is_active());
    // the watch stays subscribed until teardown
    assert!(source.is_subscribed());

    driver.teardown(&mut source).await;
    assert!(!source.is_subscribed());
    assert!(driver.session().is_torn_down());
    assert_eq!(*speech.cancelled.lock().unwrap(), 1);
}

#[tokio::test]
async fn location_failure_falls_back() {
    let (mut driver, _, _, _) = driver(
        NavConfig::default(),
        FakeRouter::default(),
        FakeGeocoder::default(),
    );
    let mut source = GpxReplaySource::from_events([LocationEvent::Failed(
        LocationError::PositionUnavailable,
    )]);
    let commands = driver.follow(&mut source).await;
    assert!(commands.contains(&MapCommand::MoveUserMarker {
        position: GeoPoint::new(5.7328, 0.0447),
        accuracy_m: 20.0
    }));
}
