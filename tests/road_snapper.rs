pub mod test_utils;

use estate_nav_core::config::EstateConfig;
use estate_nav_core::geo_utils::GeoPoint;
use estate_nav_core::road_snapper::RoadSnapper;
use test_utils::*;

#[test]
fn inside_estate_goes_through_main_road() {
    let data = sample_estate();
    let config = EstateConfig::default();
    let waypoints =
        RoadSnapper::new(&data, &config).build_waypoints(START, GeoPoint::new(5.7352, 0.0460));

    assert_eq!(
        waypoints.points,
        vec![
            GeoPoint::new(5.7300, 0.0440),
            // middle vertex of Palm Avenue
            GeoPoint::new(5.7340, 0.0440),
            GeoPoint::new(5.7350, 0.0460),
        ]
    );
    assert_eq!(
        waypoints.narration,
        vec!["Starting from Palm Avenue", "Heading to Cedar Close"]
    );
}

#[test]
fn destination_outside_estate() {
    let data = sample_estate();
    let config = EstateConfig::default();
    let waypoints = RoadSnapper::new(&data, &config).build_waypoints(START, TEMA);

    assert_eq!(waypoints.points, vec![GeoPoint::new(5.7300, 0.0440), TEMA]);
    assert_eq!(waypoints.narration, vec!["Starting from Palm Avenue"]);
}

#[test]
fn start_outside_estate() {
    let data = sample_estate();
    let config = EstateConfig::default();
    let waypoints =
        RoadSnapper::new(&data, &config).build_waypoints(TEMA, GeoPoint::new(5.7341, 0.0441));

    assert_eq!(waypoints.points, vec![TEMA, GeoPoint::new(5.7340, 0.0440)]);
    assert_eq!(waypoints.narration, vec!["Heading to Palm Avenue"]);
}

#[test]
fn unsnappable_ends_are_kept() {
    let data = sample_estate();
    let config = EstateConfig::default();
    let start = GeoPoint::new(5.7270, 0.0400);
    let end = GeoPoint::new(5.7345, 0.0470);
    let waypoints = RoadSnapper::new(&data, &config).build_waypoints(start, end);

    assert_eq!(
        waypoints.points,
        vec![start, GeoPoint::new(5.7340, 0.0440), end]
    );
    assert_eq!(
        waypoints.narration,
        vec![
            "Starting from your current location, no nearby road found.",
            "Heading to destination, no nearby road found.",
        ]
    );
}

#[test]
fn missing_main_road() {
    let data = sample_estate();
    let config = EstateConfig {
        main_road_id: "R404".to_owned(),
        ..Default::default()
    };
    let waypoints =
        RoadSnapper::new(&data, &config).build_waypoints(START, GeoPoint::new(5.7352, 0.0460));
    assert_eq!(waypoints.points.len(), 2);
}
