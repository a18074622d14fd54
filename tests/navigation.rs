pub mod test_utils;

use estate_nav_core::config::NavigationConfig;
use estate_nav_core::geo_utils::GeoPoint;
use estate_nav_core::navigation::{Announcement, NavigationTracker};
use test_utils::*;

fn announced_instructions(announcements: &[Announcement]) -> Vec<String> {
    announcements
        .iter()
        .filter_map(|a| match a {
            Announcement::Instruction(i) => Some(i.text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn every_instruction_is_announced_once() {
    let route = palm_avenue_route();
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    let mut announcements: Vec<Announcement> =
        tracker.reset(route.instructions.clone()).into_iter().collect();

    // drive north in ~5 m steps, past the end
    let mut lat = 5.7295;
    while lat < 5.7345 {
        announcements.extend(tracker.on_position(&GeoPoint::new(lat, 0.0440)));
        lat += 0.00005;
    }

    assert_eq!(
        announced_instructions(&announcements),
        vec![
            "Head north on Palm Avenue",
            "slight right onto Palm Avenue",
            "Destination",
        ]
    );
    assert_eq!(
        announcements
            .iter()
            .filter(|a| **a == Announcement::Arrived)
            .count(),
        1
    );
}

#[test]
fn arrival_needs_the_arrival_radius() {
    let route = palm_avenue_route();
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    tracker.reset(route.instructions);
    tracker.on_position(&GeoPoint::new(5.7320, 0.0440));

    // ~33 m short of the destination: announced, not arrived
    let announcements = tracker.on_position(&GeoPoint::new(5.7337, 0.0440));
    assert_eq!(announced_instructions(&announcements), vec!["Destination"]);
    assert!(!announcements.contains(&Announcement::Arrived));
    assert!(tracker.is_active());

    // ~22 m: still outside
    assert!(tracker.on_position(&GeoPoint::new(5.7338, 0.0440)).is_empty());
    assert!(tracker.is_active());

    // ~11 m
    assert_eq!(
        tracker.on_position(&GeoPoint::new(5.7339, 0.0440)),
        vec![Announcement::Arrived]
    );
    assert!(!tracker.is_active());
    assert!(tracker.on_position(&GeoPoint::new(5.7340, 0.0440)).is_empty());
}

#[test]
fn look_ahead_when_next_step_is_close() {
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    tracker.reset(vec![
        instruction("Head north", 0.0, GeoPoint::new(5.7300, 0.0440)),
        instruction("left onto Cedar Close", 100.0, GeoPoint::new(5.7320, 0.0440)),
        instruction("right", 100.0, GeoPoint::new(5.7330, 0.0440)),
        instruction("Destination", 50.0, GeoPoint::new(5.7340, 0.0440)),
    ]);

    let announcements = tracker.on_position(&GeoPoint::new(5.7320, 0.0440));
    assert_eq!(
        announcements,
        vec![
            Announcement::Instruction(instruction(
                "left onto Cedar Close",
                100.0,
                GeoPoint::new(5.7320, 0.0440)
            )),
            Announcement::LookAhead(instruction("right", 100.0, GeoPoint::new(5.7330, 0.0440))),
        ]
    );
    assert_eq!(tracker.next_index(), 2);
}

#[test]
fn far_away_positions_change_nothing() {
    let route = palm_avenue_route();
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    tracker.reset(route.instructions);
    assert!(tracker.on_position(&TEMA).is_empty());
    assert_eq!(tracker.next_index(), 1);
    assert!(tracker.is_active());
}

#[test]
fn empty_route() {
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    assert_eq!(tracker.reset(Vec::new()), None);
    assert!(tracker.on_position(&START).is_empty());
    assert_eq!(tracker.next_index(), 0);
}

#[test]
fn clear_stops_tracking() {
    let mut tracker = NavigationTracker::new(NavigationConfig::default());
    tracker.reset(palm_avenue_route().instructions);
    tracker.clear();
    assert!(!tracker.is_active());
    assert!(tracker.instructions().is_empty());
    assert!(tracker.on_position(&GeoPoint::new(5.7320, 0.0440)).is_empty());
}
