//! One user's navigation session.
//!
//! The session is driven entirely by `SessionEvent`s and never performs I/O
//! itself: map changes come back as `MapCommand`s, calls to the routing and
//! geocoding services come back as `ServiceRequest`s whose answers are fed in
//! again as events. Speech is the only side effect and goes through the
//! narrator's `SpeechOutput`.

use std::sync::Arc;

use serde::Serialize;

use crate::config::NavConfig;
use crate::estate_data::{EstateData, HouseFeature};
use crate::geo_utils::GeoPoint;
use crate::geocoding::GeocodeRequest;
use crate::location::{LocationError, LocationFix, UserPosition};
use crate::narrator::{kilometers, Narrator};
use crate::navigation::{Announcement, NavigationTracker};
use crate::road_snapper::{RoadSnapper, Waypoints};
use crate::routing::{Route, RouteRequest};
use crate::speech::Utterance;

pub const ARRIVED: &str = "You have arrived at your destination";

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Dataset warnings collected at startup are shown once per session.
    Start { warnings: Vec<String> },
    PositionFix(LocationFix),
    LocationFailed(LocationError),
    SearchInput(String),
    SearchSubmitted(String),
    HouseSelected(String),
    GeocodeResolved {
        request: GeocodeRequest,
        result: Option<GeoPoint>,
    },
    GeocodeFailed {
        request: GeocodeRequest,
        error: String,
    },
    RouteFound { request_id: u64, route: Route },
    RoutingFailed { request_id: u64, error: String },
    Recenter,
    Repeat,
    Teardown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MapCommand {
    SetView { center: GeoPoint, zoom: u8 },
    FlyTo { center: GeoPoint, zoom: u8 },
    MoveUserMarker { position: GeoPoint, accuracy_m: f64 },
    HighlightHouse { house_number: String, position: GeoPoint },
    ShowSuggestions { house_numbers: Vec<String> },
    HideSuggestions,
    SetWaypoints { waypoints: Vec<GeoPoint> },
    DrawRoute { path: Vec<GeoPoint>, total_distance_m: f64 },
    ClearRoute,
    SetLoading { visible: bool },
    Alert { message: String },
    Speak { utterance: Utterance },
    CancelSpeech,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServiceRequest {
    Route(RouteRequest),
    Geocode(GeocodeRequest),
}

#[derive(Debug, Default, PartialEq)]
pub struct SessionOutcome {
    pub commands: Vec<MapCommand>,
    pub requests: Vec<ServiceRequest>,
}

impl SessionOutcome {
    fn command(&mut self, command: MapCommand) {
        self.commands.push(command);
    }
}

pub struct MapSession {
    config: Arc<NavConfig>,
    data: Arc<EstateData>,
    narrator: Narrator,
    tracker: NavigationTracker,
    user_position: Option<UserPosition>,
    has_real_fix: bool,
    last_route_request: u64,
    torn_down: bool,
}

impl MapSession {
    pub fn new(config: Arc<NavConfig>, data: Arc<EstateData>, narrator: Narrator) -> Self {
        let tracker = NavigationTracker::new(config.navigation);
        MapSession {
            config,
            data,
            narrator,
            tracker,
            user_position: None,
            has_real_fix: false,
            last_route_request: 0,
            torn_down: false,
        }
    }

    pub fn user_position(&self) -> Option<&UserPosition> {
        self.user_position.as_ref()
    }

    pub fn tracker(&self) -> &NavigationTracker {
        &self.tracker
    }

    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn handle(&mut self, event: SessionEvent) -> SessionOutcome {
        let mut out = SessionOutcome::default();
        if self.torn_down {
            warn!("event after teardown ignored: {:?}", event);
            return out;
        }
        match event {
            SessionEvent::Start { warnings } => self.on_start(warnings, &mut out),
            SessionEvent::PositionFix(fix) => self.on_position(&fix, &mut out),
            SessionEvent::LocationFailed(error) => self.on_location_failed(error, &mut out),
            SessionEvent::SearchInput(text) => self.on_search_input(&text, &mut out),
            SessionEvent::SearchSubmitted(query) => self.on_search(&query, &mut out),
            SessionEvent::HouseSelected(house_number) => match self.data.find_house(&house_number)
            {
                Some(house) => {
                    let house = house.clone();
                    self.select_house(&house, &mut out);
                }
                None => {
                    warn!("unknown house: {}", house_number);
                    out.command(MapCommand::Alert {
                        message: format!("House {} not found", house_number),
                    });
                }
            },
            SessionEvent::GeocodeResolved { request, result } => {
                self.on_geocoded(&request, result, &mut out)
            }
            SessionEvent::GeocodeFailed { request, error } => {
                error!("Search error for `{}`: {}", request.query, error);
                out.command(MapCommand::SetLoading { visible: false });
                self.narrator
                    .speak("Error searching for location. Please try again.");
                out.command(MapCommand::Alert {
                    message: "Error searching for location".to_owned(),
                });
            }
            SessionEvent::RouteFound { request_id, route } => {
                self.on_route_found(request_id, route, &mut out)
            }
            SessionEvent::RoutingFailed { request_id, error } => {
                if request_id != self.last_route_request {
                    debug!("stale routing error for request {} ignored", request_id);
                    return out;
                }
                error!("routing failed: {}", error);
                out.command(MapCommand::SetLoading { visible: false });
                self.narrator.speak(
                    "Unable to calculate route. Please try a different location or check your connection.",
                );
                out.command(MapCommand::Alert {
                    message: "Routing error: Unable to find a route. Please try again or check road data."
                        .to_owned(),
                });
            }
            SessionEvent::Recenter => {
                if let Some(position) = &self.user_position {
                    out.command(MapCommand::SetView {
                        center: position.location,
                        zoom: self.config.map.follow_zoom,
                    });
                }
            }
            SessionEvent::Repeat => self.narrator.repeat(),
            SessionEvent::Teardown => {
                info!("session teardown");
                self.torn_down = true;
                self.tracker.clear();
                self.narrator.cancel();
            }
        }
        out
    }

    fn on_start(&mut self, warnings: Vec<String>, out: &mut SessionOutcome) {
        out.command(MapCommand::SetView {
            center: self.config.map.initial_center,
            zoom: self.config.map.initial_zoom,
        });
        // cleared by the first fix or location failure
        out.command(MapCommand::SetLoading { visible: true });
        for message in warnings {
            out.command(MapCommand::Alert { message });
        }
    }

    fn on_position(&mut self, fix: &LocationFix, out: &mut SessionOutcome) {
        let position = UserPosition::from_fix(fix);
        if !self.has_real_fix {
            out.command(MapCommand::SetLoading { visible: false });
        }
        self.has_real_fix = true;
        self.user_position = Some(position);
        out.command(MapCommand::MoveUserMarker {
            position: position.location,
            accuracy_m: position.accuracy_m,
        });

        if self.tracker.is_active() && !self.tracker.instructions().is_empty() {
            for announcement in self.tracker.on_position(&position.location) {
                self.announce(announcement);
            }
        }
    }

    fn on_location_failed(&mut self, error: LocationError, out: &mut SessionOutcome) {
        error!("{}", error.message());
        let position = UserPosition::fallback(self.config.map.default_position);
        self.user_position = Some(position);
        if !self.has_real_fix {
            out.command(MapCommand::SetLoading { visible: false });
        }
        out.command(MapCommand::MoveUserMarker {
            position: position.location,
            accuracy_m: position.accuracy_m,
        });
        out.command(MapCommand::SetView {
            center: position.location,
            zoom: self.config.map.follow_zoom,
        });
    }

    fn on_search_input(&mut self, text: &str, out: &mut SessionOutcome) {
        let house_numbers: Vec<String> = self
            .data
            .suggest_houses(text)
            .into_iter()
            .map(|house| house.house_number.clone())
            .collect();
        if house_numbers.is_empty() {
            out.command(MapCommand::HideSuggestions);
        } else {
            out.command(MapCommand::ShowSuggestions { house_numbers });
        }
    }

    fn on_search(&mut self, query: &str, out: &mut SessionOutcome) {
        let query = query.trim();
        out.command(MapCommand::HideSuggestions);
        if query.is_empty() || self.user_position.is_none() {
            self.narrator
                .speak("Please enter a search term and ensure location services are enabled.");
            return;
        }

        if let Some(house) = self.data.find_house(query) {
            let house = house.clone();
            self.select_house(&house, out);
            return;
        }

        out.command(MapCommand::SetLoading { visible: true });
        out.requests.push(ServiceRequest::Geocode(GeocodeRequest {
            query: query.to_owned(),
            scoped_query: format!("{}{}", query, self.config.geocoding.region_suffix),
        }));
    }

    fn select_house(&mut self, house: &HouseFeature, out: &mut SessionOutcome) {
        out.command(MapCommand::HideSuggestions);
        out.command(MapCommand::FlyTo {
            center: house.location,
            zoom: self.config.map.house_zoom,
        });
        out.command(MapCommand::HighlightHouse {
            house_number: house.house_number.clone(),
            position: house.location,
        });

        match self.user_position {
            Some(position) => {
                let waypoints = self.snapper().build_waypoints(position.location, house.location);
                self.request_route(waypoints, out);
                self.narrator.speak(&format!(
                    "Routing to house {} via estate roads",
                    house.house_number
                ));
            }
            None => self.ask_for_location(out),
        }
    }

    fn on_geocoded(
        &mut self,
        request: &GeocodeRequest,
        result: Option<GeoPoint>,
        out: &mut SessionOutcome,
    ) {
        out.command(MapCommand::SetLoading { visible: false });
        let destination = match result {
            Some(destination) => destination,
            None => {
                self.narrator
                    .speak("Location not found. Please try another search term.");
                out.command(MapCommand::Alert {
                    message: "Location not found".to_owned(),
                });
                return;
            }
        };
        let position = match self.user_position {
            Some(position) => position,
            None => return self.ask_for_location(out),
        };

        let snapper = self.snapper();
        let (waypoints, announcement) = if snapper.is_in_estate(&destination) {
            (
                snapper.build_waypoints(position.location, destination),
                format!("Routing to {} via estate roads", request.query),
            )
        } else {
            (
                Waypoints {
                    points: vec![position.location, destination],
                    narration: Vec::new(),
                },
                format!("Routing to {}", request.query),
            )
        };
        self.request_route(waypoints, out);
        out.command(MapCommand::SetView {
            center: destination,
            zoom: self.config.map.follow_zoom,
        });
        self.narrator.speak(&announcement);
    }

    fn on_route_found(&mut self, request_id: u64, route: Route, out: &mut SessionOutcome) {
        if request_id != self.last_route_request {
            debug!("stale route for request {} ignored", request_id);
            return;
        }
        out.command(MapCommand::SetLoading { visible: false });
        self.apply_route(request_id, route, out);
    }

    fn apply_route(&mut self, request_id: u64, route: Route, out: &mut SessionOutcome) {
        info!(
            "route {}: {} instructions, {:.0} m",
            request_id,
            route.instructions.len(),
            route.total_distance_m
        );
        out.command(MapCommand::DrawRoute {
            path: route.path.clone(),
            total_distance_m: route.total_distance_m,
        });
        self.narrator.speak(&format!(
            "Route calculated. Your destination is {} kilometers away.",
            kilometers(route.total_distance_m)
        ));
        if let Some(first) = self.tracker.reset(route.instructions) {
            self.announce(first);
        }
    }

    /// Any route in progress is dropped as soon as a new one is requested.
    fn request_route(&mut self, waypoints: Waypoints, out: &mut SessionOutcome) {
        for line in &waypoints.narration {
            self.narrator.speak(line);
        }
        self.tracker.clear();
        self.last_route_request += 1;

        out.command(MapCommand::ClearRoute);
        out.command(MapCommand::SetWaypoints {
            waypoints: waypoints.points.clone(),
        });
        out.command(MapCommand::SetLoading { visible: true });
        out.requests.push(ServiceRequest::Route(RouteRequest {
            id: self.last_route_request,
            waypoints: waypoints.points,
            profile: None,
        }));
    }

    fn announce(&mut self, announcement: Announcement) {
        match announcement {
            Announcement::Instruction(instruction) => {
                self.narrator.speak_instruction(&instruction);
            }
            Announcement::LookAhead(instruction) => {
                self.narrator
                    .speak(&format!("After that, {}", instruction.text));
            }
            Announcement::Arrived => self.narrator.speak(ARRIVED),
        }
    }

    fn ask_for_location(&mut self, out: &mut SessionOutcome) {
        let message = "Please enable location services to get directions.";
        self.narrator.speak(message);
        out.command(MapCommand::Alert {
            message: message.to_owned(),
        });
    }

    fn snapper(&self) -> RoadSnapper<'_> {
        RoadSnapper::new(&self.data, &self.config.estate)
    }
}
