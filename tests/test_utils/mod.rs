#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use estate_nav_core::config::NavConfig;
use estate_nav_core::estate_data::{EstateData, HouseFeature, RoadFeature};
use estate_nav_core::geo_utils::GeoPoint;
use estate_nav_core::geocoding::{GeocodeError, GeocodeRequest, GeocodingService};
use estate_nav_core::location::LocationFix;
use estate_nav_core::narrator::Narrator;
use estate_nav_core::navigation::Instruction;
use estate_nav_core::routing::{Route, RouteError, RouteRequest, RoutingService};
use estate_nav_core::session::MapSession;
use estate_nav_core::speech::{SpeechError, SpeechOutput, SpeechSettings, Utterance};

/// Where the user usually stands in these tests: next to the south end of
/// Palm Avenue.
pub const START: GeoPoint = GeoPoint::new(5.7301, 0.0440);
/// Outside the estate.
pub const TEMA: GeoPoint = GeoPoint::new(5.6698, 0.0166);

pub fn house(number: &str, lat: f64, lon: f64) -> HouseFeature {
    HouseFeature {
        house_number: number.to_owned(),
        name: format!("House {}", number),
        location: GeoPoint::new(lat, lon),
    }
}

pub fn road(id: &str, name: &str, points: &[(f64, f64)]) -> RoadFeature {
    RoadFeature {
        road_id: id.to_owned(),
        name: name.to_owned(),
        polyline: points
            .iter()
            .map(|(lat, lon)| GeoPoint::new(*lat, *lon))
            .collect(),
    }
}

/// A1 is 16 m from Palm Avenue, B1 22 m from Cedar Close and A2 more than
/// 50 m from any road.
pub fn sample_estate() -> EstateData {
    EstateData::new(
        vec![
            house("A1", 5.7341, 0.0441),
            house("A2", 5.7345, 0.0470),
            house("B1", 5.7352, 0.0460),
        ],
        vec![
            road(
                "R1",
                "Palm Avenue",
                &[
                    (5.7300, 0.0440),
                    (5.7320, 0.0440),
                    (5.7340, 0.0440),
                    (5.7360, 0.0440),
                    (5.7380, 0.0440),
                ],
            ),
            road(
                "R2",
                "Cedar Close",
                &[(5.7350, 0.0450), (5.7350, 0.0460), (5.7350, 0.0470)],
            ),
        ],
    )
}

pub fn fix(point: GeoPoint) -> LocationFix {
    LocationFix {
        latitude: point.lat,
        longitude: point.lon,
        accuracy: Some(8.0),
        timestamp_ms: None,
    }
}

pub fn instruction(text: &str, distance_m: f64, location: GeoPoint) -> Instruction {
    Instruction {
        text: text.to_owned(),
        distance_m,
        location,
    }
}

/// Three steps about 330 m apart along Palm Avenue, ending next to A1.
pub fn palm_avenue_route() -> Route {
    Route {
        instructions: vec![
            instruction("Head north on Palm Avenue", 0.0, GeoPoint::new(5.7300, 0.0440)),
            instruction("slight right onto Palm Avenue", 220.0, GeoPoint::new(5.7320, 0.0440)),
            instruction("Destination", 230.0, GeoPoint::new(5.7340, 0.0440)),
        ],
        total_distance_m: 460.0,
        path: vec![
            GeoPoint::new(5.7300, 0.0440),
            GeoPoint::new(5.7320, 0.0440),
            GeoPoint::new(5.7340, 0.0440),
        ],
    }
}

#[derive(Clone, Default)]
pub struct RecordingSpeech {
    pub spoken: Arc<Mutex<Vec<Utterance>>>,
    pub cancelled: Arc<Mutex<usize>>,
}

impl RecordingSpeech {
    pub fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn clear(&self) {
        self.spoken.lock().unwrap().clear();
    }
}

impl SpeechOutput for RecordingSpeech {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(utterance);
        Ok(())
    }

    fn cancel(&mut self) {
        *self.cancelled.lock().unwrap() += 1;
    }
}

pub fn session_with(config: NavConfig, data: EstateData) -> (MapSession, RecordingSpeech) {
    let speech = RecordingSpeech::default();
    let narrator = Narrator::new(Box::new(speech.clone()), SpeechSettings::default());
    (
        MapSession::new(Arc::new(config), Arc::new(data), narrator),
        speech,
    )
}

pub fn sample_session() -> (MapSession, RecordingSpeech) {
    session_with(NavConfig::default(), sample_estate())
}

/// Answers route requests from a script, in order, and remembers them.
#[derive(Default)]
pub struct FakeRouter {
    pub answers: Mutex<VecDeque<Result<Route, RouteError>>>,
    pub requests: Mutex<Vec<RouteRequest>>,
    pub delay: Option<Duration>,
}

impl FakeRouter {
    pub fn answering(answers: impl IntoIterator<Item = Result<Route, RouteError>>) -> Self {
        FakeRouter {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl RoutingService for FakeRouter {
    async fn route(&self, request: &RouteRequest) -> Result<Route, RouteError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.answers.lock().unwrap().pop_front();
        answer.unwrap_or_else(|| Err(RouteError::NoRoute("NoRoute".to_owned())))
    }
}

#[derive(Default)]
pub struct FakeGeocoder {
    answers: Mutex<VecDeque<Result<Option<GeoPoint>, GeocodeError>>>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn answering(
        answers: impl IntoIterator<Item = Result<Option<GeoPoint>, GeocodeError>>,
    ) -> Self {
        FakeGeocoder {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl GeocodingService for FakeGeocoder {
    async fn geocode(&self, request: &GeocodeRequest) -> Result<Option<GeoPoint>, GeocodeError> {
        self.queries
            .lock()
            .unwrap()
            .push(request.scoped_query.clone());
        let answer = self.answers.lock().unwrap().pop_front();
        answer.unwrap_or(Ok(None))
    }
}
