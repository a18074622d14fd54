//! Routing service boundary and the OSRM v1 client.
//!
//! The service receives the ordered waypoint list verbatim and answers with
//! turn-by-turn instructions. OSRM only returns structured maneuvers, so the
//! client also renders them into the short instruction text the narrator
//! expects (`slight left onto Palm Avenue`, `Destination`, ...).

use std::fmt;
use std::future::Future;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::geo_utils::GeoPoint;
use crate::navigation::Instruction;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    pub instructions: Vec<Instruction>,
    pub total_distance_m: f64,
    /// Full route geometry for drawing.
    pub path: Vec<GeoPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteRequest {
    /// Sequence number assigned by the session; answers to older requests
    /// are discarded.
    pub id: u64,
    pub waypoints: Vec<GeoPoint>,
    pub profile: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RouteError {
    Timeout,
    Http(String),
    NoRoute(String),
    InvalidResponse(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Timeout => write!(f, "routing request timed out"),
            RouteError::Http(e) => write!(f, "routing request failed: {}", e),
            RouteError::NoRoute(code) => write!(f, "no route found ({})", code),
            RouteError::InvalidResponse(e) => write!(f, "invalid routing response: {}", e),
        }
    }
}

impl std::error::Error for RouteError {}

pub trait RoutingService: Send + Sync {
    fn route(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Route, RouteError>> + Send;
}

pub struct OsrmRouter {
    http: reqwest::Client,
    service_url: String,
    profile: String,
}

impl OsrmRouter {
    pub fn new(config: &RoutingConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(OsrmRouter {
            http,
            service_url: config.service_url.trim_end_matches('/').to_owned(),
            profile: config.profile.clone(),
        })
    }

    pub fn request_url(&self, request: &RouteRequest) -> String {
        let coordinates = request
            .waypoints
            .iter()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .join(";");
        format!(
            "{}/{}/{}?overview=full&geometries=geojson&steps=true",
            self.service_url,
            request.profile.as_deref().unwrap_or(&self.profile),
            coordinates
        )
    }
}

impl RoutingService for OsrmRouter {
    async fn route(&self, request: &RouteRequest) -> Result<Route, RouteError> {
        if request.waypoints.len() < 2 {
            return Err(RouteError::NoRoute("need at least two waypoints".to_owned()));
        }
        let url = self.request_url(request);
        debug!("routing request: {}", url);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RouteError::Timeout
            } else {
                RouteError::Http(e.to_string())
            }
        })?;
        // OSRM reports "no route" with a 400 and a JSON body, so the status
        // is not checked before parsing.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RouteError::Http(e.to_string()))?;
        parse_osrm_response(&bytes)
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: Option<OsrmGeometry>,
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
    location: [f64; 2],
    #[serde(default)]
    bearing_after: f64,
    exit: Option<u32>,
}

pub fn parse_osrm_response(body: &[u8]) -> Result<Route, RouteError> {
    let response: OsrmResponse =
        serde_json::from_slice(body).map_err(|e| RouteError::InvalidResponse(e.to_string()))?;
    if response.code != "Ok" {
        return Err(RouteError::NoRoute(response.code));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::NoRoute("NoRoute".to_owned()))?;

    let path: Vec<GeoPoint> = route
        .geometry
        .map(|geometry| {
            geometry
                .coordinates
                .iter()
                .filter_map(|c| GeoPoint::from_lon_lat(c))
                .collect()
        })
        .unwrap_or_default();
    let leg_count = route.legs.len();
    let instructions = route
        .legs
        .into_iter()
        .enumerate()
        .flat_map(|(leg_index, leg)| {
            let step_count = leg.steps.len();
            leg.steps
                .into_iter()
                .enumerate()
                .filter(move |(step_index, step)| {
                    // via points are routing artifacts; only the first
                    // departure and the final arrival are worth announcing
                    match step.maneuver.kind.as_str() {
                        "depart" => leg_index == 0,
                        "arrive" => leg_index + 1 == leg_count && step_index + 1 == step_count,
                        _ => true,
                    }
                })
                .map(|(_, step)| Instruction {
                    text: format_step(&step),
                    distance_m: step.distance,
                    location: GeoPoint::new(step.maneuver.location[1], step.maneuver.location[0]),
                })
        })
        .collect();

    Ok(Route {
        instructions,
        total_distance_m: route.distance,
        path,
    })
}

fn compass_direction(bearing: f64) -> &'static str {
    const DIRECTIONS: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    let index = ((bearing.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    DIRECTIONS[index]
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn with_road(text: String, preposition: &str, road: &str) -> String {
    if road.is_empty() {
        text
    } else {
        format!("{} {} {}", text, preposition, road)
    }
}

fn format_step(step: &OsrmStep) -> String {
    let maneuver = &step.maneuver;
    let modifier = maneuver.modifier.as_deref().unwrap_or("straight");
    let road = step.name.as_str();
    match maneuver.kind.as_str() {
        "depart" => with_road(
            format!("Head {}", compass_direction(maneuver.bearing_after)),
            "on",
            road,
        ),
        "arrive" => "Destination".to_owned(),
        "roundabout" | "rotary" => with_road(
            match maneuver.exit {
                Some(exit) => format!("Take the {} exit in the roundabout", ordinal(exit)),
                None => "Enter the roundabout".to_owned(),
            },
            "onto",
            road,
        ),
        "fork" => with_road(format!("Keep {} at the fork", modifier), "onto", road),
        "merge" => with_road(format!("Merge {}", modifier), "onto", road),
        "end of road" => with_road(format!("{} at the end of the road", modifier), "onto", road),
        _ => match modifier {
            "straight" => with_road("Continue".to_owned(), "onto", road),
            "uturn" => with_road("Make a U-turn".to_owned(), "onto", road),
            _ => with_road(modifier.to_owned(), "onto", road),
        },
    }
}
