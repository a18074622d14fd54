use std::{fs, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::DatasetConfig;
use crate::geo_utils::GeoPoint;

pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct HouseFeature {
    pub house_number: String,
    pub name: String,
    pub location: GeoPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadFeature {
    pub road_id: String,
    pub name: String,
    pub polyline: Vec<GeoPoint>,
}

impl RoadFeature {
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.road_id.is_empty() {
            &self.road_id
        } else {
            "road"
        }
    }

    pub fn midpoint_vertex(&self) -> Option<GeoPoint> {
        self.polyline.get(self.polyline.len() / 2).copied()
    }
}

// Only the parts of GeoJSON the datasets actually use.
#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    #[serde(other)]
    Unsupported,
}

// `HOUSE_NUMB` is typed by hand in the source data; numbers show up too.
fn property_string(properties: &Option<Map<String, Value>>, key: &str) -> Option<String> {
    match properties.as_ref()?.get(key)? {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_feature_collection(content: &str) -> Result<Vec<Feature>> {
    let collection: FeatureCollection =
        serde_json::from_str(content).context("not a GeoJSON feature collection")?;
    Ok(collection.features)
}

pub fn parse_houses(content: &str) -> Result<Vec<HouseFeature>> {
    let features = parse_feature_collection(content)?;
    let mut skipped = 0;
    let houses = features
        .into_iter()
        .filter_map(|feature| {
            let house = match &feature.geometry {
                Some(Geometry::Point { coordinates }) => GeoPoint::from_lon_lat(coordinates)
                    .and_then(|location| {
                        Some(HouseFeature {
                            house_number: property_string(&feature.properties, "HOUSE_NUMB")?,
                            name: property_string(&feature.properties, "name").unwrap_or_default(),
                            location,
                        })
                    }),
                _ => None,
            };
            if house.is_none() {
                skipped += 1;
            }
            house
        })
        .collect_vec();
    if skipped > 0 {
        warn!("skipped {} house features without a number or point", skipped);
    }
    Ok(houses)
}

pub fn parse_roads(content: &str) -> Result<Vec<RoadFeature>> {
    let features = parse_feature_collection(content)?;
    let roads = features
        .into_iter()
        .filter_map(|feature| match &feature.geometry {
            Some(Geometry::LineString { coordinates }) => Some(RoadFeature {
                road_id: property_string(&feature.properties, "ROAD_ID").unwrap_or_default(),
                name: property_string(&feature.properties, "name").unwrap_or_default(),
                polyline: coordinates
                    .iter()
                    .filter_map(|c| GeoPoint::from_lon_lat(c))
                    .collect(),
            }),
            _ => None,
        })
        .collect_vec();
    Ok(roads)
}

pub fn load_houses<P: AsRef<Path>>(path: P) -> Result<Vec<HouseFeature>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    parse_houses(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_roads<P: AsRef<Path>>(path: P) -> Result<Vec<RoadFeature>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    parse_roads(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn fallback_houses() -> Vec<HouseFeature> {
    vec![HouseFeature {
        house_number: "A1".to_owned(),
        name: "Sample Building".to_owned(),
        location: GeoPoint::new(5.7328, 0.0447),
    }]
}

pub fn fallback_roads() -> Vec<RoadFeature> {
    vec![
        RoadFeature {
            road_id: "R1".to_owned(),
            name: "Main Estate Road".to_owned(),
            polyline: vec![
                GeoPoint::new(5.7328, 0.0445),
                GeoPoint::new(5.7328, 0.0447),
                GeoPoint::new(5.7327, 0.0449),
            ],
        },
        RoadFeature {
            road_id: "R2".to_owned(),
            name: "Secondary Road".to_owned(),
            polyline: vec![
                GeoPoint::new(5.7329, 0.0446),
                GeoPoint::new(5.7329, 0.0448),
                GeoPoint::new(5.7330, 0.0450),
            ],
        },
    ]
}

/// Picks the loaded dataset or the built-in sample. The second value is the
/// warning to show the user when the sample was used.
pub fn with_fallback<T>(
    loaded: Result<Vec<T>>,
    fallback: impl FnOnce() -> Vec<T>,
    what: &str,
) -> (Vec<T>, Option<String>) {
    match loaded {
        Ok(features) => {
            info!("{} data loaded: {} features", what, features.len());
            (features, None)
        }
        Err(e) => {
            error!("Error loading {} data: {:?}", what, e);
            (
                fallback(),
                Some(format!("Failed to load {} data. Using sample data.", what)),
            )
        }
    }
}

/// House and road sets, loaded once and shared read-only by every session.
#[derive(Clone, Debug, Default)]
pub struct EstateData {
    pub houses: Vec<HouseFeature>,
    pub roads: Vec<RoadFeature>,
}

impl EstateData {
    pub fn new(houses: Vec<HouseFeature>, roads: Vec<RoadFeature>) -> Self {
        EstateData { houses, roads }
    }

    /// Never fails: a dataset that can't be read is replaced by the sample
    /// set, and a warning for the user is returned alongside.
    pub fn load(config: &DatasetConfig) -> (Self, Vec<String>) {
        let (houses, house_warning) = with_fallback(
            load_houses(&config.houses_path),
            fallback_houses,
            "house",
        );
        let (roads, road_warning) =
            with_fallback(load_roads(&config.roads_path), fallback_roads, "road");
        let warnings = house_warning.into_iter().chain(road_warning).collect();
        (EstateData { houses, roads }, warnings)
    }

    pub fn fallback() -> Self {
        EstateData::new(fallback_houses(), fallback_roads())
    }

    /// Case-insensitive substring match on the house number, in dataset
    /// order, capped at `MAX_SUGGESTIONS`.
    pub fn suggest_houses(&self, query: &str) -> Vec<&HouseFeature> {
        let term = query.trim().to_uppercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.houses
            .iter()
            .filter(|house| house.house_number.to_uppercase().contains(&term))
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    pub fn find_house(&self, house_number: &str) -> Option<&HouseFeature> {
        let wanted = house_number.trim().to_uppercase();
        self.houses
            .iter()
            .find(|house| house.house_number.to_uppercase() == wanted)
    }

    pub fn find_road(&self, road_id: &str) -> Option<&RoadFeature> {
        self.roads.iter().find(|road| road.road_id == road_id)
    }
}
