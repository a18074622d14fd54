use anyhow::Result;
use geo::{Distance, Haversine};
use serde::{Deserialize, Serialize};

use crate::estate_data::RoadFeature;

/// Max snapping distance in meters.
pub const DEFAULT_MAX_SNAP_DISTANCE_M: f64 = 50.0;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    // GeoJSON stores positions as `[lon, lat, (alt)]`.
    pub fn from_lon_lat(coordinates: &[f64]) -> Option<Self> {
        match coordinates {
            [lon, lat, ..] if lat.is_finite() && lon.is_finite() => Some(GeoPoint::new(*lat, *lon)),
            _ => None,
        }
    }

    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        Haversine.distance(geo_types::Point::from(*self), geo_types::Point::from(*other))
    }
}

impl From<GeoPoint> for geo_types::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo_types::Point::new(p.lon, p.lat)
    }
}

impl From<geo_types::Point<f64>> for GeoPoint {
    fn from(p: geo_types::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}

/// Axis-aligned rectangle covering the estate. Bounds are inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstateBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl EstateBounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let bounds = EstateBounds {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_lat <= self.max_lat && self.min_lon <= self.max_lon) {
            bail!("invalid estate bounds: {:?}", self);
        }
        Ok(())
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

impl Default for EstateBounds {
    // Devtraco estate, derived from the extent of POINTS.json
    fn default() -> Self {
        EstateBounds {
            min_lat: 5.7260,
            max_lat: 5.7400,
            min_lon: 0.0390,
            max_lon: 0.0500,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadSnap {
    pub point: Option<GeoPoint>,
    pub road_name: String,
    pub distance_m: f64,
}

impl RoadSnap {
    fn none() -> Self {
        RoadSnap {
            point: None,
            road_name: String::new(),
            distance_m: f64::INFINITY,
        }
    }
}

/// Scans every vertex of every road and returns the closest one within
/// `max_snap_distance_m`. Equal distances keep the vertex seen first, so the
/// result follows dataset order.
pub fn find_nearest_road_point(
    roads: &[RoadFeature],
    point: &GeoPoint,
    max_snap_distance_m: f64,
) -> RoadSnap {
    let mut nearest = RoadSnap::none();
    for road in roads {
        for vertex in &road.polyline {
            let distance = point.distance_m(vertex);
            if distance < nearest.distance_m && distance <= max_snap_distance_m {
                nearest.distance_m = distance;
                nearest.point = Some(*vertex);
                nearest.road_name = road.display_name().to_owned();
            }
        }
    }
    nearest
}
