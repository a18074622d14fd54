use std::{collections::VecDeque, fs::File, io::BufReader, path::Path};

use anyhow::Result;
use chrono::{DateTime, Utc};
use gpx::read;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

use crate::geo_utils::GeoPoint;

/// Accuracy is capped for display; receivers often report huge radii on a
/// cold start.
pub const MAX_DISPLAY_ACCURACY_M: f64 = 20.0;

/// Nominal user equivalent range error of a consumer GPS receiver. GPX only
/// records HDOP, which is unitless, so `HDOP * UERE` stands in for the
/// horizontal accuracy in meters.
pub const NOMINAL_UERE_M: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp_ms: Option<i64>,
}

impl LocationFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// The only position the session keeps; every fix replaces it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct UserPosition {
    pub location: GeoPoint,
    pub accuracy_m: f64,
}

impl UserPosition {
    pub fn from_fix(fix: &LocationFix) -> Self {
        UserPosition {
            location: fix.point(),
            accuracy_m: fix
                .accuracy
                .map(|a| a.min(MAX_DISPLAY_ACCURACY_M))
                .unwrap_or(MAX_DISPLAY_ACCURACY_M),
        }
    }

    pub fn fallback(location: GeoPoint) -> Self {
        UserPosition {
            location,
            accuracy_m: MAX_DISPLAY_ACCURACY_M,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationError {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    UnknownError,
}

impl LocationError {
    /// Maps the W3C `GeolocationPositionError.code`.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::PositionUnavailable,
            3 => LocationError::Timeout,
            _ => LocationError::UnknownError,
        }
    }

    pub fn message(&self) -> String {
        let cause = match self {
            LocationError::PermissionDenied => {
                "Location permission denied. Please enable it in your browser settings."
            }
            LocationError::PositionUnavailable => "Location information unavailable.",
            LocationError::Timeout => "Location request timed out. Please try again.",
            LocationError::UnknownError => "An unknown error occurred.",
        };
        format!("Error getting your location: {}", cause)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LocationEvent {
    Fix(LocationFix),
    Failed(LocationError),
}

/// A subscription to position updates: an initial one-shot fix followed by
/// the continuous watch. Must be unsubscribed when the session ends.
pub trait LocationSource {
    fn next_event(&mut self) -> Option<LocationEvent>;
    fn unsubscribe(&mut self);
}

/// Replays a recorded GPX track as if it were a live receiver.
pub struct GpxReplaySource {
    events: VecDeque<LocationEvent>,
    subscribed: bool,
}

impl GpxReplaySource {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let gpx_data = read(BufReader::new(File::open(path)?))?;
        let mut events = VecDeque::new();
        for point in gpx_data
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
        {
            let timestamp = match &point.time {
                Some(time) => Some(DateTime::<Utc>::from(DateTime::parse_from_rfc3339(
                    &time.format()?,
                )?)),
                None => None,
            };
            events.push_back(LocationEvent::Fix(LocationFix {
                latitude: point.point().y(),
                longitude: point.point().x(),
                timestamp_ms: timestamp.map(|x| x.timestamp_millis()),
                accuracy: point.hdop.map(|hdop| hdop * NOMINAL_UERE_M),
            }));
        }
        info!("loaded {} fixes for replay", events.len());
        Ok(Self::from_events(events))
    }

    pub fn from_events(events: impl IntoIterator<Item = LocationEvent>) -> Self {
        GpxReplaySource {
            events: events.into_iter().collect(),
            subscribed: true,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl LocationSource for GpxReplaySource {
    fn next_event(&mut self) -> Option<LocationEvent> {
        if !self.subscribed {
            return None;
        }
        self.events.pop_front()
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
        self.events.clear();
    }
}
