use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{EstateBounds, GeoPoint, DEFAULT_MAX_SNAP_DISTANCE_M};

/// Everything the navigator needs to know about the deployment. Every field
/// has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub estate: EstateConfig,
    pub datasets: DatasetConfig,
    pub navigation: NavigationConfig,
    pub routing: RoutingConfig,
    pub geocoding: GeocodingConfig,
    pub speech: SpeechConfig,
    pub map: MapConfig,
    pub server: ServerConfig,
}

impl NavConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: NavConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.estate.bounds.validate()?;
        if self.estate.max_snap_distance_m < 0.0 {
            bail!("`max_snap_distance_m` must not be negative");
        }
        self.navigation.validate()?;
        if self.routing.timeout_ms == 0 || self.geocoding.timeout_ms == 0 {
            bail!("service timeouts must be positive");
        }
        if self.server.session_idle_secs == 0 {
            bail!("`session_idle_secs` must be positive");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstateConfig {
    pub bounds: EstateBounds,
    /// Road whose middle vertex is used as an intermediate waypoint when
    /// both ends of a route lie inside the estate.
    pub main_road_id: String,
    pub max_snap_distance_m: f64,
}

impl Default for EstateConfig {
    fn default() -> Self {
        EstateConfig {
            bounds: EstateBounds::default(),
            main_road_id: "R1".to_owned(),
            max_snap_distance_m: DEFAULT_MAX_SNAP_DISTANCE_M,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub houses_path: String,
    pub roads_path: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            houses_path: "POINTS.json".to_owned(),
            roads_path: "ROAD.json".to_owned(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub announce_radius_m: f64,
    pub look_ahead_radius_m: f64,
    pub arrival_radius_m: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            announce_radius_m: 50.0,
            look_ahead_radius_m: 150.0,
            arrival_radius_m: 20.0,
        }
    }
}

impl NavigationConfig {
    fn validate(&self) -> Result<()> {
        let radii = [
            self.announce_radius_m,
            self.look_ahead_radius_m,
            self.arrival_radius_m,
        ];
        if radii.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            bail!("navigation radii must be positive: {:?}", self);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub service_url: String,
    pub profile: String,
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            service_url: "https://router.project-osrm.org/route/v1".to_owned(),
            profile: "driving".to_owned(),
            timeout_ms: 5000,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub service_url: String,
    /// Appended to every free-text query to keep results in the estate's region.
    pub region_suffix: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig {
            service_url: "https://nominatim.openstreetmap.org/search".to_owned(),
            region_suffix: " Ghana".to_owned(),
            user_agent: "DevtracoNavigation/1.0".to_owned(),
            timeout_ms: 10000,
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub mobile_rate: f32,
    pub mobile_volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            lang: "en-US".to_owned(),
            rate: 0.9,
            pitch: 1.1,
            mobile_rate: 1.0,
            mobile_volume: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub initial_center: GeoPoint,
    pub initial_zoom: u8,
    /// Used when the location source fails.
    pub default_position: GeoPoint,
    pub follow_zoom: u8,
    pub house_zoom: u8,
    pub layers: Vec<TileLayer>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    /// Drawn bottom to top.
    pub urls: Vec<String>,
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            initial_center: GeoPoint::new(5.7328, 0.0447),
            initial_zoom: 14,
            default_position: GeoPoint::new(5.7328, 0.0447),
            follow_zoom: 15,
            house_zoom: 18,
            layers: vec![
                TileLayer {
                    name: "Street".to_owned(),
                    urls: vec!["https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_owned()],
                    attribution: "© OpenStreetMap contributors".to_owned(),
                },
                TileLayer {
                    name: "Satellite with Labels".to_owned(),
                    urls: vec![
                        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}".to_owned(),
                        "https://{s}.basemaps.cartocdn.com/light_only_labels/{z}/{x}/{y}.png".to_owned(),
                    ],
                    attribution: "© Esri, Maxar, Earthstar Geographics, © CartoDB".to_owned(),
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
    /// Sessions without a request for this long are dropped. Browsers
    /// closing a tab rarely manage to send the DELETE.
    pub session_idle_secs: u64,
}

impl ServerConfig {
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_owned(),
            port: 0,
            session_idle_secs: 30 * 60,
        }
    }
}
