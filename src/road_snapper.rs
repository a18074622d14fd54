use crate::config::EstateConfig;
use crate::estate_data::EstateData;
use crate::geo_utils::{find_nearest_road_point, GeoPoint};

/// Waypoints for the routing service plus what to tell the user about how
/// the ends were placed.
#[derive(Clone, Debug, PartialEq)]
pub struct Waypoints {
    pub points: Vec<GeoPoint>,
    pub narration: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum End {
    Start,
    Destination,
}

pub struct RoadSnapper<'a> {
    data: &'a EstateData,
    config: &'a EstateConfig,
}

impl<'a> RoadSnapper<'a> {
    pub fn new(data: &'a EstateData, config: &'a EstateConfig) -> Self {
        RoadSnapper { data, config }
    }

    pub fn is_in_estate(&self, point: &GeoPoint) -> bool {
        self.config.bounds.contains(point)
    }

    // The routing service computes the real path; this only decides which
    // points it has to pass through.
    pub fn build_waypoints(&self, start: GeoPoint, end: GeoPoint) -> Waypoints {
        let mut points = Vec::with_capacity(3);
        let mut narration = Vec::new();

        points.push(self.snap(start, End::Start, &mut narration));

        if self.is_in_estate(&start) && self.is_in_estate(&end) {
            match self
                .data
                .find_road(&self.config.main_road_id)
                .and_then(|road| road.midpoint_vertex())
            {
                Some(midpoint) => points.push(midpoint),
                None => debug!(
                    "main road `{}` not available, no intermediate waypoint",
                    self.config.main_road_id
                ),
            }
        }

        points.push(self.snap(end, End::Destination, &mut narration));

        Waypoints { points, narration }
    }

    fn snap(&self, point: GeoPoint, end: End, narration: &mut Vec<String>) -> GeoPoint {
        if !self.is_in_estate(&point) {
            return point;
        }
        let nearest =
            find_nearest_road_point(&self.data.roads, &point, self.config.max_snap_distance_m);
        match nearest.point {
            Some(snapped) if nearest.distance_m <= self.config.max_snap_distance_m => {
                narration.push(match end {
                    End::Start => format!("Starting from {}", nearest.road_name),
                    End::Destination => format!("Heading to {}", nearest.road_name),
                });
                snapped
            }
            _ => {
                narration.push(
                    match end {
                        End::Start => "Starting from your current location, no nearby road found.",
                        End::Destination => "Heading to destination, no nearby road found.",
                    }
                    .to_owned(),
                );
                point
            }
        }
    }
}
