use tracing::trace;

use crate::model::{Coords, ItineraryLeg};

/// Handle to a path drawn on a map widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(pub u64);

/// The map operations the route renderer drives
pub trait MapWidget {
    fn set_view(&mut self, center: Coords, zoom: u8);
    fn add_marker(&mut self, coords: Coords, label: &str);
    fn clear_markers(&mut self);
    fn draw_path(&mut self, coords: &[Coords]) -> PathId;
    fn remove_path(&mut self, path: PathId);
    fn fit_bounds(&mut self, coords: &[Coords]);
}

/// Smallest box containing a set of coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn of(coords: &[Coords]) -> Option<Self> {
        let first = coords.first()?;
        let init = Bounds { south: first.lat, west: first.lon, north: first.lat, east: first.lon };
        Some(coords.iter().skip(1).fold(init, |b, c| Bounds {
            south: b.south.min(c.lat),
            west: b.west.min(c.lon),
            north: b.north.max(c.lat),
            east: b.east.max(c.lon),
        }))
    }

    pub fn center(&self) -> Coords {
        Coords {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }

    /// Grow each side by `fraction` of the span, with at least `min_span`
    /// degrees in each direction, clamped to valid ranges
    pub fn padded(&self, fraction: f64, min_span: f64) -> Self {
        let lat_span = (self.north - self.south).max(min_span);
        let lon_span = (self.east - self.west).max(min_span);
        let center = self.center();
        let half_lat = lat_span * (0.5 + fraction);
        let half_lon = lon_span * (0.5 + fraction);
        Bounds {
            south: (center.lat - half_lat).max(-90.0),
            north: (center.lat + half_lat).min(90.0),
            west: (center.lon - half_lon).max(-180.0),
            east: (center.lon + half_lon).min(180.0),
        }
    }
}

/// Labelled stops of the route, in leg order: each leg's start then end,
/// skipping anything unresolved or out of range
pub fn route_stops(legs: &[ItineraryLeg]) -> Vec<(Coords, String)> {
    legs.iter()
        .flat_map(|leg| {
            [
                (leg.start_coords, format!("Start: {}", leg.start)),
                (leg.end_coords, format!("End: {}", leg.end)),
            ]
        })
        .filter_map(|(coords, label)| coords.filter(Coords::is_valid).map(|c| (c, label)))
        .collect()
}

pub fn route_points(legs: &[ItineraryLeg]) -> Vec<Coords> {
    route_stops(legs).into_iter().map(|(coords, _)| coords).collect()
}

/// Keeps a map widget in step with the itinerary
#[derive(Debug, Default)]
pub struct RouteRenderer {
    path: Option<PathId>,
}

impl RouteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redraw markers and path from scratch for the given legs
    pub fn sync(&mut self, map: &mut dyn MapWidget, legs: &[ItineraryLeg]) {
        map.clear_markers();
        if let Some(path) = self.path.take() {
            map.remove_path(path);
        }

        let stops = route_stops(legs);
        for (coords, label) in &stops {
            map.add_marker(*coords, label);
        }
        let points: Vec<Coords> = stops.into_iter().map(|(coords, _)| coords).collect();

        if !points.is_empty() {
            self.path = Some(map.draw_path(&points));
            map.fit_bounds(&points);
        }
        trace!(markers = points.len(), "route synced");
    }

    #[cfg(test)]
    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }
}
