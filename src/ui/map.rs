use std::collections::BTreeMap;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Map as WorldMap, MapResolution, Points},
        Block, Borders,
    },
    Frame,
};

use crate::model::Coords;
use crate::route::{Bounds, MapWidget, PathId};

const MAX_ZOOM: u8 = 18;

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub coords: Coords,
    pub label: String,
}

/// Map widget drawn with braille characters over a world outline.
/// The viewport is a lat/lon box; zoom `z` spans `360 / 2^z` degrees of
/// longitude and half that of latitude.
#[derive(Debug, Clone)]
pub struct TerminalMap {
    zoom: u8,
    viewport: Bounds,
    markers: Vec<MapMarker>,
    paths: BTreeMap<PathId, Vec<Coords>>,
    next_path: u64,
}

impl TerminalMap {
    pub fn new(center: Coords, zoom: u8) -> Self {
        let mut map = Self {
            zoom,
            viewport: view_bounds(center, zoom),
            markers: Vec::new(),
            paths: BTreeMap::new(),
            next_path: 0,
        };
        map.set_view(center, zoom);
        map
    }

    pub fn viewport(&self) -> Bounds {
        self.viewport
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn markers(&self) -> &[MapMarker] {
        &self.markers
    }

    pub fn paths(&self) -> impl Iterator<Item = &[Coords]> {
        self.paths.values().map(|p| p.as_slice())
    }
}

impl MapWidget for TerminalMap {
    fn set_view(&mut self, center: Coords, zoom: u8) {
        self.zoom = zoom.min(MAX_ZOOM);
        self.viewport = view_bounds(center, self.zoom);
    }

    fn add_marker(&mut self, coords: Coords, label: &str) {
        self.markers.push(MapMarker { coords, label: label.to_string() });
    }

    fn clear_markers(&mut self) {
        self.markers.clear();
    }

    fn draw_path(&mut self, coords: &[Coords]) -> PathId {
        self.next_path += 1;
        let id = PathId(self.next_path);
        self.paths.insert(id, coords.to_vec());
        id
    }

    fn remove_path(&mut self, path: PathId) {
        self.paths.remove(&path);
    }

    fn fit_bounds(&mut self, coords: &[Coords]) {
        let Some(bounds) = Bounds::of(coords) else {
            return;
        };
        let padded = bounds.padded(0.1, 1.0);
        self.zoom = zoom_for(&padded);
        self.viewport = padded;
    }
}

fn span_at(zoom: u8) -> (f64, f64) {
    let scale = f64::from(1u32 << zoom.min(MAX_ZOOM));
    (180.0 / scale, 360.0 / scale)
}

fn view_bounds(center: Coords, zoom: u8) -> Bounds {
    let (lat_span, lon_span) = span_at(zoom);
    Bounds {
        south: (center.lat - lat_span / 2.0).max(-90.0),
        north: (center.lat + lat_span / 2.0).min(90.0),
        west: (center.lon - lon_span / 2.0).max(-180.0),
        east: (center.lon + lon_span / 2.0).min(180.0),
    }
}

/// Deepest zoom whose view still covers `bounds`
fn zoom_for(bounds: &Bounds) -> u8 {
    let lat = bounds.north - bounds.south;
    let lon = bounds.east - bounds.west;
    (0..=MAX_ZOOM)
        .rev()
        .find(|z| {
            let (lat_span, lon_span) = span_at(*z);
            lat_span >= lat && lon_span >= lon
        })
        .unwrap_or(0)
}

pub fn render_map(frame: &mut Frame, map: &TerminalMap, area: Rect, pending: usize) {
    let view = map.viewport();
    let title = if pending > 0 {
        format!("Map (zoom {}, locating {}…)", map.zoom(), pending)
    } else {
        format!("Map (zoom {})", map.zoom())
    };
    let points: Vec<(f64, f64)> = map.markers().iter().map(|m| (m.coords.lon, m.coords.lat)).collect();

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([view.west, view.east])
        .y_bounds([view.south, view.north])
        .paint(|ctx| {
            ctx.draw(&WorldMap {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            for path in map.paths() {
                for pair in path.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].lon,
                        y1: pair[0].lat,
                        x2: pair[1].lon,
                        y2: pair[1].lat,
                        color: Color::Yellow,
                    });
                }
            }
            ctx.draw(&Points { coords: &points, color: Color::Red });
            for (i, m) in map.markers().iter().enumerate() {
                ctx.print(
                    m.coords.lon,
                    m.coords.lat,
                    Span::styled(
                        format!("{} {}", i + 1, m.label),
                        Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
                    ),
                );
            }
        });

    frame.render_widget(canvas, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coords {
        Coords::new(lat, lon).unwrap()
    }

    #[test]
    fn test_initial_view() {
        let map = TerminalMap::new(c(39.5, -98.35), 4);
        let v = map.viewport();
        assert!((v.west - (-98.35 - 11.25)).abs() < 1e-9);
        assert!((v.north - (39.5 + 5.625)).abs() < 1e-9);
        assert_eq!(map.zoom(), 4);
    }

    #[test]
    fn test_fit_bounds_covers_points() {
        let mut map = TerminalMap::new(c(0.0, 0.0), 2);
        let pts = [c(40.7, -74.0), c(42.4, -71.1), c(43.7, -70.3)];
        map.fit_bounds(&pts);

        let v = map.viewport();
        for p in pts {
            assert!(p.lat >= v.south && p.lat <= v.north);
            assert!(p.lon >= v.west && p.lon <= v.east);
        }
        assert!(map.zoom() > 2);
    }

    #[test]
    fn test_fit_bounds_empty_keeps_view() {
        let mut map = TerminalMap::new(c(10.0, 10.0), 5);
        let before = map.viewport();
        map.fit_bounds(&[]);
        assert_eq!(map.viewport(), before);
    }

    #[test]
    fn test_paths_and_markers() {
        let mut map = TerminalMap::new(c(0.0, 0.0), 1);
        map.add_marker(c(1.0, 1.0), "Start: Here");
        let id = map.draw_path(&[c(1.0, 1.0), c(2.0, 2.0)]);
        assert_eq!(map.paths().count(), 1);
        assert_eq!(map.markers()[0].label, "Start: Here");

        map.remove_path(id);
        map.clear_markers();
        assert_eq!(map.paths().count(), 0);
        assert!(map.markers().is_empty());
    }

    #[test]
    fn test_zoom_for_world() {
        let world = Bounds { south: -90.0, west: -180.0, north: 90.0, east: 180.0 };
        assert_eq!(zoom_for(&world), 0);
    }

    #[test]
    fn test_render_shows_marker_labels() {
        use ratatui::{backend::TestBackend, Terminal};

        let mut map = TerminalMap::new(c(40.0, -74.0), 4);
        map.add_marker(c(40.0, -74.0), "Start: NYC");

        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|f| render_map(f, &map, f.size(), 0)).unwrap();
        let text: String = terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("1 Start: NYC"));
    }
}
