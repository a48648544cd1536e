use serde::{Deserialize, Deserializer, Serialize};

/// A resolved (latitude, longitude) pair, stored on disk as `[lat, lon]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

impl Coords {
    /// Build a coordinate pair, rejecting anything outside the valid ranges
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.lat, self.lon).is_some()
    }
}

impl From<(f64, f64)> for Coords {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<Coords> for (f64, f64) {
    fn from(c: Coords) -> Self {
        (c.lat, c.lon)
    }
}

/// One travel leg of the itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryLeg {
    pub date: String,
    pub start: String,
    pub end: String,
    #[serde(default, deserialize_with = "hours_or_zero")]
    pub hours: f64,
    #[serde(rename = "startCoords", default, skip_serializing_if = "Option::is_none")]
    pub start_coords: Option<Coords>,
    #[serde(rename = "endCoords", default, skip_serializing_if = "Option::is_none")]
    pub end_coords: Option<Coords>,
}

impl ItineraryLeg {
    pub fn new(date: impl Into<String>, start: impl Into<String>, end: impl Into<String>, hours: f64) -> Self {
        Self {
            date: date.into(),
            start: start.into(),
            end: end.into(),
            hours,
            start_coords: None,
            end_coords: None,
        }
    }

    pub fn with_coords(mut self, start: Option<Coords>, end: Option<Coords>) -> Self {
        self.start_coords = start;
        self.end_coords = end;
        self
    }

    pub fn summary(&self) -> String {
        format!("{}: {} → {} ({}h)", self.date, self.start, self.end, self.hours)
    }
}

/// Older stores hold `null` where an hours field failed to parse
fn hours_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub date: String,
    pub desc: String,
}

impl Meal {
    pub fn summary(&self) -> String {
        format!("{}: {}", self.date, self.desc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PointOfInterest {
    pub fn summary(&self) -> String {
        match self.notes.as_deref() {
            Some(notes) if !notes.is_empty() => format!("{}: {} ({})", self.name, self.location, notes),
            _ => format!("{}: {}", self.name, self.location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelStay {
    pub checkin: String,
    pub checkout: String,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<String>,
}

impl HotelStay {
    pub fn summary(&self) -> String {
        let mut out = format!("{} → {}: {}, {}", self.checkin, self.checkout, self.name, self.address);
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.is_empty()) {
            out.push_str(&format!(", {}", phone));
        }
        if let Some(price) = self.price {
            out.push_str(&format!(", ${:.2}", price));
        }
        if let Some(conf) = self.conf.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!(", Conf: {}", conf));
        }
        out
    }
}

/// The four collections kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Itinerary,
    Meals,
    Pois,
    Hotels,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Itinerary,
        EntityKind::Meals,
        EntityKind::Pois,
        EntityKind::Hotels,
    ];

    /// Key of the collection in the persisted store
    pub fn key(&self) -> &'static str {
        match self {
            EntityKind::Itinerary => "itinerary",
            EntityKind::Meals => "meals",
            EntityKind::Pois => "pois",
            EntityKind::Hotels => "hotels",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Itinerary => "Itinerary",
            EntityKind::Meals => "Meals",
            EntityKind::Pois => "POIs",
            EntityKind::Hotels => "Hotels",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            EntityKind::Itinerary => 0,
            EntityKind::Meals => 1,
            EntityKind::Pois => 2,
            EntityKind::Hotels => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// A record of any kind, as produced by the input source
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Leg(ItineraryLeg),
    Meal(Meal),
    Poi(PointOfInterest),
    Hotel(HotelStay),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Leg(_) => EntityKind::Itinerary,
            Record::Meal(_) => EntityKind::Meals,
            Record::Poi(_) => EntityKind::Pois,
            Record::Hotel(_) => EntityKind::Hotels,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Record::Leg(leg) => leg.summary(),
            Record::Meal(meal) => meal.summary(),
            Record::Poi(poi) => poi.summary(),
            Record::Hotel(hotel) => hotel.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coords_range() {
        assert!(Coords::new(90.0, 180.0).is_some());
        assert!(Coords::new(-90.0, -180.0).is_some());
        assert!(Coords::new(90.1, 0.0).is_none());
        assert!(Coords::new(0.0, -180.5).is_none());
        assert!(Coords::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_leg_wire_names() {
        let leg = ItineraryLeg::new("2024-06-01", "NYC", "Boston", 4.5)
            .with_coords(Coords::new(40.7, -74.0), None);
        let json = serde_json::to_value(&leg).unwrap();

        assert_eq!(json["startCoords"], serde_json::json!([40.7, -74.0]));
        assert!(json.get("endCoords").is_none());
        assert_eq!(json["hours"], serde_json::json!(4.5));
    }

    #[test]
    fn test_legacy_empty_optionals_load() {
        let hotel: HotelStay = serde_json::from_str(
            r#"{"checkin":"2024-06-01","checkout":"2024-06-02","name":"Inn","address":"1 Main St","phone":"","conf":""}"#,
        )
        .unwrap();
        assert_eq!(hotel.phone.as_deref(), Some(""));
        assert_eq!(hotel.price, None);
        assert_eq!(hotel.summary(), "2024-06-01 → 2024-06-02: Inn, 1 Main St");
    }

    #[test]
    fn test_kind_cycle() {
        assert_eq!(EntityKind::Hotels.next(), EntityKind::Itinerary);
        assert_eq!(EntityKind::Itinerary.prev(), EntityKind::Hotels);
        assert_eq!(EntityKind::from_index(2), Some(EntityKind::Pois));
        assert_eq!(EntityKind::from_index(4), None);
    }

    #[test]
    fn test_null_hours_load_as_zero() {
        let leg: ItineraryLeg =
            serde_json::from_str(r#"{"date":"2024-06-01","start":"A","end":"B","hours":null}"#).unwrap();
        assert_eq!(leg.hours, 0.0);
        let leg: ItineraryLeg = serde_json::from_str(r#"{"date":"2024-06-01","start":"A","end":"B"}"#).unwrap();
        assert_eq!(leg.hours, 0.0);
    }
}
