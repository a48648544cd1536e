use serde::{Deserialize, Serialize};

use crate::model::{EntityKind, HotelStay, ItineraryLeg, Meal, PointOfInterest, Record};

/// The four ordered entity collections. Position is identity: removing an
/// entry shifts everything after it down by one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub itinerary: Vec<ItineraryLeg>,
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub pois: Vec<PointOfInterest>,
    #[serde(default)]
    pub hotels: Vec<HotelStay>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the collection of its kind
    pub fn add(&mut self, record: Record) {
        match record {
            Record::Leg(leg) => self.itinerary.push(leg),
            Record::Meal(meal) => self.meals.push(meal),
            Record::Poi(poi) => self.pois.push(poi),
            Record::Hotel(hotel) => self.hotels.push(hotel),
        }
    }

    /// Remove the entry at `idx`, returning it. Out of range is a no-op.
    pub fn remove_at(&mut self, kind: EntityKind, idx: usize) -> Option<Record> {
        if idx >= self.len(kind) {
            return None;
        }
        let removed = match kind {
            EntityKind::Itinerary => Record::Leg(self.itinerary.remove(idx)),
            EntityKind::Meals => Record::Meal(self.meals.remove(idx)),
            EntityKind::Pois => Record::Poi(self.pois.remove(idx)),
            EntityKind::Hotels => Record::Hotel(self.hotels.remove(idx)),
        };
        Some(removed)
    }

    /// All entries of one kind, in display order
    pub fn get_all(&self, kind: EntityKind) -> Vec<Record> {
        match kind {
            EntityKind::Itinerary => self.itinerary.iter().cloned().map(Record::Leg).collect(),
            EntityKind::Meals => self.meals.iter().cloned().map(Record::Meal).collect(),
            EntityKind::Pois => self.pois.iter().cloned().map(Record::Poi).collect(),
            EntityKind::Hotels => self.hotels.iter().cloned().map(Record::Hotel).collect(),
        }
    }

    /// One display line per entry of `kind`
    pub fn summaries(&self, kind: EntityKind) -> Vec<String> {
        self.get_all(kind).iter().map(Record::summary).collect()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Itinerary => self.itinerary.len(),
            EntityKind::Meals => self.meals.len(),
            EntityKind::Pois => self.pois.len(),
            EntityKind::Hotels => self.hotels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|k| self.len(*k) == 0)
    }

    /// Sum of driving hours over all legs
    pub fn total_hours(&self) -> f64 {
        self.itinerary.iter().map(|leg| leg.hours).sum()
    }

    pub fn totals_display(&self) -> String {
        format!("Total Hours: {:.1}h", self.total_hours())
    }
}
