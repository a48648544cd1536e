use std::collections::HashMap;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::*;
use crate::config::HistoryConfig;
use crate::error::GeocodeError;
use crate::model::{ItineraryLeg, Meal};
use crate::storage::{FileStore, MemoryStore};

const WAIT: Duration = Duration::from_secs(5);

struct PlacesGeocoder {
    places: HashMap<&'static str, Coords>,
}

impl Geocoder for PlacesGeocoder {
    fn resolve(&self, address: &str) -> Result<Option<Coords>, GeocodeError> {
        if address == "offline" {
            return Err(GeocodeError::Status(503));
        }
        Ok(self.places.get(address).copied())
    }
}

fn geocoder() -> Box<dyn Geocoder> {
    let places = [("NYC", (40.71, -74.01)), ("Boston", (42.36, -71.06)), ("Portland", (43.66, -70.26))]
        .into_iter()
        .map(|(name, (lat, lon))| (name, Coords::new(lat, lon).unwrap()))
        .collect();
    Box::new(PlacesGeocoder { places })
}

fn app_with(config: &Config, store: impl KeyValueStore + 'static) -> App {
    App::new(config, Box::new(store), geocoder())
}

fn app() -> App {
    app_with(&Config::default(), MemoryStore::new())
}

fn meal(desc: &str) -> Record {
    Record::Meal(Meal { date: "2024-06-01".to_string(), desc: desc.to_string() })
}

fn leg(start: &str, end: &str, hours: f64) -> Record {
    Record::Leg(ItineraryLeg::new("2024-06-01", start, end, hours))
}

fn draft(start: &str, end: &str) -> LegDraft {
    LegDraft { date: "2024-06-01".to_string(), start: start.to_string(), end: end.to_string(), hours: 4.5 }
}

fn press(app: &mut App, keys: &str) {
    for c in keys.chars() {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
}

fn press_code(app: &mut App, code: KeyCode) {
    app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

fn stored(app: &App, key: &str) -> Option<String> {
    app.persistence.store().get(key)
}

// === Undo ===

#[test]
fn test_undo_restores_state_after_previous_action() {
    let mut app = app();
    app.add_record(meal("a"));
    let c1 = app.collections.clone();
    app.add_record(meal("b"));

    app.undo();
    assert_eq!(app.collections, c1);
    assert_eq!(app.message.as_deref(), Some("Undone"));
}

#[test]
fn test_undo_with_short_history_is_noop() {
    let mut app = app();
    app.add_record(meal("a"));
    let before = app.collections.clone();

    app.undo();
    assert_eq!(app.collections, before);
    assert_eq!(app.history.len(), 1);
    assert_eq!(app.message.as_deref(), Some("Nothing to undo"));
}

#[test]
fn test_capture_before_keeps_legacy_timing() {
    let config = Config {
        history: HistoryConfig { capture: Capture::Before, ..HistoryConfig::default() },
        ..Config::default()
    };
    let mut app = app_with(&config, MemoryStore::new());
    app.add_record(meal("a"));
    app.add_record(meal("b"));
    assert_eq!(app.history.len(), 2);

    // pops the pre-b and pre-a snapshots, landing on the empty store
    app.undo();
    assert!(app.collections.is_empty());
    assert_eq!(app.history.len(), 0);
}

#[test]
fn test_undo_key_and_history_write_through() {
    let mut app = app();
    app.add_record(meal("a"));
    app.add_record(meal("b"));

    press(&mut app, "u");
    assert_eq!(app.collections.meals.len(), 1);
    assert_eq!(stored(&app, "history").as_deref(), Some("[]"));
    assert_eq!(stored(&app, "meals").map(|s| s.contains("\"a\"")), Some(true));
}

// === Store and totals ===

#[test]
fn test_totals_after_adds_and_delete() {
    let mut app = app();
    app.add_record(leg("NYC", "Boston", 4.5));
    assert_eq!(app.collections.totals_display(), "Total Hours: 4.5h");

    app.add_record(leg("Boston", "Portland", 3.0));
    assert_eq!(app.collections.totals_display(), "Total Hours: 7.5h");

    app.delete_at(EntityKind::Itinerary, 0, 1);
    assert_eq!(app.collections.totals_display(), "Total Hours: 3.0h");
    assert_eq!(app.collections.itinerary.len(), 1);
    assert_eq!(app.collections.itinerary[0].start, "Boston");
}

#[test]
fn test_every_action_is_written_through() {
    let mut app = app();
    app.add_record(meal("Lobster roll"));

    let meals = stored(&app, "meals").unwrap();
    assert!(meals.contains("Lobster roll"));
    assert_eq!(stored(&app, "version").as_deref(), Some("1"));
    assert!(!app.dirty);
}

#[test]
fn test_failed_write_keeps_memory_state() {
    let mut app = app_with(&Config::default(), MemoryStore::with_quota(10));
    app.add_record(meal("a"));

    assert_eq!(app.collections.meals.len(), 1);
    assert!(app.dirty);
    assert!(app.message.as_deref().unwrap().starts_with("Warning: not saved"));

    app.write();
    assert!(app.dirty);
}

#[test]
fn test_reopen_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let mut first = app_with(&Config::default(), FileStore::open(&path).unwrap());
    first.add_record(meal("a"));
    first.add_record(leg("NYC", "Boston", 4.5));
    let collections = first.collections.clone();
    drop(first);

    let second = app_with(&Config::default(), FileStore::open(&path).unwrap());
    assert_eq!(second.collections, collections);
    assert_eq!(second.history.len(), 2);
    assert!(second.history.can_undo());
}

// === Delete ===

#[test]
fn test_delete_reindexes_and_clamps_selection() {
    let mut app = app();
    for d in ["a", "b", "c"] {
        app.add_record(meal(d));
    }
    assert_eq!(app.selected(), 2);

    app.delete_at(EntityKind::Meals, 2, 1);
    assert_eq!(app.selected(), 1);
    app.delete_at(EntityKind::Meals, 0, 1);
    assert_eq!(app.collections.summaries(EntityKind::Meals), vec!["2024-06-01: b".to_string()]);
    assert_eq!(app.selected(), 0);
}

#[test]
fn test_out_of_range_delete_records_nothing() {
    let mut app = app();
    app.add_record(meal("a"));

    app.delete_at(EntityKind::Meals, 5, 1);
    assert_eq!(app.collections.meals.len(), 1);
    assert_eq!(app.history.len(), 1);
    assert_eq!(app.message.as_deref(), Some("No row 6 in Meals"));
}

#[test]
fn test_counted_delete_is_one_action() {
    let mut app = app();
    for d in ["a", "b", "c", "d"] {
        app.add_record(meal(d));
    }
    press(&mut app, "gg2dd");

    assert_eq!(app.collections.summaries(EntityKind::Meals).len(), 2);
    assert_eq!(app.collections.meals[0].desc, "c");
    assert_eq!(app.history.len(), 5);

    press(&mut app, "u");
    assert_eq!(app.collections.meals.len(), 4);
}

// === Legs and the map ===

#[test]
fn test_leg_lookup_then_store() {
    let mut app = app();
    app.submit_leg(draft("NYC", "Boston"));
    assert!(app.collections.itinerary.is_empty());

    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);

    let legs = &app.collections.itinerary;
    assert_eq!(legs.len(), 1);
    assert!(legs[0].start_coords.is_some() && legs[0].end_coords.is_some());
    assert_eq!(app.map.markers().len(), 2);
    assert_eq!(app.map.paths().count(), 1);
    assert!(stored(&app, "itinerary").unwrap().contains("startCoords"));
}

#[test]
fn test_unresolved_leg_is_still_stored() {
    let mut app = app();
    app.submit_leg(draft("Atlantis", "offline"));
    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);

    assert_eq!(app.collections.itinerary.len(), 1);
    assert_eq!(app.collections.itinerary[0].start_coords, None);
    assert!(app.map.markers().is_empty());
    assert!(app.message.as_deref().unwrap().contains("not all places found"));
}

#[test]
fn test_undo_resyncs_route() {
    let mut app = app();
    for (s, e) in [("NYC", "Boston"), ("Boston", "Portland")] {
        app.submit_leg(draft(s, e));
        let outcome = app.lookups.wait_next(WAIT).unwrap();
        app.apply_lookup(outcome);
    }
    assert_eq!(app.map.markers().len(), 4);

    app.undo();
    assert_eq!(app.map.markers().len(), 2);
    assert_eq!(app.map.paths().count(), 1);
}

fn located_app(legs: &[(&str, &str)]) -> App {
    let mut app = app();
    for (s, e) in legs {
        app.submit_leg(draft(s, e));
        let outcome = app.lookups.wait_next(WAIT).unwrap();
        app.apply_lookup(outcome);
    }
    app
}

#[test]
fn test_edit_replaces_leg_in_place() {
    let mut app = located_app(&[("NYC", "Boston"), ("Boston", "Portland")]);
    assert_eq!(app.history.len(), 2);

    app.edit_leg(0, draft("NYC", "Portland"));
    assert_eq!(app.collections.itinerary[0].end, "Boston");
    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);

    let legs = &app.collections.itinerary;
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].end, "Portland");
    assert_eq!(legs[0].end_coords, Coords::new(43.66, -70.26));
    assert_eq!(legs[1].start, "Boston");
    assert_eq!(app.history.len(), 3);
    assert_eq!(app.map.markers()[1].label, "End: Portland");
    assert!(app.message.as_deref().unwrap().starts_with("Updated"));
    assert!(stored(&app, "itinerary").unwrap().contains("\"start\":\"NYC\",\"end\":\"Portland\""));

    app.undo();
    assert_eq!(app.collections.itinerary[0].end, "Boston");
    assert_eq!(app.collections.itinerary.len(), 2);
    assert_eq!(app.map.markers()[1].label, "End: Boston");
    assert_eq!(app.map.paths().count(), 1);
}

#[test]
fn test_edit_follows_leg_after_earlier_delete() {
    let mut app = located_app(&[("NYC", "Boston"), ("Boston", "Portland")]);
    app.edit_leg(1, draft("Boston", "NYC"));
    app.delete_at(EntityKind::Itinerary, 0, 1);

    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);
    assert_eq!(app.collections.itinerary.len(), 1);
    assert_eq!(app.collections.itinerary[0].end, "NYC");
}

#[test]
fn test_edit_of_deleted_leg_is_added() {
    let mut app = located_app(&[("NYC", "Boston")]);
    app.edit_leg(0, draft("NYC", "Portland"));
    app.delete_at(EntityKind::Itinerary, 0, 1);

    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);
    assert_eq!(app.collections.itinerary.len(), 1);
    assert_eq!(app.collections.itinerary[0].end, "Portland");
    assert!(app.message.as_deref().unwrap().starts_with("Added"));
}

#[test]
fn test_edit_out_of_range_queues_nothing() {
    let mut app = app();
    app.edit_leg(0, draft("NYC", "Boston"));
    assert_eq!(app.pending_lookups(), 0);
    assert_eq!(app.message.as_deref(), Some("No row 1 in Itinerary"));
}

#[test]
fn test_edit_key_prefills_command_line() {
    let mut app = located_app(&[("NYC", "Boston")]);
    press(&mut app, "e");
    assert_eq!(app.mode, Mode::Command);
    assert_eq!(app.command_buffer(), "edit 1 | 2024-06-01 | NYC | Boston | 4.5");

    for _ in 0.." | 4.5".len() {
        press_code(&mut app, KeyCode::Backspace);
    }
    press(&mut app, " | 6");
    press_code(&mut app, KeyCode::Enter);
    assert_eq!(app.mode, Mode::Normal);

    let outcome = app.lookups.wait_next(WAIT).unwrap();
    app.apply_lookup(outcome);
    assert_eq!(app.collections.itinerary.len(), 1);
    assert_eq!(app.collections.itinerary[0].hours, 6.0);
}

#[test]
fn test_edit_key_only_on_itinerary() {
    let mut app = app();
    app.add_record(meal("a"));
    press(&mut app, "e");
    assert_eq!(app.mode, Mode::Normal);
    assert_eq!(app.message.as_deref(), Some("Only itinerary legs can be edited"));
}

// === Keys and commands ===

#[test]
fn test_command_line_adds_meal() {
    let mut app = app();
    press(&mut app, ":meal 2024-06-02 | Clam chowder");
    assert_eq!(app.mode, Mode::Command);
    press_code(&mut app, KeyCode::Enter);

    assert_eq!(app.mode, Mode::Normal);
    assert_eq!(app.tab, EntityKind::Meals);
    assert_eq!(app.collections.meals[0].desc, "Clam chowder");
}

#[test]
fn test_command_line_reports_parse_errors() {
    let mut app = app();
    press(&mut app, ":meal June | Pie");
    press_code(&mut app, KeyCode::Enter);
    assert!(app.collections.meals.is_empty());
    assert!(app.message.as_deref().unwrap().starts_with("Invalid meal date"));
}

#[test]
fn test_tab_switching() {
    let mut app = app();
    press_code(&mut app, KeyCode::Tab);
    assert_eq!(app.tab, EntityKind::Meals);
    press_code(&mut app, KeyCode::BackTab);
    press_code(&mut app, KeyCode::BackTab);
    assert_eq!(app.tab, EntityKind::Hotels);
    press_code(&mut app, KeyCode::F(3));
    assert_eq!(app.tab, EntityKind::Pois);
}

#[test]
fn test_quit_refused_while_dirty() {
    let mut app = app_with(&Config::default(), MemoryStore::with_quota(10));
    app.add_record(meal("a"));

    press(&mut app, "q");
    assert!(!app.should_quit);

    app.execute_command(Command::ForceQuit);
    assert!(app.should_quit);
}
