use std::io;
use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};

use crate::clipboard;
use crate::command::Command;
use crate::config::Config;
use crate::geocode::Geocoder;
use crate::input::{is_escape, CommandHandler, CommandInput, KeyBuffer, KeyBufferResult, SequenceAction};
use crate::lookup::{LegDraft, LookupOutcome, LookupQueue, Placement};
use crate::mode::Mode;
use crate::model::{Coords, EntityKind, ItineraryLeg, Record};
use crate::persist::Persistence;
use crate::route::{route_points, MapWidget, RouteRenderer};
use crate::state::{Capture, Collections, History};
use crate::storage::KeyValueStore;
use crate::ui;
use crate::ui::map::TerminalMap;

#[cfg(test)]
mod test;

pub struct App {
    pub collections: Collections,
    pub history: History,
    pub map: TerminalMap,
    pub mode: Mode,
    pub tab: EntityKind,
    /// Last write failed; in-memory state is ahead of the store
    pub dirty: bool,
    pub message: Option<String>,
    pub should_quit: bool,
    capture: Capture,
    home: (Coords, u8),
    selected: [usize; 4],
    persistence: Persistence,
    lookups: LookupQueue,
    route: RouteRenderer,
    key_buffer: KeyBuffer,
    command_handler: CommandHandler,
}

impl App {
    pub fn new(config: &Config, store: Box<dyn KeyValueStore>, geocoder: Box<dyn Geocoder>) -> Self {
        let mut persistence = Persistence::new(store);
        let loaded = persistence.load();

        let mut history = config.history.build();
        history.restore_entries(loaded.snapshots);

        let home = (config.map.center(), config.map.zoom);
        let mut app = Self {
            collections: loaded.collections,
            history,
            map: TerminalMap::new(home.0, home.1),
            mode: Mode::Normal,
            tab: EntityKind::Itinerary,
            dirty: false,
            message: None,
            should_quit: false,
            capture: config.history.capture,
            home,
            selected: [0; 4],
            persistence,
            lookups: LookupQueue::spawn(geocoder),
            route: RouteRenderer::new(),
            key_buffer: KeyBuffer::new(),
            command_handler: CommandHandler::new(),
        };
        app.route.sync(&mut app.map, &app.collections.itinerary);

        if !loaded.warnings.is_empty() {
            app.message = Some(loaded.warnings.join("; "));
        } else if app.collections.is_empty() {
            app.message = Some("Empty trip. Start with :leg DATE | START | END | HOURS".to_string());
        }
        info!(
            legs = app.collections.itinerary.len(),
            history = app.history.len(),
            capture = ?app.capture,
            "trip loaded"
        );
        app
    }

    // Accessor methods for UI
    pub fn command_buffer(&self) -> &str {
        &self.command_handler.buffer
    }

    pub fn key_buffer_display(&self) -> String {
        self.key_buffer.display()
    }

    pub fn pending_lookups(&self) -> usize {
        self.lookups.pending()
    }

    pub fn selected(&self) -> usize {
        self.selected[self.tab.index()]
    }

    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        while !self.should_quit {
            self.poll_lookups();

            terminal.draw(|f| ui::render(f, self))?;

            if poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.message = None;
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    // === State changes ===

    /// Apply one user action to the collections, taking a history snapshot
    /// at the configured point
    fn mutate<R>(&mut self, change: impl FnOnce(&mut Collections) -> R) -> R {
        if self.capture == Capture::Before {
            self.history.record(&self.collections);
        }
        let out = change(&mut self.collections);
        if self.capture == Capture::After {
            self.history.record(&self.collections);
        }
        out
    }

    /// Write through, redraw the route and report `message` unless the write failed
    fn commit(&mut self, message: String) {
        self.route.sync(&mut self.map, &self.collections.itinerary);
        self.message = Some(message);
        self.save();
    }

    fn save(&mut self) -> bool {
        match self.persistence.save(&self.collections, &self.history) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to write store, keeping changes in memory");
                self.dirty = true;
                self.message = Some(format!("Warning: not saved: {}", e));
                false
            }
        }
    }

    pub fn add_record(&mut self, record: Record) {
        let kind = record.kind();
        let summary = record.summary();
        self.mutate(|c| c.add(record));

        self.tab = kind;
        self.selected[kind.index()] = self.collections.len(kind).saturating_sub(1);
        debug!(kind = kind.key(), "record added");
        self.commit(format!("Added: {}", summary));
    }

    /// Queue a leg for geocoding; it is stored once the lookup finishes
    pub fn submit_leg(&mut self, draft: LegDraft) {
        let label = format!("{} → {}", draft.start, draft.end);
        let ticket = self.lookups.submit(draft);
        debug!(ticket, "leg submitted");
        self.message = Some(format!("Locating {}…", label));
    }

    pub fn poll_lookups(&mut self) {
        for outcome in self.lookups.poll() {
            self.apply_lookup(outcome);
        }
    }

    /// Queue a replacement for leg `idx`; it takes the leg's place once looked up
    pub fn edit_leg(&mut self, idx: usize, draft: LegDraft) {
        let Some(original) = self.collections.itinerary.get(idx).cloned() else {
            self.message = Some(format!("No row {} in {}", idx + 1, EntityKind::Itinerary.display_name()));
            return;
        };
        let label = format!("{} → {}", draft.start, draft.end);
        let ticket = self.lookups.submit_at(draft, Placement::Replace { index: idx, original });
        debug!(ticket, row = idx, "leg edit submitted");
        self.message = Some(format!("Locating {}…", label));
    }

    /// Open the command line with the selected leg ready to edit
    fn begin_edit(&mut self) {
        if self.tab != EntityKind::Itinerary {
            self.message = Some("Only itinerary legs can be edited".to_string());
            return;
        }
        let idx = self.selected();
        let Some(leg) = self.collections.itinerary.get(idx) else {
            self.message = Some("Nothing to edit".to_string());
            return;
        };
        let line = format!("edit {} | {} | {} | {} | {}", idx + 1, leg.date, leg.start, leg.end, leg.hours);
        self.key_buffer.clear();
        self.command_handler.start_with(line);
        self.mode = Mode::Command;
    }

    /// Where `original` sits now, preferring its old index
    fn locate_leg(&self, index: usize, original: &ItineraryLeg) -> Option<usize> {
        let legs = &self.collections.itinerary;
        if legs.get(index) == Some(original) {
            return Some(index);
        }
        legs.iter().position(|leg| leg == original)
    }

    pub fn apply_lookup(&mut self, outcome: LookupOutcome) {
        let LookupOutcome { ticket, leg, placement } = outcome;
        let located = leg.start_coords.is_some() && leg.end_coords.is_some();
        let summary = leg.summary();

        let target = match &placement {
            Placement::Append => None,
            Placement::Replace { index, original } => {
                let found = self.locate_leg(*index, original);
                if found.is_none() {
                    warn!(ticket, row = index, "edited leg no longer present, adding as new");
                }
                found
            }
        };
        let idx = self.mutate(|c| match target {
            Some(i) => {
                c.itinerary[i] = leg;
                i
            }
            None => {
                c.itinerary.push(leg);
                c.itinerary.len() - 1
            }
        });

        self.selected[EntityKind::Itinerary.index()] = idx;
        info!(ticket, located, replaced = target.is_some(), "leg stored");
        let verb = if target.is_some() { "Updated" } else { "Added" };
        if located {
            self.commit(format!("{}: {}", verb, summary));
        } else {
            self.commit(format!("{}: {} (not all places found on the map)", verb, summary));
        }
    }

    /// Remove `count` rows of `kind` starting at `idx`, as one undoable action
    pub fn delete_at(&mut self, kind: EntityKind, idx: usize, count: usize) {
        let len = self.collections.len(kind);
        if idx >= len {
            self.message = Some(format!("No row {} in {}", idx + 1, kind.display_name()));
            return;
        }
        let n = count.max(1).min(len - idx);
        self.mutate(|c| {
            for _ in 0..n {
                c.remove_at(kind, idx);
            }
        });

        self.clamp_selection();
        if n == 1 {
            self.commit(format!("Deleted row {}", idx + 1));
        } else {
            self.commit(format!("Deleted {} rows", n));
        }
    }

    pub fn delete_selected(&mut self, count: usize) {
        self.delete_at(self.tab, self.selected(), count);
    }

    pub fn undo(&mut self) {
        match self.history.undo() {
            Some(collections) => {
                self.collections = collections;
                self.clamp_selection();
                info!(history = self.history.len(), "undo");
                self.commit("Undone".to_string());
            }
            None => self.message = Some("Nothing to undo".to_string()),
        }
    }

    /// Retry a failed write
    pub fn write(&mut self) {
        if self.save() {
            self.message = Some("Saved".to_string());
        }
    }

    fn fit(&mut self) {
        let points = route_points(&self.collections.itinerary);
        if points.is_empty() {
            self.map.set_view(self.home.0, self.home.1);
        } else {
            self.map.fit_bounds(&points);
        }
    }

    fn copy_current(&mut self) {
        self.message = Some(match clipboard::copy_list(&self.collections, self.tab) {
            Ok(msg) => msg,
            Err(e) => e,
        });
    }

    fn quit(&mut self, force: bool) {
        let pending = self.lookups.pending();
        if force {
            if pending > 0 {
                warn!(pending, "quitting with lookups in flight");
            }
            self.should_quit = true;
        } else if self.dirty {
            self.message = Some("Unsaved changes! Use :w to retry or :q! to force quit".to_string());
        } else if pending > 0 {
            self.message = Some(format!("Still locating {} leg(s)! Use :q! to force quit", pending));
        } else {
            self.should_quit = true;
        }
    }

    fn clamp_selection(&mut self) {
        for kind in EntityKind::ALL {
            let len = self.collections.len(kind);
            let sel = &mut self.selected[kind.index()];
            *sel = (*sel).min(len.saturating_sub(1));
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.collections.len(self.tab);
        let sel = &mut self.selected[self.tab.index()];
        *sel = sel.saturating_add_signed(delta).min(len.saturating_sub(1));
    }

    // === Key handling ===

    fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_normal_mode(key),
            Mode::Command => self.handle_command_mode(key),
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) {
        match self.key_buffer.process(key) {
            KeyBufferResult::Action(action, count) => self.execute_sequence_action(action, count),
            KeyBufferResult::Pending => {}
            KeyBufferResult::Fallthrough(key, count) => self.handle_normal_key(key, count),
        }
    }

    fn execute_sequence_action(&mut self, action: SequenceAction, count: usize) {
        match action {
            SequenceAction::MoveToTop => self.selected[self.tab.index()] = 0,
            SequenceAction::DeleteRow => self.delete_selected(count),
            SequenceAction::MoveDown => self.move_selection(count as isize),
            SequenceAction::MoveUp => self.move_selection(-(count as isize)),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, count: usize) {
        if is_escape(key) {
            self.key_buffer.clear();
            return;
        }
        match key.code {
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::F(n) => {
                if let Some(kind) = EntityKind::from_index(usize::from(n).wrapping_sub(1)) {
                    self.tab = kind;
                }
            }
            KeyCode::Down => self.move_selection(count as isize),
            KeyCode::Up => self.move_selection(-(count as isize)),
            KeyCode::Char('G') | KeyCode::End => {
                self.selected[self.tab.index()] = self.collections.len(self.tab).saturating_sub(1);
            }
            KeyCode::Home => self.selected[self.tab.index()] = 0,
            KeyCode::Char('u') => self.undo(),
            KeyCode::Char('e') => self.begin_edit(),
            KeyCode::Char(':') => {
                self.key_buffer.clear();
                self.command_handler.start();
                self.mode = Mode::Command;
            }
            KeyCode::Char('q') => self.quit(false),
            _ => {}
        }
    }

    fn handle_command_mode(&mut self, key: KeyEvent) {
        match self.command_handler.handle_key(key) {
            CommandInput::Editing => {}
            CommandInput::Cancelled => self.mode = Mode::Normal,
            CommandInput::Submitted(line) => {
                self.mode = Mode::Normal;
                match Command::parse(&line) {
                    Ok(cmd) => self.execute_command(cmd),
                    Err(e) => self.message = Some(e),
                }
            }
        }
    }

    pub fn execute_command(&mut self, cmd: Command) {
        match cmd {
            Command::AddLeg(draft) => self.submit_leg(draft),
            Command::EditLeg(idx, draft) => self.edit_leg(idx, draft),
            Command::Add(record) => self.add_record(record),
            Command::Delete(Some(idx)) => self.delete_at(self.tab, idx, 1),
            Command::Delete(None) => self.delete_selected(1),
            Command::Undo => self.undo(),
            Command::Write => self.write(),
            Command::Quit => self.quit(false),
            Command::ForceQuit => self.quit(true),
            Command::Clip => self.copy_current(),
            Command::Fit => self.fit(),
            Command::Unknown(s) if s.is_empty() => {}
            Command::Unknown(s) => self.message = Some(format!("Unknown command: {}", s)),
        }
    }
}
