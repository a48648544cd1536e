use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Esc, or its terminal spelling Ctrl+[
pub fn is_escape(key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('[') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceAction {
    MoveToTop,
    DeleteRow,
    MoveDown,
    MoveUp,
}

/// Normal-mode sequences; a proper prefix of any of these keeps the buffer open
const SEQUENCES: [(&str, SequenceAction); 4] = [
    ("gg", SequenceAction::MoveToTop),
    ("dd", SequenceAction::DeleteRow),
    ("j", SequenceAction::MoveDown),
    ("k", SequenceAction::MoveUp),
];

const SEQUENCE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, PartialEq)]
pub enum KeyBufferResult {
    /// Completed sequence and its repeat count
    Action(SequenceAction, usize),
    Pending,
    /// Not part of a sequence; handle as a single key
    Fallthrough(KeyEvent, usize),
}

/// Collects a count prefix and multi-key sequences such as `3dd`
pub struct KeyBuffer {
    pending: String,
    count: Option<usize>,
    last_key: Instant,
}

impl KeyBuffer {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            count: None,
            last_key: Instant::now(),
        }
    }

    pub fn process(&mut self, key: KeyEvent) -> KeyBufferResult {
        if self.last_key.elapsed() > SEQUENCE_TIMEOUT {
            self.clear();
        }
        self.last_key = Instant::now();

        let plain = !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        let c = match key.code {
            KeyCode::Char(c) if plain => c,
            _ => return self.fall_through(key),
        };

        // '0' only extends a count that has already started
        if self.pending.is_empty() {
            if let Some(digit) = c.to_digit(10).filter(|d| *d != 0 || self.count.is_some()) {
                let count = self.count.unwrap_or(0);
                self.count = Some(count.saturating_mul(10).saturating_add(digit as usize));
                return KeyBufferResult::Pending;
            }
        }

        self.pending.push(c);
        if let Some((_, action)) = SEQUENCES.iter().find(|(seq, _)| *seq == self.pending) {
            let count = self.take_count();
            self.pending.clear();
            return KeyBufferResult::Action(*action, count);
        }
        if SEQUENCES.iter().any(|(seq, _)| seq.starts_with(self.pending.as_str())) {
            return KeyBufferResult::Pending;
        }
        self.fall_through(key)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.count = None;
    }

    /// Count and keys typed so far, for the status line
    pub fn display(&self) -> String {
        let count = self.count.map(|c| c.to_string()).unwrap_or_default();
        format!("{}{}", count, self.pending)
    }

    fn fall_through(&mut self, key: KeyEvent) -> KeyBufferResult {
        let count = self.take_count();
        self.pending.clear();
        KeyBufferResult::Fallthrough(key, count)
    }

    fn take_count(&mut self) -> usize {
        self.count.take().unwrap_or(1)
    }
}

/// Outcome of a key typed on the command line
#[derive(Debug, PartialEq, Eq)]
pub enum CommandInput {
    Editing,
    Cancelled,
    Submitted(String),
}

/// Command line editor with recall of earlier commands
pub struct CommandHandler {
    pub buffer: String,
    recall: Vec<String>,
    recall_idx: Option<usize>,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            recall: Vec::new(),
            recall_idx: None,
        }
    }

    pub fn start(&mut self) {
        self.start_with(String::new());
    }

    /// Open the command line with `text` already typed
    pub fn start_with(&mut self, text: String) {
        self.buffer = text;
        self.recall_idx = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> CommandInput {
        if is_escape(key) {
            self.buffer.clear();
            return CommandInput::Cancelled;
        }

        match key.code {
            KeyCode::Enter => {
                let cmd = std::mem::take(&mut self.buffer);
                if !cmd.trim().is_empty() && self.recall.last() != Some(&cmd) {
                    self.recall.push(cmd.clone());
                }
                self.recall_idx = None;
                CommandInput::Submitted(cmd)
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_none() {
                    return CommandInput::Cancelled;
                }
                CommandInput::Editing
            }
            KeyCode::Up => {
                if !self.recall.is_empty() {
                    let idx = match self.recall_idx {
                        Some(i) => i.saturating_sub(1),
                        None => self.recall.len() - 1,
                    };
                    self.recall_idx = Some(idx);
                    self.buffer = self.recall[idx].clone();
                }
                CommandInput::Editing
            }
            KeyCode::Down => {
                match self.recall_idx {
                    Some(i) if i + 1 < self.recall.len() => {
                        self.recall_idx = Some(i + 1);
                        self.buffer = self.recall[i + 1].clone();
                    }
                    _ => {
                        self.recall_idx = None;
                        self.buffer.clear();
                    }
                }
                CommandInput::Editing
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                CommandInput::Editing
            }
            _ => CommandInput::Editing,
        }
    }
}
