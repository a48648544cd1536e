pub mod collections;
pub mod history;

pub use collections::Collections;
pub use history::{Capture, History, Snapshot, UndoPolicy};
