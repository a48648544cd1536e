use tracing::debug;

use crate::model::EntityKind;
use crate::state::Collections;

/// Plain-text rendering of one list, one numbered entry per line
pub fn list_text(collections: &Collections, kind: EntityKind) -> String {
    let mut lines: Vec<String> = collections
        .summaries(kind)
        .into_iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect();
    if kind == EntityKind::Itinerary && !lines.is_empty() {
        lines.push(collections.totals_display());
    }
    lines.join("\n")
}

/// Copy a list to the system clipboard, returning a status message
pub fn copy_list(collections: &Collections, kind: EntityKind) -> Result<String, String> {
    let count = collections.len(kind);
    if count == 0 {
        return Err(format!("{} is empty", kind.display_name()));
    }
    copy_to_system_clipboard(&list_text(collections, kind))?;
    Ok(format!("Copied {} {} entries", count, kind.display_name()))
}

/// Clipboard commands tried in order on Linux, before arboard
#[cfg(target_os = "linux")]
const CLIPBOARD_TOOLS: [(&str, &[&str]); 3] = [
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Feed `text` to a clipboard tool's stdin; false if it is missing or fails
#[cfg(target_os = "linux")]
fn pipe_to(tool: &str, args: &[&str], text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let Ok(mut child) = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return false;
    };
    let written = child
        .stdin
        .take()
        .is_some_and(|mut stdin| stdin.write_all(text.as_bytes()).is_ok());
    let ok = child.wait().is_ok_and(|status| status.success());
    written && ok
}

fn copy_to_system_clipboard(text: &str) -> Result<(), String> {
    // terminal sessions often lack a display arboard can reach
    #[cfg(target_os = "linux")]
    {
        for (tool, args) in CLIPBOARD_TOOLS {
            if pipe_to(tool, args, text) {
                debug!(tool, bytes = text.len(), "copied via clipboard tool");
                return Ok(());
            }
        }
    }

    arboard::Clipboard::new()
        .and_then(|mut clipboard| clipboard.set_text(text))
        .map_err(|e| format!("Clipboard error: {}", e))
}
