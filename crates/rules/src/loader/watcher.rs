//! Filesystem event filter for the notify watcher (hot-reload).

use std::path::Path;

use notify::{Event, EventKind};

/// Whether `event` is a create/modify of the watched rules file.
///
/// The watcher runs on the parent directory, so events for sibling files
/// and editor temp files are filtered out by file name. Removals are
/// ignored: a disappearing file keeps the current rule set.
pub(super) fn is_rules_file_event(event: &Event, rules_file: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    let Some(target) = rules_file.file_name() else {
        return false;
    };
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(target))
}
