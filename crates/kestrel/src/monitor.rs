//
// monitor.rs
//
// Project enumeration and file-system change notifications
//

use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::classify::FileClassifier;
use crate::project_index::{ChangeKind, FileIdentity, PendingChange, ProjectIndex, ScheduleRequest};

/// Every trackable file below `root`, skipping non-user directories.
pub fn enumerate_project(root: &Path, classifier: &FileClassifier) -> Vec<FileIdentity> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !entry.file_type().is_dir() || classifier.is_user_dir(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::trace!("Skipping unreadable entry during enumeration: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !classifier.is_trackable(path, false) {
            continue;
        }
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        files.push(FileIdentity::new(path, false, modified));
    }

    log::info!("Enumerated {} project files under {}", files.len(), root.display());
    files
}

/// Translate a watcher event into index changes.
///
/// Renames become a removal of the old path and an addition of the new one.
/// A directory that appears is expanded into additions for its files.
pub fn pending_changes_from_event(event: &Event, classifier: &FileClassifier) -> Vec<PendingChange> {
    let mut changes = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                push_added(&mut changes, path, classifier);
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to]) => {
                changes.push(PendingChange::removed(FileIdentity::file(from)));
                push_added(&mut changes, to, classifier);
            }
            (RenameMode::From, paths) => {
                changes.extend(paths.iter().map(|p| PendingChange::removed(FileIdentity::file(p))));
            }
            (RenameMode::To, paths) => {
                for path in paths {
                    push_added(&mut changes, path, classifier);
                }
            }
            (_, paths) => {
                for path in paths {
                    if path.exists() {
                        push_added(&mut changes, path, classifier);
                    } else {
                        changes.push(PendingChange::removed(FileIdentity::file(path)));
                    }
                }
            }
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => {}
        EventKind::Modify(_) => {
            for path in &event.paths {
                let identity = FileIdentity::stat(path);
                if !identity.is_dir {
                    changes.push(PendingChange::modified(identity));
                }
            }
        }
        EventKind::Remove(_) => {
            changes.extend(
                event
                    .paths
                    .iter()
                    .map(|p| PendingChange::removed(FileIdentity::file(p))),
            );
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
    changes
}

fn push_added(changes: &mut Vec<PendingChange>, path: &Path, classifier: &FileClassifier) {
    let identity = FileIdentity::stat(path);
    if identity.is_dir {
        if classifier.is_user_dir(path) {
            changes.extend(enumerate_project(path, classifier).into_iter().map(PendingChange::added));
        }
    } else {
        changes.push(PendingChange::added(identity));
    }
}

/// Queue `changes` on `index`, expanding a removed directory into removals
/// of the entries beneath it.
pub fn apply_changes(index: &mut ProjectIndex, changes: Vec<PendingChange>) -> ScheduleRequest {
    let mut request = ScheduleRequest::None;
    for change in changes {
        if change.kind == ChangeKind::Removed {
            for nested in index.entries_within(&change.identity.path) {
                merge_request(&mut request, index.enqueue_change(PendingChange::removed(nested)));
            }
        }
        merge_request(&mut request, index.enqueue_change(change));
    }
    request
}

fn merge_request(current: &mut ScheduleRequest, next: ScheduleRequest) {
    if *current == ScheduleRequest::None {
        *current = next;
    }
}

// ============================================================================
// Watcher
// ============================================================================

/// Recursive watch on the project directory.
///
/// Events are translated on the watcher's thread and forwarded as batches of
/// changes. Dropping the monitor stops the watch.
pub struct FileMonitor {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FileMonitor {
    pub fn start(
        root: &Path,
        classifier: FileClassifier,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<Vec<PendingChange>>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let changes = pending_changes_from_event(&event, &classifier);
                if !changes.is_empty() {
                    // The receiver is gone once the monitor is shut down
                    let _ = tx.send(changes);
                }
            }
            Err(e) => log::warn!("File monitor error: {e}"),
        })
        .context("creating file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", root.display()))?;
        log::info!("File monitor started for {}", root.display());

        Ok((
            Self {
                root: root.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        log::info!("File monitor stopped for {}", self.root.display());
    }
}
