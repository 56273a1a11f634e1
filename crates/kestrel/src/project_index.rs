//
// project_index.rs
//
// On-disk project index fed by an incremental change queue
//

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::classify::FileClassifier;
use crate::fuzzy::NameQuery;
use crate::paths::{file_name, normalize, PathAliaser};
use crate::r_parser::SourceParser;
use crate::symbol::{SourceIndex, Symbol};

// ============================================================================
// Identities and changes
// ============================================================================

/// A file as observed on disk.
///
/// Identity is the lexically normalized path alone: two identities with the
/// same path are the same logical file regardless of their metadata.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

impl FileIdentity {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool, modified: Option<SystemTime>) -> Self {
        Self {
            path: normalize(&path.into()),
            is_dir,
            modified,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, false, None)
    }

    /// Identity from the file's current metadata; a plain file identity when
    /// the metadata cannot be read (e.g. the file is already gone).
    pub fn stat(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) => Self::new(path, meta.is_dir(), meta.modified().ok()),
            Err(_) => Self::file(path),
        }
    }

    fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl PartialEq for FileIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FileIdentity {}

impl PartialOrd for FileIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub kind: ChangeKind,
    pub identity: FileIdentity,
}

impl PendingChange {
    pub fn added(identity: FileIdentity) -> Self {
        Self {
            kind: ChangeKind::Added,
            identity,
        }
    }

    pub fn modified(identity: FileIdentity) -> Self {
        Self {
            kind: ChangeKind::Modified,
            identity,
        }
    }

    pub fn removed(identity: FileIdentity) -> Self {
        Self {
            kind: ChangeKind::Removed,
            identity,
        }
    }
}

/// A tracked file. `source` is present only for indexable files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub identity: FileIdentity,
    pub source: Option<Arc<SourceIndex>>,
}

/// How the caller should start processing after an enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// Work is already scheduled, or nothing was queued
    None,
    /// Run continuously for the initial burst, then in periodic slices
    BurstThenSlices,
    /// Run in periodic slices only
    Slices,
}

/// Counters for indexing activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingMetrics {
    /// Files read and parsed (or tracked without parsing)
    pub files_indexed: u64,
    /// Entries removed by `Removed` changes
    pub entries_removed: u64,
    /// Reads that failed for reasons other than not-found
    pub read_errors: u64,
    /// Files that disappeared between enqueue and processing
    pub skipped_not_found: u64,
}

/// File-name search results in entry order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNameMatches {
    pub names: Vec<String>,
    /// Aliased paths, parallel to `names`
    pub paths: Vec<String>,
    pub more_available: bool,
}

impl FileNameMatches {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, path: String) {
        self.names.push(name);
        self.paths.push(path);
    }

    /// Truncate to `max_results` and flag when anything was dropped.
    /// Returns true when truncation happened.
    pub(crate) fn enforce_max(&mut self, max_results: usize) -> bool {
        if self.names.len() > max_results {
            self.more_available = true;
            self.names.truncate(max_results);
            self.paths.truncate(max_results);
            true
        } else {
            false
        }
    }
}

// ============================================================================
// Project index
// ============================================================================

/// Index of the project's tracked files, ordered by path.
///
/// All mutation goes through the change queue: callers enqueue changes and
/// then drive `process_one_slice` until it reports that the queue is empty.
pub struct ProjectIndex {
    classifier: FileClassifier,
    aliaser: PathAliaser,
    parser: Arc<dyn SourceParser>,
    entries: BTreeMap<String, IndexEntry>,
    queue: VecDeque<PendingChange>,
    indexing: bool,
    metrics: IndexingMetrics,
}

impl std::fmt::Debug for ProjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIndex")
            .field("entries", &self.entries.len())
            .field("pending", &self.queue.len())
            .field("indexing", &self.indexing)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl ProjectIndex {
    pub fn new(classifier: FileClassifier, aliaser: PathAliaser, parser: Arc<dyn SourceParser>) -> Self {
        Self {
            classifier,
            aliaser,
            parser,
            entries: BTreeMap::new(),
            queue: VecDeque::new(),
            indexing: false,
            metrics: IndexingMetrics::default(),
        }
    }

    pub fn classifier(&self) -> &FileClassifier {
        &self.classifier
    }

    /// Replace the classification rules. Existing entries are kept; callers
    /// that need them re-evaluated clear and re-enumerate.
    pub fn set_classifier(&mut self, classifier: FileClassifier) {
        self.classifier = classifier;
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> IndexingMetrics {
        self.metrics
    }

    pub fn get(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(normalize(path).to_string_lossy().as_ref())
    }

    /// Entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Tracked files strictly below `dir`.
    pub fn entries_within(&self, dir: &Path) -> Vec<FileIdentity> {
        self.entries
            .values()
            .filter(|entry| entry.identity.path != dir && entry.identity.path.starts_with(dir))
            .map(|entry| entry.identity.clone())
            .collect()
    }

    /// Queue an `Added` change for every trackable file in `identities`.
    ///
    /// Asks for an initial burst when this starts indexing.
    pub fn enqueue_many<I>(&mut self, identities: I) -> ScheduleRequest
    where
        I: IntoIterator<Item = FileIdentity>,
    {
        let before = self.queue.len();
        for identity in identities {
            if self.classifier.is_trackable(&identity.path, identity.is_dir) {
                self.queue.push_back(PendingChange::added(identity));
            }
        }
        log::trace!("Queued {} files for indexing", self.queue.len() - before);

        if !self.queue.is_empty() && !self.indexing {
            self.indexing = true;
            ScheduleRequest::BurstThenSlices
        } else {
            ScheduleRequest::None
        }
    }

    /// Queue a single file-watcher change. Untrackable files are ignored.
    pub fn enqueue_change(&mut self, change: PendingChange) -> ScheduleRequest {
        if !self
            .classifier
            .is_trackable(&change.identity.path, change.identity.is_dir)
        {
            return ScheduleRequest::None;
        }
        log::trace!("Queued {:?} for {}", change.kind, change.identity.path.display());
        self.queue.push_back(change);

        if !self.indexing {
            self.indexing = true;
            ScheduleRequest::Slices
        } else {
            ScheduleRequest::None
        }
    }

    /// Process at most one pending change. Returns whether work remains.
    pub fn process_one_slice(&mut self) -> bool {
        if let Some(change) = self.queue.pop_front() {
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => self.update_entry(change.identity),
                ChangeKind::Removed => self.remove_entry(&change.identity),
            }
        }
        self.indexing = !self.queue.is_empty();
        self.indexing
    }

    fn update_entry(&mut self, identity: FileIdentity) {
        let mut source = None;
        if self.classifier.is_indexable(&identity.path, identity.is_dir) {
            let bytes = match std::fs::read(&identity.path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log::trace!("Skipping vanished file {}", identity.path.display());
                    self.metrics.skipped_not_found += 1;
                    return;
                }
                Err(e) => {
                    log::error!("Failed to read {}: {}", identity.path.display(), e);
                    self.metrics.read_errors += 1;
                    return;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            let context = self.aliaser.alias(&identity.path);
            source = Some(Arc::new(self.parser.parse(&context, &text)));
        }

        self.metrics.files_indexed += 1;
        self.entries
            .insert(identity.key(), IndexEntry { identity, source });
    }

    fn remove_entry(&mut self, identity: &FileIdentity) {
        if self.entries.remove(&identity.key()).is_some() {
            self.metrics.entries_removed += 1;
        }
    }

    /// Drop every entry and pending change.
    pub fn clear(&mut self) {
        let dropped = self.queue.len();
        self.indexing = false;
        self.queue.clear();
        self.entries.clear();
        log::info!("Project index cleared ({dropped} pending changes dropped)");
    }

    fn sources<'a>(&'a self, exclude: &'a HashSet<String>) -> impl Iterator<Item = &'a SourceIndex> + 'a {
        self.entries
            .values()
            .filter_map(|e| e.source.as_deref())
            .filter(move |s| !exclude.contains(s.context()))
    }

    /// First top-level function or method called `name`, in path order.
    pub fn find_global_function<'a>(&'a self, name: &'a str, exclude: &'a HashSet<String>) -> Option<&'a Symbol> {
        self.sources(exclude)
            .find_map(|source| source.find_global_function(name))
    }

    /// Unranked symbol matches, scanning entries in path order.
    ///
    /// Stops after the first source that brings the count to `max_results`
    /// and truncates to exactly that many. The flag reports whether matches
    /// were dropped by the truncation.
    pub fn search_symbols(
        &self,
        query: &NameQuery,
        max_results: usize,
        exclude: &HashSet<String>,
    ) -> (Vec<Symbol>, bool) {
        let mut items = Vec::new();
        for source in self.sources(exclude) {
            items.extend(source.search(query).cloned());
            if items.len() >= max_results {
                let truncated = items.len() > max_results;
                items.truncate(max_results);
                return (items, truncated);
            }
        }
        (items, false)
    }

    /// File-name matches in entry order, with at most `max_results` results.
    pub fn search_file_names(&self, query: &NameQuery, max_results: usize) -> FileNameMatches {
        let mut matches = FileNameMatches::default();
        for entry in self.entries.values() {
            let name = file_name(&entry.identity.path);
            if !query.matches(&name) {
                continue;
            }
            matches.push(name, self.aliaser.alias(&entry.identity.path));
            if matches.enforce_max(max_results) {
                break;
            }
        }
        matches
    }
}
