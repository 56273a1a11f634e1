//
// state.rs
//
// Server-wide state shared by the LSP handlers and the indexing driver
//

use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use url::Url;

use crate::classify::FileClassifier;
use crate::config::SearchConfig;
use crate::documents::DocumentBuffers;
use crate::open_documents::OpenDocumentIndex;
use crate::paths::PathAliaser;
use crate::project_index::ProjectIndex;
use crate::r_parser::{RSourceParser, SourceParser};
use crate::scheduler::IndexHost;
use crate::search::{ProjectContext, SearchDispatcher};

/// Global LSP state
pub struct WorldState {
    pub config: SearchConfig,
    pub aliaser: PathAliaser,
    /// Set once a workspace root is known
    pub project: Option<ProjectContext>,
    pub project_index: ProjectIndex,
    pub open_documents: OpenDocumentIndex,
    pub buffers: DocumentBuffers,
}

impl WorldState {
    pub fn new(config: SearchConfig, aliaser: PathAliaser) -> Self {
        Self::with_parser(config, aliaser, Arc::new(RSourceParser))
    }

    pub fn with_parser(config: SearchConfig, aliaser: PathAliaser, parser: Arc<dyn SourceParser>) -> Self {
        let classifier = FileClassifier::new(config.clone(), None);
        Self {
            project_index: ProjectIndex::new(classifier.clone(), aliaser.clone(), parser.clone()),
            open_documents: OpenDocumentIndex::new(classifier, aliaser.clone(), parser),
            buffers: DocumentBuffers::default(),
            project: None,
            config,
            aliaser,
        }
    }

    fn classifier(&self) -> FileClassifier {
        let root = self.project.as_ref().map(|p| p.directory.clone());
        FileClassifier::new(self.config.clone(), root)
    }

    fn refresh_classifiers(&mut self) {
        let classifier = self.classifier();
        self.project_index.set_classifier(classifier.clone());
        self.open_documents.set_classifier(classifier);
    }

    /// Make `directory` the active project. The project index starts empty
    /// and unmonitored.
    pub fn set_project(&mut self, directory: Option<PathBuf>) {
        self.project_index.clear();
        self.project = directory.map(|directory| ProjectContext {
            directory,
            has_file_monitor: false,
        });
        self.refresh_classifiers();
        self.reindex_open_documents();
    }

    /// Replace the configuration. Open documents are re-parsed under the new
    /// classification rules; the project index is left to the caller, which
    /// restarts monitoring when needed.
    pub fn set_config(&mut self, config: SearchConfig) {
        self.config = config;
        self.refresh_classifiers();
        self.reindex_open_documents();
    }

    fn reindex_open_documents(&mut self) {
        self.open_documents.on_remove_all();
        let uris: Vec<Url> = self.buffers.uris().cloned().collect();
        for uri in uris {
            self.sync_open_document(&uri);
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.project.as_ref().is_some_and(|p| p.has_file_monitor)
    }

    /// Mark the project monitored. Returns the directory to enumerate.
    pub fn start_monitoring(&mut self) -> Option<PathBuf> {
        let project = self.project.as_mut()?;
        project.has_file_monitor = true;
        Some(project.directory.clone())
    }

    /// Drop the project index. The caller cancels the indexing driver.
    pub fn stop_monitoring(&mut self) {
        if let Some(project) = self.project.as_mut() {
            project.has_file_monitor = false;
        }
        self.project_index.clear();
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    pub fn open_document(&mut self, uri: Url, text: &str, version: Option<i32>) {
        self.buffers.open(uri.clone(), text, version);
        self.sync_open_document(&uri);
    }

    pub fn change_document(
        &mut self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: Option<i32>,
    ) {
        if self.buffers.apply_changes(uri, changes, version) {
            self.sync_open_document(uri);
        }
    }

    pub fn close_document(&mut self, uri: &Url) {
        self.buffers.close(uri);
        self.open_documents.on_document_removed(uri.as_str());
    }

    fn sync_open_document(&mut self, uri: &Url) {
        if let Some(doc) = self.buffers.open_document(uri) {
            self.open_documents.on_document_updated(&doc);
        }
    }

    /// Read-only search view over both indexes.
    pub fn dispatcher(&self) -> SearchDispatcher<'_> {
        SearchDispatcher {
            project_index: &self.project_index,
            open_documents: &self.open_documents,
            project: self.project.as_ref(),
            aliaser: &self.aliaser,
            config: &self.config,
        }
    }
}

impl IndexHost for WorldState {
    fn project_index_mut(&mut self) -> &mut ProjectIndex {
        &mut self.project_index
    }
}
