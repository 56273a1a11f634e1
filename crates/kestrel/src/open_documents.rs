//
// open_documents.rs
//
// Synchronously maintained index of documents open in the editor
//

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::classify::FileClassifier;
use crate::paths::PathAliaser;
use crate::r_parser::SourceParser;
use crate::symbol::SourceIndex;

/// An editor buffer as seen by the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub id: String,
    /// `None` for unsaved buffers
    pub path: Option<PathBuf>,
    pub content: String,
}

/// Parsed indexes of open documents, keyed by document id.
pub struct OpenDocumentIndex {
    classifier: FileClassifier,
    aliaser: PathAliaser,
    parser: Arc<dyn SourceParser>,
    indexes: IndexMap<String, Arc<SourceIndex>>,
}

impl OpenDocumentIndex {
    pub fn new(classifier: FileClassifier, aliaser: PathAliaser, parser: Arc<dyn SourceParser>) -> Self {
        Self {
            classifier,
            aliaser,
            parser,
            indexes: IndexMap::new(),
        }
    }

    pub fn set_classifier(&mut self, classifier: FileClassifier) {
        self.classifier = classifier;
    }

    /// Re-parse `doc`. Documents without a path or with a non-indexable
    /// extension are left alone; an existing entry is not removed.
    pub fn on_document_updated(&mut self, doc: &OpenDocument) {
        let Some(path) = doc.path.as_deref() else {
            return;
        };
        if !self.classifier.has_indexable_extension(path) {
            return;
        }
        let context = self.aliaser.alias(path);
        let index = self.parser.parse(&context, &doc.content);
        log::trace!(
            "Indexed open document {} ({} symbols)",
            doc.id,
            index.symbols().len()
        );
        self.indexes.insert(doc.id.clone(), Arc::new(index));
    }

    pub fn on_document_removed(&mut self, id: &str) {
        self.indexes.shift_remove(id);
    }

    pub fn on_remove_all(&mut self) {
        self.indexes.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SourceIndex>> {
        self.indexes.get(id)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Point-in-time copy of the current indexes.
    pub fn snapshot(&self) -> Vec<Arc<SourceIndex>> {
        self.indexes.values().cloned().collect()
    }
}
