//
// documents.rs
//
// Editor buffers kept in sync with incremental LSP edits
//

use indexmap::IndexMap;
use ropey::Rope;
use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use url::Url;

use crate::open_documents::OpenDocument;

/// Text of one open document
#[derive(Debug, Clone)]
pub struct DocumentBuffer {
    pub version: Option<i32>,
    pub contents: Rope,
}

impl DocumentBuffer {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            version,
            contents: Rope::from_str(text),
        }
    }

    /// Apply one LSP change. Positions past the end of the buffer are clamped.
    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        match change.range {
            Some(range) => {
                let start = self.char_index(range.start.line, range.start.character);
                let end = self.char_index(range.end.line, range.end.character).max(start);
                self.contents.remove(start..end);
                self.contents.insert(start, &change.text);
            }
            // Full document sync
            None => self.contents = Rope::from_str(&change.text),
        }
    }

    fn char_index(&self, line: u32, utf16_character: u32) -> usize {
        let line = line as usize;
        if line >= self.contents.len_lines() {
            return self.contents.len_chars();
        }
        let line_text = self.contents.line(line).to_string();
        self.contents.line_to_char(line) + utf16_offset_to_char_offset(&line_text, utf16_character)
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }

    /// Line `line` without its terminator.
    pub fn line(&self, line: u32) -> Option<String> {
        let text = self.contents.get_line(line as usize)?.to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Convert a UTF-16 offset (LSP `Position.character`) into a char offset
/// within `line_text`, clamped to the line length.
pub fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: u32) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;
    for ch in line_text.chars() {
        if utf16_count >= utf16_offset as usize {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Open buffers by URI, in the order they were opened
#[derive(Debug, Default)]
pub struct DocumentBuffers {
    docs: IndexMap<Url, DocumentBuffer>,
}

impl DocumentBuffers {
    pub fn open(&mut self, uri: Url, text: &str, version: Option<i32>) {
        self.docs.insert(uri, DocumentBuffer::new(text, version));
    }

    /// Apply `changes` in order. Returns false for an unknown document.
    pub fn apply_changes(
        &mut self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: Option<i32>,
    ) -> bool {
        let Some(doc) = self.docs.get_mut(uri) else {
            log::warn!("Change for unknown document {uri}");
            return false;
        };
        for change in changes {
            doc.apply_change(change);
        }
        doc.version = version;
        true
    }

    pub fn close(&mut self, uri: &Url) -> Option<DocumentBuffer> {
        self.docs.shift_remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<&DocumentBuffer> {
        self.docs.get(uri)
    }

    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.docs.keys()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The buffer as seen by the open-document index. Non-file URIs have no
    /// path.
    pub fn open_document(&self, uri: &Url) -> Option<OpenDocument> {
        let doc = self.docs.get(uri)?;
        Some(OpenDocument {
            id: uri.to_string(),
            path: uri.to_file_path().ok(),
            content: doc.text(),
        })
    }
}
