//
// merge.rs
//
// Combined result budget across the file and symbol categories
//

use crate::fuzzy::ScoredIndex;

/// What `filter_scores` removed from each category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub more_files: bool,
    pub more_symbols: bool,
}

impl MergeOutcome {
    pub fn any(&self) -> bool {
        self.more_files || self.more_symbols
    }
}

/// Truncate two ascending score lists so that together they hold at most
/// `max_results` items, picking the globally best scores first.
///
/// Walks a virtual merge of both lists. When both still have items, the list
/// whose next score is lower advances, and `files` wins ties. The two lists
/// stay separate; only their lengths change.
pub fn filter_scores(
    files: &mut Vec<ScoredIndex>,
    symbols: &mut Vec<ScoredIndex>,
    max_results: usize,
) -> MergeOutcome {
    let (files_len, symbols_len) = (files.len(), symbols.len());
    let mut taken_files = 0;
    let mut taken_symbols = 0;

    for _ in 0..max_results {
        let files_left = taken_files < files_len;
        let symbols_left = taken_symbols < symbols_len;
        match (files_left, symbols_left) {
            (false, false) => break,
            (true, false) => taken_files += 1,
            (false, true) => taken_symbols += 1,
            (true, true) => {
                if files[taken_files].score <= symbols[taken_symbols].score {
                    taken_files += 1;
                } else {
                    taken_symbols += 1;
                }
            }
        }
    }

    files.truncate(taken_files);
    symbols.truncate(taken_symbols);

    MergeOutcome {
        more_files: files.len() < files_len,
        more_symbols: symbols.len() < symbols_len,
    }
}
