//
// fuzzy.rs
//
// Name matching and candidate scoring
//

//! Matching decides *whether* a candidate is returned; scoring decides the
//! order of matched candidates. The scoring function is mirrored by clients
//! that rank the same data locally, so its arithmetic (positions, delimiter
//! bonus, low-interest penalty, file penalty, stable ties) must not drift.

use regex::{Regex, RegexBuilder};

use crate::config::SearchConfig;

#[inline]
fn fold(c: char) -> char {
    if c.is_ascii() {
        c.to_ascii_lowercase()
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

fn folded(text: &str) -> Vec<char> {
    text.chars().map(fold).collect()
}

/// True when the characters of `query` occur in `candidate` in order.
pub fn is_subsequence(candidate: &str, query: &str, case_insensitive: bool) -> bool {
    let mut remaining = query.chars().peekable();
    for c in candidate.chars() {
        let Some(&q) = remaining.peek() else {
            break;
        };
        let hit = if case_insensitive {
            fold(c) == fold(q)
        } else {
            c == q
        };
        if hit {
            remaining.next();
        }
    }
    remaining.peek().is_none()
}

/// Character positions in `candidate` where the characters of `query` are
/// matched, taking the leftmost position for each in turn.
///
/// Stops at the first query character that cannot be matched, so the result
/// is shorter than `query` when `query` is not a subsequence.
pub fn subsequence_indices(candidate: &[char], query: &[char]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(query.len());
    let mut from = 0;
    for &q in query {
        match candidate[from..].iter().position(|&c| c == q) {
            Some(offset) => {
                indices.push(from + offset);
                from += offset + 1;
            }
            None => break,
        }
    }
    indices
}

/// The part of `term` before the first `delimiter` (`name:line:col` queries).
pub fn truncate_query(term: &str, delimiter: char) -> &str {
    match term.find(delimiter) {
        Some(end) => &term[..end],
        None => term,
    }
}

/// A compiled wildcard query such as `plot*data`.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    /// Compiles `term` when it contains `wildcard`; `None` otherwise.
    ///
    /// Matching is case-insensitive. With `prefix_only` the pattern must match
    /// at the start of the text, otherwise anywhere within it.
    pub fn compile(term: &str, wildcard: char, prefix_only: bool) -> Option<Self> {
        if !term.contains(wildcard) {
            return None;
        }
        let body = term
            .split(wildcard)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let source = if prefix_only {
            format!("^(?:{body})")
        } else {
            body
        };
        match RegexBuilder::new(&source).case_insensitive(true).build() {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                log::trace!("Wildcard pattern {term:?} failed to compile: {e}");
                None
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Name-matching policy shared by file-name and symbol searches.
///
/// - a term containing the wildcard marker is a wildcard pattern;
/// - otherwise, with `prefix_only`, a case-insensitive prefix test;
/// - otherwise a case-insensitive subsequence test against the term truncated
///   at the query delimiter.
///
/// An empty term (after truncation) matches nothing.
#[derive(Debug, Clone)]
pub enum NameQuery {
    Nothing,
    Wildcard(WildcardPattern),
    Prefix(Vec<char>),
    Subsequence(String),
}

impl NameQuery {
    pub fn new(term: &str, prefix_only: bool, config: &SearchConfig) -> Self {
        if term.contains(config.wildcard) {
            return match WildcardPattern::compile(term, config.wildcard, prefix_only) {
                Some(pattern) => NameQuery::Wildcard(pattern),
                None => NameQuery::Nothing,
            };
        }
        if prefix_only {
            if term.is_empty() {
                return NameQuery::Nothing;
            }
            return NameQuery::Prefix(folded(term));
        }
        let term = truncate_query(term, config.query_delimiter);
        if term.is_empty() {
            NameQuery::Nothing
        } else {
            NameQuery::Subsequence(term.to_string())
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            NameQuery::Nothing => false,
            NameQuery::Wildcard(pattern) => pattern.is_match(candidate),
            NameQuery::Prefix(prefix) => {
                let mut chars = candidate.chars().map(fold);
                prefix.iter().all(|&p| chars.next() == Some(p))
            }
            NameQuery::Subsequence(term) => is_subsequence(candidate, term, true),
        }
    }
}

/// The string a search term is scored against.
///
/// The term is cut at the query delimiter, and wildcard markers are dropped,
/// so the remaining characters are always an ordered subsequence of any
/// candidate the term matched.
pub fn scoring_query(term: &str, config: &SearchConfig) -> String {
    truncate_query(term, config.query_delimiter)
        .chars()
        .filter(|&c| c != config.wildcard)
        .collect()
}

/// Text after the last `.`, lower-cased; empty when there is no dot.
fn extension_of(suggestion: &str) -> String {
    match suggestion.rfind('.') {
        Some(dot) => suggestion[dot + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Score a matched candidate against `query`. Lower is better.
///
/// - an exact (case-sensitive) match scores 0;
/// - otherwise each matched character contributes its position in the
///   candidate, except that a character right after `_`, `-` or (for
///   non-files) `.` contributes `j + 1`, where `j` is its index in the query;
/// - candidates with a low-interest extension add the configured penalty for
///   every matched character;
/// - files add 1 to the total.
pub fn score_match(suggestion: &str, query: &str, is_file: bool, config: &SearchConfig) -> i32 {
    if suggestion == query {
        return 0;
    }

    let original: Vec<char> = suggestion.chars().collect();
    let matches = subsequence_indices(&folded(suggestion), &folded(query));

    let extension = extension_of(suggestion);
    let low_interest = !extension.is_empty() && config.low_interest_extensions.contains(&extension);

    let mut result: i32 = 0;
    for (j, &pos) in matches.iter().enumerate() {
        let mut match_pos = pos as i32;

        if pos >= 1 {
            let prev = original[pos - 1];
            if prev == '_' || prev == '-' || (!is_file && prev == '.') {
                match_pos = j as i32 + 1;
            }
        }

        if low_interest {
            match_pos += config.low_interest_penalty;
        }

        result += match_pos;
    }

    if is_file {
        result += 1;
    }

    result
}

/// A candidate's position in its source list together with its score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: i32,
}

/// Score `candidates` and sort ascending by score.
///
/// The sort is stable: candidates with equal scores keep their input order.
pub fn rank<'a, I>(candidates: I, query: &str, is_file: bool, config: &SearchConfig) -> Vec<ScoredIndex>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<ScoredIndex> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, name)| ScoredIndex {
            index,
            score: score_match(name, query, is_file, config),
        })
        .collect();
    scored.sort_by_key(|s| s.score);
    scored
}
