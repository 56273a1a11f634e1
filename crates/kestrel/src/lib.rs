//
// lib.rs
//
// kestrel: incremental go-to-file / go-to-symbol search for R projects
//

//! The search core is usable without the LSP layer: build a [`state::WorldState`]
//! (or the indexes directly), feed it documents and file changes, and query
//! it through [`search::SearchDispatcher`].

pub mod backend;
pub mod classify;
pub mod config;
pub mod documents;
pub mod fuzzy;
pub mod merge;
pub mod monitor;
pub mod open_documents;
pub mod parser_pool;
pub mod paths;
pub mod project_index;
pub mod protocol;
pub mod r_parser;
pub mod r_subprocess;
pub mod scheduler;
pub mod search;
pub mod state;
pub mod symbol;
// Fixture workspaces for integration tests and benchmarks
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
