//! End-to-end search over a generated package: enumeration, incremental
//! indexing on the tokio driver, open-document shadowing, ranking and the
//! file monitor.
//!
//! Run with: `cargo test -p kestrel --features test-support --test search_integration`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kestrel::config::SearchConfig;
use kestrel::monitor::{apply_changes, enumerate_project, FileMonitor};
use kestrel::paths::PathAliaser;
use kestrel::project_index::ScheduleRequest;
use kestrel::scheduler::IndexingDriver;
use kestrel::search::{complete_definition, DefinitionLookup, FunctionToken, NoSearchPath};
use kestrel::state::WorldState;
use kestrel::symbol::SymbolKind;
use kestrel::test_utils::fixture_workspace::{
    create_fixture_workspace, function_name, FixtureConfig,
};
use tokio::sync::RwLock;
use url::Url;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// State for `root` with the whole project indexed through the driver.
async fn indexed_state(root: &Path) -> (Arc<RwLock<WorldState>>, Arc<IndexingDriver<WorldState>>) {
    let state = Arc::new(RwLock::new(WorldState::new(
        SearchConfig::default(),
        PathAliaser::new(None),
    )));
    let driver = Arc::new(IndexingDriver::new(state.clone()));

    let (request, config) = {
        let mut guard = state.write().await;
        guard.set_project(Some(root.to_path_buf()));
        guard.start_monitoring();
        let files = enumerate_project(root, guard.project_index.classifier());
        (guard.project_index.enqueue_many(files), guard.config.clone())
    };
    assert_eq!(request, ScheduleRequest::BurstThenSlices);

    let handle = driver.schedule(request, &config).expect("indexing scheduled");
    tokio::time::timeout(Duration::from_secs(30), handle)
        .await
        .expect("indexing finished")
        .expect("indexing task completed");
    (state, driver)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_project_is_fully_indexed() {
    let config = FixtureConfig::small();
    let workspace = create_fixture_workspace(&config);
    let (state, _driver) = indexed_state(workspace.path()).await;

    let state = state.read().await;
    assert!(!state.project_index.is_indexing());
    assert_eq!(state.project_index.len(), config.tracked_files());
    assert_eq!(state.project_index.metrics().read_errors, 0);
}

#[tokio::test]
async fn test_exact_symbol_match_ranks_first() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;
    let state = state.read().await;

    let target = function_name(3, 2);
    let results = state.dispatcher().search_code(&target, 5);
    assert_eq!(results.symbols[0].name, target);
    assert_eq!(results.symbols[0].kind, SymbolKind::Function);
    assert!(results.files.len() + results.symbols.len() <= 5);
}

#[tokio::test]
async fn test_source_files_outrank_documentation() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;
    let state = state.read().await;

    let results = state.dispatcher().search_code("file_7", 10);
    let names: Vec<_> = results.files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["file_7.R", "file_7.Rd"]);
}

#[tokio::test]
async fn test_excluded_directories_are_not_searched() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;
    let state = state.read().await;

    let results = state.dispatcher().search_code("ignored_function", 10);
    assert!(results.symbols.is_empty());
    assert!(results.files.iter().all(|f| !f.path.contains("renv")));
}

#[tokio::test]
async fn test_open_document_shadows_project_copy() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;
    let mut state = state.write().await;

    let path = workspace.path().join("R/file_0.R");
    let uri = Url::from_file_path(&path).unwrap();
    state.open_document(uri, "renamed_in_editor <- function() 1\n", Some(1));

    let dispatcher = state.dispatcher();
    let stale = dispatcher.search_symbols(&function_name(0, 0), 10, true);
    assert!(stale.items.is_empty());
    let fresh = dispatcher.search_symbols("renamed_in_editor", 10, true);
    assert_eq!(fresh.items.len(), 1);
    assert_eq!(fresh.items[0].context.as_ref(), path.to_string_lossy());
}

#[tokio::test]
async fn test_more_available_when_capped() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;
    let state = state.read().await;

    let results = state.dispatcher().search_code("item", 3);
    assert_eq!(results.files.len() + results.symbols.len(), 3);
    assert!(results.more_available);

    let everything = state.dispatcher().search_code("Record1", 50);
    assert!(!everything.more_available);
}

#[tokio::test]
async fn test_function_definition_in_project() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let (state, _driver) = indexed_state(workspace.path()).await;

    let name = function_name(4, 1);
    let line = format!("value <- {name}(1, 2)");
    let token = FunctionToken::guess(&line, line.find(&name).unwrap() + 2);
    let lookup = state.read().await.dispatcher().lookup_definition(&token);
    assert!(matches!(lookup, DefinitionLookup::Source(_)));

    let definition = complete_definition(lookup, &NoSearchPath).await;
    let location = definition.location.unwrap();
    assert_eq!(location.file, workspace.path().join("R/file_4.R"));
    // Second function in the file: each fixture function spans 9 lines
    assert_eq!((location.line, location.column), (10, 1));
}

#[tokio::test]
async fn test_monitor_picks_up_new_files() {
    let workspace = create_fixture_workspace(&FixtureConfig::small());
    let root = workspace.path().canonicalize().unwrap();
    let (state, driver) = indexed_state(&root).await;

    let classifier = state.read().await.project_index.classifier().clone();
    let (_monitor, mut events) = FileMonitor::start(&root, classifier).unwrap();
    std::fs::write(root.join("R/late.R"), "late_arrival <- function() 1\n").unwrap();

    let found = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let Some(changes) = events.recv().await else {
                return false;
            };
            let (request, config) = {
                let mut guard = state.write().await;
                (apply_changes(&mut guard.project_index, changes), guard.config.clone())
            };
            if let Some(handle) = driver.schedule(request, &config) {
                handle.await.unwrap();
            }
            while state.read().await.project_index.is_indexing() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let guard = state.read().await;
            if guard.dispatcher().find_global_function("late_arrival").is_some() {
                return true;
            }
        }
    })
    .await;
    assert_eq!(found.ok(), Some(true));
}
