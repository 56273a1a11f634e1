//
// backend.rs
//
// LSP server wiring editor notifications and requests to the search core
//

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, RwLock};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::config::{parse_search_config, SearchConfig};
use crate::documents::utf16_offset_to_char_offset;
use crate::monitor::{apply_changes, enumerate_project, FileMonitor};
use crate::paths::PathAliaser;
use crate::project_index::PendingChange;
use crate::protocol::{
    FunctionDefinitionParams, FunctionDefinitionResponse, SearchCodeParams, SearchCodeResponse,
    FUNCTION_DEFINITION_METHOD, SEARCH_CODE_METHOD,
};
use crate::r_subprocess::{RSearchPath, RSubprocess};
use crate::scheduler::IndexingDriver;
use crate::search::{
    complete_definition, CodeSearchResults, FunctionToken, NoSearchPath, SearchPathResolver,
};
use crate::state::WorldState;
use crate::symbol::SymbolKind;

pub struct Backend {
    client: Client,
    state: Arc<RwLock<WorldState>>,
    indexer: Arc<IndexingDriver<WorldState>>,
    monitor: Mutex<Option<FileMonitor>>,
    resolver: RwLock<Arc<dyn SearchPathResolver>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        let state = Arc::new(RwLock::new(WorldState::new(
            SearchConfig::default(),
            PathAliaser::from_env(),
        )));
        let indexer = Arc::new(IndexingDriver::new(state.clone()));
        Self {
            client,
            state,
            indexer,
            monitor: Mutex::new(None),
            resolver: RwLock::new(Arc::new(NoSearchPath)),
        }
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Watch the project directory and index everything in it.
    async fn start_monitoring(&self) {
        let (root, classifier) = {
            let mut state = self.state.write().await;
            if !state.config.file_monitor {
                log::info!("File monitoring disabled by configuration");
                return;
            }
            let Some(root) = state.start_monitoring() else {
                return;
            };
            (root, state.project_index.classifier().clone())
        };

        match FileMonitor::start(&root, classifier.clone()) {
            Ok((monitor, events)) => {
                *self.lock_monitor() = Some(monitor);
                tokio::spawn(forward_changes(events, self.state.clone(), self.indexer.clone()));
            }
            Err(e) => {
                log::warn!("Project monitoring unavailable: {e:#}");
                self.state.write().await.stop_monitoring();
                return;
            }
        }

        let walk_root = root.clone();
        let files = match tokio::task::spawn_blocking(move || enumerate_project(&walk_root, &classifier)).await {
            Ok(files) => files,
            Err(e) => {
                log::error!("Enumerating {} failed: {e}", root.display());
                Vec::new()
            }
        };

        let (request, config) = {
            let mut state = self.state.write().await;
            // Monitoring may have been switched off during the walk
            if !state.is_monitoring() {
                return;
            }
            (state.project_index.enqueue_many(files), state.config.clone())
        };
        self.indexer.schedule(request, &config);
    }

    async fn stop_monitoring(&self) {
        self.lock_monitor().take();
        self.indexer.cancel();
        self.state.write().await.stop_monitoring();
    }

    fn lock_monitor(&self) -> std::sync::MutexGuard<'_, Option<FileMonitor>> {
        self.monitor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick the search-path resolver for the current configuration.
    async fn refresh_resolver(&self) {
        let (enabled, r_path) = {
            let state = self.state.read().await;
            (state.config.search_path_lookup, state.config.r_path.clone())
        };

        let resolver: Arc<dyn SearchPathResolver> = if enabled {
            match tokio::task::spawn_blocking(move || RSubprocess::new(r_path)).await {
                Ok(Some(subprocess)) => Arc::new(RSearchPath::new(subprocess)),
                Ok(None) => {
                    log::info!("No R interpreter found; search path lookup disabled");
                    Arc::new(NoSearchPath)
                }
                Err(e) => {
                    log::error!("R discovery failed: {e}");
                    Arc::new(NoSearchPath)
                }
            }
        } else {
            Arc::new(NoSearchPath)
        };
        *self.resolver.write().await = resolver;
    }

    // ========================================================================
    // Custom requests
    // ========================================================================

    async fn search_code(&self, params: SearchCodeParams) -> Result<SearchCodeResponse> {
        let state = self.state.read().await;
        let max_results = params.max_results.unwrap_or(state.config.default_max_results);
        let results = state.dispatcher().search_code(&params.term, max_results);
        Ok(SearchCodeResponse::from(&results))
    }

    async fn function_definition(
        &self,
        params: FunctionDefinitionParams,
    ) -> Result<FunctionDefinitionResponse> {
        let token = FunctionToken::guess(&params.line, params.pos);
        let lookup = self.state.read().await.dispatcher().lookup_definition(&token);
        let resolver = self.resolver.read().await.clone();
        Ok(complete_definition(lookup, resolver.as_ref()).await.into())
    }
}

/// Queue watcher changes until the monitor is dropped.
async fn forward_changes(
    mut events: mpsc::UnboundedReceiver<Vec<PendingChange>>,
    state: Arc<RwLock<WorldState>>,
    indexer: Arc<IndexingDriver<WorldState>>,
) {
    while let Some(changes) = events.recv().await {
        let (request, config) = {
            let mut state = state.write().await;
            if !state.is_monitoring() {
                continue;
            }
            let request = apply_changes(&mut state.project_index, changes);
            (request, state.config.clone())
        };
        indexer.schedule(request, &config);
    }
    log::trace!("File change forwarding finished");
}

/// Settings changes that invalidate what the project index has tracked
fn tracking_changed(old: &SearchConfig, new: &SearchConfig) -> bool {
    old.file_monitor != new.file_monitor
        || old.trackable_extensions != new.trackable_extensions
        || old.trackable_file_names != new.trackable_file_names
        || old.text_extensions != new.text_extensions
        || old.indexable_extensions != new.indexable_extensions
        || old.excluded_directories != new.excluded_directories
}

fn lsp_symbol_kind(kind: SymbolKind) -> tower_lsp::lsp_types::SymbolKind {
    use tower_lsp::lsp_types::SymbolKind as Lsp;
    match kind {
        SymbolKind::None => Lsp::VARIABLE,
        SymbolKind::Function => Lsp::FUNCTION,
        SymbolKind::Method => Lsp::METHOD,
        SymbolKind::Class => Lsp::CLASS,
        SymbolKind::Enum => Lsp::ENUM,
        SymbolKind::Namespace => Lsp::NAMESPACE,
    }
}

/// 1-based line/column to an LSP position. Columns are char counts.
fn lsp_position(line: u32, column: u32) -> Position {
    Position::new(line.saturating_sub(1), column.saturating_sub(1))
}

/// Files first, then symbols, each in ranked order. Entries whose path
/// cannot be expressed as a `file:` URI are skipped.
#[allow(deprecated)]
fn symbol_information(results: &CodeSearchResults, aliaser: &PathAliaser) -> Vec<SymbolInformation> {
    let mut out = Vec::with_capacity(results.files.len() + results.symbols.len());
    for file in &results.files {
        let Ok(uri) = Url::from_file_path(aliaser.resolve(&file.path)) else {
            continue;
        };
        out.push(SymbolInformation {
            name: file.filename.clone(),
            kind: tower_lsp::lsp_types::SymbolKind::FILE,
            tags: None,
            deprecated: None,
            location: Location::new(uri, Range::default()),
            container_name: None,
        });
    }
    for symbol in &results.symbols {
        let Ok(uri) = Url::from_file_path(aliaser.resolve(&symbol.context)) else {
            continue;
        };
        let position = lsp_position(symbol.line, symbol.column);
        let extra = symbol.extra_info();
        out.push(SymbolInformation {
            name: symbol.name.clone(),
            kind: lsp_symbol_kind(symbol.kind),
            tags: None,
            deprecated: None,
            location: Location::new(uri, Range::new(position, position)),
            container_name: (!extra.is_empty()).then_some(extra),
        });
    }
    out
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing kestrel");

        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri)
            .and_then(|uri| uri.to_file_path().ok());

        {
            let mut state = self.state.write().await;
            if let Some(options) = &params.initialization_options {
                if let Some(config) = parse_search_config(options, &state.config) {
                    state.set_config(config);
                }
            }
            if let Some(root) = &root {
                log::info!("Project directory: {}", root.display());
            }
            state.set_project(root);
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                definition_provider: Some(OneOf::Left(true)),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: String::from("kestrel"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("kestrel initialized");
        self.start_monitoring().await;
        self.refresh_resolver().await;
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("kestrel shutting down");
        self.stop_monitoring().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let mut state = self.state.write().await;
        state.open_document(doc.uri, &doc.text, Some(doc.version));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let doc = params.text_document;
        let mut state = self.state.write().await;
        state.change_document(&doc.uri, params.content_changes, Some(doc.version));
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let mut state = self.state.write().await;
        state.close_document(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let (restart, interpreter_changed) = {
            let mut state = self.state.write().await;
            let Some(config) = parse_search_config(&params.settings, &state.config) else {
                log::trace!("Configuration change without search settings");
                return;
            };
            let restart = tracking_changed(&state.config, &config);
            let interpreter_changed = state.config.search_path_lookup != config.search_path_lookup
                || state.config.r_path != config.r_path;
            state.set_config(config);
            (restart, interpreter_changed)
        };

        if restart {
            log::info!("Tracking rules changed; restarting project monitoring");
            self.stop_monitoring().await;
            self.start_monitoring().await;
        }
        if interpreter_changed {
            self.refresh_resolver().await;
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let current = self.state.read().await.project.as_ref().map(|p| p.directory.clone());
        let removed = params
            .event
            .removed
            .iter()
            .filter_map(|f| f.uri.to_file_path().ok())
            .any(|path| Some(&path) == current.as_ref());
        let added = params
            .event
            .added
            .iter()
            .find_map(|f| f.uri.to_file_path().ok());

        if current.is_some() && !removed {
            return;
        }
        if removed {
            self.stop_monitoring().await;
        }
        if removed || added.is_some() {
            self.state.write().await.set_project(added);
            self.start_monitoring().await;
        }
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> Result<Option<Vec<SymbolInformation>>> {
        let state = self.state.read().await;
        let results = state
            .dispatcher()
            .search_code(&params.query, state.config.default_max_results);
        Ok(Some(symbol_information(&results, &state.aliaser)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let uri = params.text_document_position_params.text_document.uri;

        let lookup = {
            let state = self.state.read().await;
            let Some(line) = state.buffers.get(&uri).and_then(|doc| doc.line(position.line)) else {
                return Ok(None);
            };
            let pos = utf16_offset_to_char_offset(&line, position.character);
            state.dispatcher().lookup_definition(&FunctionToken::guess(&line, pos))
        };

        let resolver = self.resolver.read().await.clone();
        let definition = complete_definition(lookup, resolver.as_ref()).await;
        if let Some(ns) = &definition.search_path_definition {
            log::trace!("{} is defined in {}", ns.name, ns.namespace);
        }
        let Some(location) = definition.location else {
            return Ok(None);
        };
        let Ok(target) = Url::from_file_path(&location.file) else {
            return Ok(None);
        };
        let start = lsp_position(location.line, location.column);
        Ok(Some(GotoDefinitionResponse::Scalar(Location::new(
            target,
            Range::new(start, start),
        ))))
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new)
        .custom_method(SEARCH_CODE_METHOD, Backend::search_code)
        .custom_method(FUNCTION_DEFINITION_METHOD, Backend::function_definition)
        .finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
