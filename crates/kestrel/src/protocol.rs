//
// protocol.rs
//
// Wire types for the kestrel/* custom requests
//

use serde::{Deserialize, Serialize};

use crate::search::{CodeSearchResults, FunctionDefinition, SearchPathDefinition};

pub const SEARCH_CODE_METHOD: &str = "kestrel/searchCode";
pub const FUNCTION_DEFINITION_METHOD: &str = "kestrel/functionDefinition";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCodeParams {
    pub term: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// File matches as parallel columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItems {
    pub filename: Vec<String>,
    pub path: Vec<String>,
}

/// Symbol matches as parallel columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItems {
    #[serde(rename = "type")]
    pub kind: Vec<i32>,
    pub name: Vec<String>,
    pub extra_info: Vec<String>,
    pub context: Vec<String>,
    pub line: Vec<u32>,
    pub column: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCodeResponse {
    pub file_items: FileItems,
    pub source_items: SourceItems,
    pub more_available: bool,
}

impl From<&CodeSearchResults> for SearchCodeResponse {
    fn from(results: &CodeSearchResults) -> Self {
        let mut file_items = FileItems::default();
        for file in &results.files {
            file_items.filename.push(file.filename.clone());
            file_items.path.push(file.path.clone());
        }

        let mut source_items = SourceItems::default();
        for symbol in &results.symbols {
            source_items.kind.push(symbol.kind.code());
            source_items.name.push(symbol.name.clone());
            source_items.extra_info.push(symbol.extra_info());
            source_items.context.push(symbol.context.to_string());
            source_items.line.push(symbol.line);
            source_items.column.push(symbol.column);
        }

        Self {
            file_items,
            source_items,
            more_available: results.more_available,
        }
    }
}

/// Cursor position within a single line of source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionDefinitionParams {
    pub line: String,
    /// Character offset of the cursor in `line`
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefinitionPosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDefinitionResponse {
    /// `null` when no token was found at the cursor
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<DefinitionPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_path_definition: Option<SearchPathDefinition>,
}

impl From<FunctionDefinition> for FunctionDefinitionResponse {
    fn from(def: FunctionDefinition) -> Self {
        let (file, position) = match def.location {
            Some(location) => (
                Some(location.file.to_string_lossy().into_owned()),
                Some(DefinitionPosition {
                    line: location.line,
                    column: location.column,
                }),
            ),
            None => (None, None),
        };
        Self {
            function_name: def.function_name,
            file,
            position,
            search_path_definition: def.search_path_definition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{FileItem, SourceLocation};
    use crate::symbol::{test_symbol, SymbolKind};
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_search_code_response_is_columnar() {
        let mut method = test_symbol("~/p/a.R", "area", SymbolKind::Method, 0);
        method.signature = vec!["Circle".into()];
        method.line = 4;
        method.column = 2;
        let results = CodeSearchResults {
            files: vec![FileItem {
                filename: "a.R".into(),
                path: "~/p/a.R".into(),
            }],
            symbols: vec![method, test_symbol("~/p/b.R", "plot", SymbolKind::Function, 0)],
            more_available: true,
        };

        let value = serde_json::to_value(SearchCodeResponse::from(&results)).unwrap();
        assert_eq!(
            value,
            json!({
                "file_items": { "filename": ["a.R"], "path": ["~/p/a.R"] },
                "source_items": {
                    "type": [2, 1],
                    "name": ["area", "plot"],
                    "extra_info": ["{Circle}", ""],
                    "context": ["~/p/a.R", "~/p/b.R"],
                    "line": [4, 1],
                    "column": [2, 1]
                },
                "more_available": true
            })
        );
    }

    #[test]
    fn test_search_code_params() {
        let params: SearchCodeParams = serde_json::from_value(json!({ "term": "plot" })).unwrap();
        assert_eq!(params.max_results, None);
        let params: SearchCodeParams =
            serde_json::from_value(json!({ "term": "plot", "maxResults": 5 })).unwrap();
        assert_eq!(params.max_results, Some(5));
    }

    #[test]
    fn test_function_definition_response_shapes() {
        let none = FunctionDefinitionResponse::from(FunctionDefinition::default());
        assert_eq!(serde_json::to_value(none).unwrap(), json!({ "function_name": null }));

        let found = FunctionDefinitionResponse::from(FunctionDefinition {
            function_name: Some("helper".into()),
            location: Some(SourceLocation {
                name: "helper".into(),
                file: PathBuf::from("/p/R/a.R"),
                line: 3,
                column: 1,
            }),
            search_path_definition: None,
        });
        assert_eq!(
            serde_json::to_value(found).unwrap(),
            json!({
                "function_name": "helper",
                "file": "/p/R/a.R",
                "position": { "line": 3, "column": 1 }
            })
        );

        let external = FunctionDefinitionResponse::from(FunctionDefinition {
            function_name: Some("median".into()),
            location: None,
            search_path_definition: Some(SearchPathDefinition {
                name: "median".into(),
                namespace: "package:stats".into(),
            }),
        });
        assert_eq!(
            serde_json::to_value(external).unwrap(),
            json!({
                "function_name": "median",
                "search_path_definition": { "name": "median", "namespace": "package:stats" }
            })
        );
    }
}
