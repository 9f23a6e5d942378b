use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_LIMIT: usize = 100;
pub const DEFAULT_HINT_LIMIT: usize = 20;

fn default_hint_limit() -> usize {
    DEFAULT_HINT_LIMIT
}

/// A structured query against one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub content: Option<String>,
    pub file_name: Option<String>,
    pub file_extension: Option<String>,
    pub file_path: Option<String>,
    pub case_sensitive: bool,
    pub phrase_query: bool,
    /// Exact primary-key lookup; every other field is ignored when set.
    pub code_pk: Option<String>,
    pub limit: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            content: None,
            file_name: None,
            file_extension: None,
            file_path: None,
            case_sensitive: false,
            phrase_query: false,
            code_pk: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchRequest {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn has_criteria(&self) -> bool {
        [
            &self.content,
            &self.file_name,
            &self.file_extension,
            &self.file_path,
            &self.code_pk,
        ]
        .iter()
        .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRequest {
    pub prefix: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_hint_limit")]
    pub limit: usize,
}

/// One indexed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDocument {
    /// Stable identity; survives renames.
    pub code_pk: String,
    pub file_name: String,
    /// Lowercased, without the dot.
    pub file_extension: String,
    pub file_path: String,
    pub content: String,
    /// Unix milliseconds.
    pub index_date: i64,
    /// Unix milliseconds of the source file's last modification.
    pub last_write_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    pub success: bool,
    pub status_desc: String,
}

/// Outcome of a public operation: never a panic, always a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult<T> {
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> FetchResult<T> {
    pub fn ok(result: T) -> Self {
        Self {
            status: FetchStatus {
                success: true,
                status_desc: "Successful".to_string(),
            },
            result: Some(result),
        }
    }

    pub fn failed(desc: impl Into<String>) -> Self {
        Self {
            status: FetchStatus {
                success: false,
                status_desc: desc.into(),
            },
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.success
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for FetchResult<T> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(result) => Self::ok(result),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}
