//! Shared types for the codesearch crates: requests, results, index
//! descriptors and the maintainer status machine.

pub mod descriptor;
pub mod path_filters;
pub mod request;
pub mod status;

pub use descriptor::{IndexDescriptor, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_SAVE_INTERVAL_SECS};
pub use request::{
    CodeDocument, FetchResult, FetchStatus, HintRequest, SearchRequest, DEFAULT_HINT_LIMIT,
    DEFAULT_SEARCH_LIMIT,
};
pub use status::IndexStatus;

pub fn serialize_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
