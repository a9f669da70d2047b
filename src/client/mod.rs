//! Client side of the backend API
//!
//! This module provides the HTTP transport, the wire models and the [`Backend`]
//! trait the task lifecycle is written against.

mod backend;
mod http;
mod models;

pub use backend::Backend;
pub use http::ApiClient;
pub use models::{Artifact, ArtifactBody, COVER_FIELD, HistoryRecord, VideoMetadata};

#[cfg(test)]
pub(crate) use backend::testing;
