//! vidfetch: client for a remote video download backend
//!
//! The backend parses video URLs, runs download jobs and serves the finished
//! files. This crate drives that lifecycle from the client side: parse a URL into
//! metadata, start a job, poll its progress, retrieve the artifact under the name
//! from its `Content-Disposition` header and keep the download history current.

pub mod client;
pub mod config;
pub mod disposition;
pub mod error;
pub mod history;
pub mod save;
pub mod session;
pub mod task;

pub use error::{Error, Result};
pub use session::Session;
