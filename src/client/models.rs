//! Wire types for the backend HTTP API
//!
//! The backend speaks a small JSON envelope (`success`, `data`, `error`) on every
//! endpoint except artifact retrieval, which returns the raw file.

use std::fmt;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::Result;

/// Metadata key holding the cover image URL
pub const COVER_FIELD: &str = "封面大图";

/// Generic response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Server supplied error message, or a placeholder when the backend gave none
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressResponse {
    pub progress: i64,
}

impl ProgressResponse {
    /// Reported progress clamped into 0..=100
    pub fn percent(&self) -> u8 {
        self.progress.clamp(0, 100) as u8
    }
}

/// Ordered field name to value mapping returned by the parse endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    fields: Vec<(String, String)>,
}

impl VideoMetadata {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.get(COVER_FIELD).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for VideoMetadata {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect();
        Self { fields }
    }
}

/// A finished download as recorded by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "视频标题", alias = "title", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "文件名", alias = "file_name", default, deserialize_with = "null_as_default")]
    pub file_name: String,
    #[serde(rename = "文件大小", alias = "file_size", default, deserialize_with = "null_as_default")]
    pub file_size: u64,
    #[serde(rename = "下载时间", alias = "downloaded_at", default, deserialize_with = "null_as_default")]
    pub downloaded_at: String,
}

/// A `null` field reads the same as a missing one
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Artifact bytes as they arrive from the backend, chunk by chunk
pub type ArtifactBody = BoxStream<'static, Result<Vec<u8>>>;

/// Response to the retrieval call. The body is not read yet.
pub struct Artifact {
    pub content_disposition: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ArtifactBody,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("content_disposition", &self.content_disposition)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keeps_backend_order() {
        let body = r#"{"success":true,"data":{
            "封面大图":"https://i.example.com/cover.jpg",
            "视频标题":"Demo",
            "视频描述":null,
            "上传日期":"20250101",
            "文件大小":1048576
        }}"#;
        let envelope: Envelope<Map<String, Value>> = serde_json::from_str(body).unwrap();
        let metadata = VideoMetadata::from(envelope.data.unwrap());

        let names: Vec<_> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["封面大图", "视频标题", "视频描述", "上传日期", "文件大小"]);
        assert_eq!(metadata.cover_url(), Some("https://i.example.com/cover.jpg"));
        assert_eq!(metadata.get("视频描述"), Some(""));
        assert_eq!(metadata.get("文件大小"), Some("1048576"));
    }

    #[test]
    fn test_history_record_accepts_both_key_styles() {
        let native = r#"{"视频标题":"t","文件名":"a.mp4","文件大小":42,"下载时间":"2025-01-01 10:00:00"}"#;
        let english = r#"{"title":"t","file_name":"a.mp4","file_size":42,"downloaded_at":"2025-01-01 10:00:00"}"#;
        let a: HistoryRecord = serde_json::from_str(native).unwrap();
        let b: HistoryRecord = serde_json::from_str(english).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.file_size, 42);
    }

    #[test]
    fn test_history_record_null_fields_read_as_empty() {
        let body = r#"{"success":true,"data":[
            {"视频标题":null,"文件名":"a.mp4","文件大小":null,"下载时间":"2025-01-01 10:00:00"},
            {"视频标题":"t","文件名":"b.mp4","文件大小":7,"下载时间":null}
        ]}"#;
        let envelope: Envelope<Vec<HistoryRecord>> = serde_json::from_str(body).unwrap();
        let records = envelope.data.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "");
        assert_eq!(records[0].file_name, "a.mp4");
        assert_eq!(records[0].file_size, 0);
        assert_eq!(records[1].downloaded_at, "");
        assert_eq!(records[1].file_size, 7);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(ProgressResponse { progress: 130 }.percent(), 100);
        assert_eq!(ProgressResponse { progress: -5 }.percent(), 0);
        assert_eq!(ProgressResponse { progress: 42 }.percent(), 42);
    }

    #[test]
    fn test_envelope_error_message_placeholder() {
        let env: Envelope<()> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!env.success);
        assert_eq!(env.error_message(), "unknown error");
    }
}
