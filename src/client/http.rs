//! HTTP transport for the backend API
//!
//! Every endpoint is a plain GET with query parameters. JSON endpoints go through
//! [`ApiClient::get_json`]; artifact retrieval hands back the raw body as a chunk
//! stream along with the headers needed to name the file.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{
    Client, Url,
    header::{self, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};

use super::backend::Backend;
use super::models::{Artifact, Envelope, HistoryRecord, ProgressResponse, VideoMetadata};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()?;

        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last path segment unless the base ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path)?;
        trace!(%url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

impl Backend for ApiClient {
    #[instrument(level = "debug", skip(self))]
    async fn parse(&self, url: &str) -> Result<VideoMetadata> {
        let envelope: Envelope<Map<String, Value>> =
            self.get_json("api/parse", &[("url", url)]).await?;

        if !envelope.success {
            let message = envelope.error_message();
            warn!(error = %message, "Backend rejected parse request");
            return Err(Error::ParseRejected(message));
        }

        let metadata = VideoMetadata::from(envelope.data.unwrap_or_default());
        debug!(fields = metadata.len(), "Parsed video metadata");
        Ok(metadata)
    }

    #[instrument(level = "debug", skip(self))]
    async fn start_job(&self, url: &str, task_id: &str) -> Result<()> {
        let envelope: Envelope<Value> = self
            .get_json("api/download", &[("url", url), ("task_id", task_id)])
            .await?;

        if !envelope.success {
            return Err(Error::ServerRejected(envelope.error_message()));
        }
        info!("Download job started");
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn progress(&self, task_id: &str) -> Result<u8> {
        let response: ProgressResponse = self
            .get_json("api/progress", &[("task_id", task_id)])
            .await?;
        Ok(response.percent())
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_artifact(&self, url: &str, task_id: &str) -> Result<Artifact> {
        let endpoint = self.endpoint("api/download")?;
        let response = self
            .client
            .get(endpoint)
            .query(&[("url", url), ("task_id", task_id)])
            .send()
            .await?
            .error_for_status()?;

        let headers = response.headers();
        // Header values may carry raw UTF-8, which HeaderValue::to_str refuses
        let content_disposition = headers
            .get(header::CONTENT_DISPOSITION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        trace!(?content_disposition, ?content_type, "Artifact response headers");

        // The backend answers with a JSON envelope instead of the file when the
        // artifact is missing or still being flushed
        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            let envelope: Envelope<Value> = response.json().await?;
            return Err(Error::ServerRejected(envelope.error_message()));
        }

        let content_length = response.content_length();
        info!(?content_length, "Artifact response received, streaming body");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(Vec::from).map_err(Error::from))
            .boxed();

        Ok(Artifact {
            content_disposition,
            content_type,
            content_length,
            body,
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn history(&self) -> Result<Vec<HistoryRecord>> {
        let envelope: Envelope<Vec<HistoryRecord>> = self.get_json("api/history", &[]).await?;
        if !envelope.success {
            return Err(Error::ServerRejected(envelope.error_message()));
        }
        Ok(envelope.data.unwrap_or_default())
    }
}
