//! Client-side save of retrieved artifacts

use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, trace};

use crate::client::ArtifactBody;
use crate::error::Result;

/// Media type every retrieved artifact is saved as
pub const ARTIFACT_MEDIA_TYPE: &str = "video/mp4";

/// Where a saved artifact ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Where a finished download ends up
#[allow(async_fn_in_trait)]
pub trait ArtifactSink {
    /// Drain `body` into storage under `file_name`
    async fn save(&self, file_name: &str, media_type: &str, body: ArtifactBody)
    -> Result<StoredFile>;
}

/// Saves artifacts into a directory without overwriting existing files
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `name.ext`, then `name (1).ext`, `name (2).ext`, ... until one is free
    async fn free_path(&self, file_name: &str) -> io::Result<PathBuf> {
        let candidate = self.dir.join(file_name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (file_name, None),
        };
        let mut n = 1;
        loop {
            let name = match ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.dir.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Move a completed part file to the first free name
    async fn persist(&self, mut part: TempPath, file_name: &str) -> io::Result<PathBuf> {
        loop {
            let path = self.free_path(file_name).await?;
            match part.persist_noclobber(&path) {
                Ok(()) => return Ok(path),
                // Taken between the lookup and the rename
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => part = e.path,
                Err(e) => return Err(e.error),
            }
        }
    }
}

impl ArtifactSink for DirectorySink {
    async fn save(
        &self,
        file_name: &str,
        media_type: &str,
        mut body: ArtifactBody,
    ) -> Result<StoredFile> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // The part file is removed when `part` drops, so an abandoned save leaves
        // nothing behind and never claims the final name
        let (file, part) = tempfile::Builder::new()
            .prefix(".vidfetch-")
            .suffix(".part")
            .tempfile_in(&self.dir)?
            .into_parts();
        debug!(part = ?part, media_type, "Writing artifact");

        let mut file = File::from_std(file);
        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            trace!(bytes, chunk_size = chunk.len(), "Wrote chunk");
        }
        file.flush().await?;
        file.shutdown().await?;
        drop(file);

        let path = self.persist(part, file_name).await?;
        info!(path = ?path, bytes, "Artifact saved");
        Ok(StoredFile { path, bytes })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use futures_util::TryStreamExt;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SavedFile {
        pub file_name: String,
        pub media_type: String,
        pub payload: Vec<u8>,
    }

    /// Keeps saved artifacts in memory
    #[derive(Default)]
    pub struct MemorySink {
        pub saved: Mutex<Vec<SavedFile>>,
    }

    impl ArtifactSink for MemorySink {
        async fn save(
            &self,
            file_name: &str,
            media_type: &str,
            body: ArtifactBody,
        ) -> Result<StoredFile> {
            let payload: Vec<u8> = body.try_concat().await?;
            let bytes = payload.len() as u64;
            self.saved.lock().unwrap().push(SavedFile {
                file_name: file_name.to_string(),
                media_type: media_type.to_string(),
                payload,
            });
            Ok(StoredFile {
                path: PathBuf::from(file_name),
                bytes,
            })
        }
    }
}
