use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::ingest::ExtractedRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for extracted records.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    /// Store `record`, replacing whatever was stored before, and return
    /// where it went.
    async fn persist(&self, record: &ExtractedRecord) -> SinkResult<String>;
}

/// Writes the record as pretty-printed JSON to a single file.
///
/// The file is replaced atomically: the record is written to a uniquely named
/// file next to it and renamed over the old one, so concurrent writers never
/// share a temporary file and the last rename wins.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "record".into(), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl RecordSink for JsonFileSink {
    async fn persist(&self, record: &ExtractedRecord) -> SinkResult<String> {
        let mut body = serde_json::to_vec_pretty(record)?;
        body.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        let written = match tokio::fs::write(&tmp, &body).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }

        tracing::debug!(path = %self.path.display(), bytes = body.len(), "Record written");
        Ok(self.path.to_string_lossy().into_owned())
    }
}

/// Keeps every persisted record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ExtractedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExtractedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<ExtractedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    async fn persist(&self, record: &ExtractedRecord) -> SinkResult<String> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.push(record.clone());
        Ok(format!("memory://records/{}", records.len() - 1))
    }
}
