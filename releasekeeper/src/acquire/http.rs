//! HTTP transport for portal download URLs.
//!
//! Downloads run on the blocking pool with `reqwest::blocking`, streaming
//! into the partial-file marker and renaming it onto the target when the
//! body has been fully written.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{AcquireHandle, AcquisitionError, OutcomeSender, Transport};
use crate::model::ArtifactRecord;

/// Default timeout for a single HTTP request in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Buffer size for streaming the response body (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Downloads an artifact from the URL in its `source` field.
///
/// Relative sources are joined onto the base URL when one is configured.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Option<String>,
    pub(crate) timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn resolve_url(&self, record: &ArtifactRecord) -> Result<String, AcquisitionError> {
        let source = record
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AcquisitionError::NoSource(record.natural_key.clone()))?;

        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(source.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                source.trim_start_matches('/')
            )),
            None => Err(AcquisitionError::Http {
                url: source.to_string(),
                reason: "relative source without a base URL".to_string(),
            }),
        }
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn begin_acquire(
        &self,
        record: &ArtifactRecord,
        target: &Path,
        marker: &Path,
        cancel: CancellationToken,
    ) -> Result<AcquireHandle, AcquisitionError> {
        let url = self.resolve_url(record)?;

        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
        }
        let file = File::create(marker).map_err(|e| AcquisitionError::io(marker, e))?;

        let (tx, handle) = AcquireHandle::channel();
        let job = Download {
            url,
            target: target.to_path_buf(),
            marker: marker.to_path_buf(),
            timeout: self.timeout,
            cancel,
        };
        tokio::task::spawn_blocking(move || job.run(file, tx));

        Ok(handle)
    }
}

/// One download running on the blocking pool.
struct Download {
    url: String,
    target: PathBuf,
    marker: PathBuf,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Download {
    fn run(self, file: File, tx: OutcomeSender) {
        match self.stream(file) {
            Ok(bytes) => {
                debug!(url = %self.url, target = %self.target.display(), bytes, "Download finished");
                let _ = tx.send(Ok(()));
            }
            Err(e) => {
                let _ = std::fs::remove_file(&self.marker);
                let _ = tx.send(Err(e));
            }
        }
    }

    fn stream(&self, file: File) -> Result<u64, AcquisitionError> {
        // The blocking client owns a runtime of its own, so it is built and
        // dropped on this thread rather than inside the async executor.
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.http_error(format!("failed to create HTTP client: {}", e)))?;

        let mut response = client.get(&self.url).send().map_err(|e| {
            if e.is_timeout() {
                self.http_error(format!("timed out after {}s", self.timeout.as_secs()))
            } else {
                self.http_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.http_error(format!("GET request failed with status {}", status)));
        }

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AcquisitionError::Cancelled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| self.http_error(format!("Read error: {}", e)))?;
            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| AcquisitionError::io(&self.marker, e))?;
            downloaded += bytes_read as u64;
        }

        writer
            .flush()
            .map_err(|e| AcquisitionError::io(&self.marker, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| AcquisitionError::io(&self.marker, e))?;
        drop(writer);

        std::fs::rename(&self.marker, &self.target)
            .map_err(|e| AcquisitionError::io(&self.target, e))?;
        Ok(downloaded)
    }

    fn http_error(&self, reason: String) -> AcquisitionError {
        AcquisitionError::Http {
            url: self.url.clone(),
            reason,
        }
    }
}
