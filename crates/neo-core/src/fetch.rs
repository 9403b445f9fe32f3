//! Model bundle downloads
//!
//! Bundles are zip archives hosted on a trusted model hub. Downloads are
//! streamed in fixed-size chunks into a uniquely named temp file under the
//! working directory and only persisted once the whole body has arrived
//! within the size cap.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::FetchConfig;
use crate::error::{NeoError, Result};

/// Prefix of downloaded archive file names (`model<random>.zip`)
pub const ARCHIVE_PREFIX: &str = "model";

/// Progress callback: (bytes received so far, declared total if known)
pub type FetchProgress = Box<dyn Fn(u64, Option<u64>) + Send>;

/// A remote bundle the user asked for
#[derive(Debug, Clone)]
pub struct RemoteBundleRequest {
    pub url: String,
    /// Catalog name; empty means "derive from the weight file"
    pub desired_name: String,
}

impl RemoteBundleRequest {
    pub fn new(url: impl Into<String>, desired_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            desired_name: desired_name.into(),
        }
    }
}

/// An archive fully written to disk
#[derive(Debug, Clone)]
pub struct DownloadedArchive {
    pub local_path: PathBuf,
    pub byte_size: u64,
}

/// Downloads model archives from trusted hosts
pub struct ArchiveFetcher {
    agent: ureq::Agent,
    config: FetchConfig,
    work_dir: PathBuf,
}

impl ArchiveFetcher {
    pub fn new(config: FetchConfig, work_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.read_timeout_secs))
            .build();
        Self {
            agent,
            config,
            work_dir: work_dir.into(),
        }
    }

    /// Rewrite a hub "view" URL to the raw download form and check its host
    ///
    /// Fails with [`NeoError::InvalidSource`] without touching the network.
    pub fn normalize_url(&self, url: &str) -> Result<Url> {
        let rewritten = url.trim().replace("/blob/", "/resolve/");
        let invalid = |reason: &str| NeoError::InvalidSource {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(&rewritten).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(invalid("only http(s) URLs are supported"));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("URL has no host"))?
            .to_ascii_lowercase();

        let trusted = self
            .config
            .trusted_hosts
            .iter()
            .any(|t| host == *t || host.ends_with(&format!(".{}", t)));
        if !trusted {
            return Err(invalid(&format!(
                "host must be one of: {}",
                self.config.trusted_hosts.join(", ")
            )));
        }
        Ok(parsed)
    }

    /// Download a bundle archive into the working directory
    pub fn fetch(&self, url: &str, progress: Option<FetchProgress>) -> Result<DownloadedArchive> {
        let url = self.normalize_url(url)?;
        fs::create_dir_all(&self.work_dir)?;

        log::info!("Downloading model bundle from {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| NeoError::DownloadFailed(e.to_string()))?;

        let declared: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.trim().parse().ok());

        if let Some(size) = declared {
            if size > self.config.max_bytes {
                return Err(NeoError::TooLarge {
                    size,
                    limit: self.config.max_bytes,
                });
            }
        }

        // Removed on drop unless persisted below
        let mut temp = tempfile::Builder::new()
            .prefix(ARCHIVE_PREFIX)
            .suffix(".zip")
            .rand_bytes(8)
            .tempfile_in(&self.work_dir)?;

        let mut reader = response.into_reader();
        let byte_size = copy_capped(
            &mut reader,
            temp.as_file_mut(),
            declared,
            self.config.max_bytes,
            self.config.chunk_size,
            progress.as_deref(),
        )?;

        if let Some(expected) = declared {
            if byte_size != expected {
                return Err(NeoError::DownloadFailed(format!(
                    "Download incomplete: expected {} bytes, got {}",
                    expected, byte_size
                )));
            }
        }

        let (_, local_path) = temp.keep().map_err(|e| NeoError::Io(e.error))?;

        log::info!(
            "Successfully downloaded {:?} ({} bytes)",
            local_path.file_name().unwrap_or_default(),
            byte_size
        );

        Ok(DownloadedArchive {
            local_path,
            byte_size,
        })
    }
}

/// Stream `reader` into `writer` chunk by chunk, aborting once more than
/// `limit` bytes have arrived regardless of what the server declared
fn copy_capped<R: Read + ?Sized, W: Write>(
    reader: &mut R,
    writer: &mut W,
    declared: Option<u64>,
    limit: u64,
    chunk_size: usize,
    progress: Option<&(dyn Fn(u64, Option<u64>) + Send)>,
) -> Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut received: u64 = 0;

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        received += n as u64;
        if received > limit {
            return Err(NeoError::TooLarge {
                size: received,
                limit,
            });
        }
        writer.write_all(&buffer[..n])?;

        if let Some(cb) = progress {
            cb(received, declared);
        }
    }

    writer.flush()?;
    Ok(received)
}

/// Render a 20-column text progress bar, e.g. `[=====>               ] 25%`
///
/// Without a known total only the byte count is shown.
pub fn progress_bar(current: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let ratio = (current as f64 / total as f64).min(1.0);
            let filled = (ratio * 20.0) as usize;
            format!(
                "[{}>{}] {}%",
                "=".repeat(filled),
                " ".repeat(20 - filled),
                (ratio * 100.0) as u32
            )
        }
        _ => format!("[{} bytes]", current),
    }
}
