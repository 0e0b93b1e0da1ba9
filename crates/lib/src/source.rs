//! Release-archive download and extraction.
//!
//! Only one dependency ships as a versioned archive instead of a git tree.
//! The archive is downloaded over HTTPS into the build root, unpacked there,
//! and compiled through its own configure script by the orchestrator.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from fetching or unpacking a release archive.
#[derive(Debug, Error)]
pub enum SourceError {
  #[error("failed to download '{url}': {message}")]
  Download { url: String, message: String },

  #[error("failed to unpack '{archive}': {source}")]
  Unpack {
    archive: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The archive did not contain the expected top-level source directory.
  #[error("archive '{archive}' has no top-level source directory")]
  Layout { archive: PathBuf },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Downloads and unpacks release archives.
///
/// A seam so tests can substitute a stub that lays out a fake source tree.
pub trait ArchiveFetcher {
  /// Fetch `url` and unpack it under `dest`, returning the unpacked source
  /// directory.
  fn fetch_and_unpack(&mut self, url: &str, dest: &Path) -> Result<PathBuf, SourceError>;
}

/// Real fetcher: HTTPS download, gzip+tar unpack.
pub struct HttpArchiveFetcher;

impl ArchiveFetcher for HttpArchiveFetcher {
  fn fetch_and_unpack(&mut self, url: &str, dest: &Path) -> Result<PathBuf, SourceError> {
    let file_name = url.rsplit('/').next().unwrap_or("source.tar.gz");
    let archive_path = dest.join(file_name);

    info!(url, "downloading release archive");
    let response = reqwest::blocking::get(url)
      .and_then(|r| r.error_for_status())
      .map_err(|e| SourceError::Download {
        url: url.to_string(),
        message: e.to_string(),
      })?;
    let body = response.bytes().map_err(|e| SourceError::Download {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    let mut out = File::create(&archive_path)?;
    io::copy(&mut body.as_ref(), &mut out)?;

    unpack_archive(&archive_path, dest)
  }
}

/// Unpack a `.tar.gz` archive and return the top-level source directory it
/// contains.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<PathBuf, SourceError> {
  debug!(archive = %archive_path.display(), "unpacking");

  let tar_gz = File::open(archive_path)?;
  let mut archive = tar::Archive::new(GzDecoder::new(tar_gz));
  archive.unpack(dest).map_err(|e| SourceError::Unpack {
    archive: archive_path.to_path_buf(),
    source: e,
  })?;

  // openssl-1.1.1w.tar.gz unpacks to openssl-1.1.1w/
  let file_name = archive_path
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or_default();
  let source_dir = dest.join(file_name.trim_end_matches(".tar.gz"));
  if !source_dir.is_dir() {
    return Err(SourceError::Layout {
      archive: archive_path.to_path_buf(),
    });
  }

  Ok(source_dir)
}
