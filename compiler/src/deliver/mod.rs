//! Delivery of generated adapter classes
//!
//! Artifacts are either written out as a tree of `.class` files or packed
//! into a single `.adapters` bundle (see [`bundle`]).

pub mod bundle;

pub use bundle::{AdapterBundle, AdapterBundleBuilder, BundleEntry, BundleToc};

use crate::adapter::GeneratedArtifact;
use std::fmt;
use std::path::{Path, PathBuf};

/// Write every artifact under `dir`, creating package directories as needed.
/// Returns the written paths in artifact order.
pub fn write_to_dir(artifacts: &[GeneratedArtifact], dir: &Path) -> Result<Vec<PathBuf>, DeliverError> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let target = dir.join(artifact.path());
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, artifact.content())?;
        log::debug!("wrote {}", target.display());
        written.push(target);
    }
    log::info!("Wrote {} class file(s) to {}", written.len(), dir.display());
    Ok(written)
}

/// Pack every artifact into a bundle at `output`.
pub fn write_bundle(artifacts: &[GeneratedArtifact], output: &Path) -> Result<(), DeliverError> {
    let mut builder = AdapterBundleBuilder::new();
    for artifact in artifacts {
        builder.add_artifact(artifact)?;
    }
    builder.write(output)
}

#[derive(Debug)]
pub enum DeliverError {
    Io(std::io::Error),
    Compression(std::io::Error),
    Serialization(postcard::Error),
    InvalidMagic,
    UnsupportedVersion(u32),
    TocTooLarge(u64),
    EntryOutOfBounds { path: String, start: usize, end: usize },
    SizeMismatch { path: String, expected: u64, found: u64 },
    DuplicatePath(String),
    InvalidPath(PathBuf),
}

impl fmt::Display for DeliverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliverError::Io(e) => write!(f, "I/O error: {}", e),
            DeliverError::Compression(e) => write!(f, "zstd error: {}", e),
            DeliverError::Serialization(e) => write!(f, "failed to (de)serialize bundle TOC: {}", e),
            DeliverError::InvalidMagic => write!(f, "not a valid .adapters bundle (bad magic)"),
            DeliverError::UnsupportedVersion(v) => write!(
                f,
                "unsupported bundle version {} (expected {})",
                v,
                bundle::BUNDLE_VERSION
            ),
            DeliverError::TocTooLarge(s) => write!(f, "TOC size {} exceeds file size", s),
            DeliverError::EntryOutOfBounds { path, start, end } => {
                write!(f, "entry '{}' out of bounds: {}..{}", path, start, end)
            }
            DeliverError::SizeMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "entry '{}' decompressed to {} bytes, expected {}",
                path, found, expected
            ),
            DeliverError::DuplicatePath(path) => write!(f, "duplicate bundle entry '{}'", path),
            DeliverError::InvalidPath(path) => {
                write!(f, "'{}' is not a relative class-file path", path.display())
            }
        }
    }
}

impl std::error::Error for DeliverError {}

impl From<std::io::Error> for DeliverError {
    fn from(e: std::io::Error) -> Self {
        DeliverError::Io(e)
    }
}
