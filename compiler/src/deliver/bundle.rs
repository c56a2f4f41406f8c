//! `.adapters` bundle format
//!
//! A single file carrying every generated class, each compressed with zstd.
//!
//! # Binary Layout
//!
//! ```text
//! [entry 1 data][entry 2 data]...[entry N data][TOC (postcard)][toc_size: u32][version: u32][magic: "SADP"]
//! ```
//!
//! The footer (last 12 bytes) is read first, then the TOC is
//! `postcard`-deserialized from the `toc_size` bytes right before it.
//! All footer integers are little-endian.

use super::DeliverError;
use crate::adapter::GeneratedArtifact;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BUNDLE_MAGIC: &[u8; 4] = b"SADP";
pub const BUNDLE_VERSION: u32 = 1;
const FOOTER_SIZE: usize = 12; // toc_size(4) + version(4) + magic(4)
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleToc {
    pub entries: Vec<BundleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Relative class-file path, `/`-separated
    pub path: String,
    /// Byte offset from the start of the file
    pub offset: u64,
    /// Compressed length
    pub size: u64,
    /// Length of the class file once decompressed
    pub raw_size: u64,
}

/// Accumulates class files and writes the bundle.
#[derive(Debug, Default)]
pub struct AdapterBundleBuilder {
    /// (path, compressed bytes, raw length)
    entries: Vec<(String, Vec<u8>, u64)>,
}

impl AdapterBundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_class(&mut self, path: &Path, class_bytes: &[u8]) -> Result<(), DeliverError> {
        let path = bundle_path(path)?;
        if self.entries.iter().any(|(existing, _, _)| *existing == path) {
            return Err(DeliverError::DuplicatePath(path));
        }
        let compressed = zstd::encode_all(class_bytes, COMPRESSION_LEVEL).map_err(DeliverError::Compression)?;
        self.entries.push((path, compressed, class_bytes.len() as u64));
        Ok(())
    }

    pub fn add_artifact(&mut self, artifact: &GeneratedArtifact) -> Result<(), DeliverError> {
        self.add_class(artifact.path(), artifact.content())
    }

    /// Serialize the bundle into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeliverError> {
        let mut out = Vec::new();
        let mut toc_entries = Vec::with_capacity(self.entries.len());
        let mut offset: u64 = 0;

        for (path, data, raw_size) in &self.entries {
            out.extend_from_slice(data);
            toc_entries.push(BundleEntry {
                path: path.clone(),
                offset,
                size: data.len() as u64,
                raw_size: *raw_size,
            });
            offset += data.len() as u64;
        }

        let toc = BundleToc {
            entries: toc_entries,
        };
        let toc_bytes = postcard::to_allocvec(&toc).map_err(DeliverError::Serialization)?;
        let toc_size = toc_bytes.len() as u32;
        out.extend_from_slice(&toc_bytes);

        out.extend_from_slice(&toc_size.to_le_bytes());
        out.extend_from_slice(&BUNDLE_VERSION.to_le_bytes());
        out.extend_from_slice(BUNDLE_MAGIC);
        Ok(out)
    }

    pub fn write(&self, output: &Path) -> Result<(), DeliverError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, bytes)?;
        log::info!(
            "Wrote bundle {} ({} class(es))",
            output.display(),
            self.entries.len()
        );
        Ok(())
    }
}

/// A decoded bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterBundle {
    classes: Vec<(PathBuf, Vec<u8>)>,
}

impl AdapterBundle {
    pub fn read(path: &Path) -> Result<Self, DeliverError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DeliverError> {
        if data.len() < FOOTER_SIZE {
            return Err(DeliverError::InvalidMagic);
        }

        let footer_start = data.len() - FOOTER_SIZE;
        let toc_size = read_u32_le(&data[footer_start..footer_start + 4]);
        let version = read_u32_le(&data[footer_start + 4..footer_start + 8]);
        let magic = &data[footer_start + 8..];

        if magic != BUNDLE_MAGIC {
            return Err(DeliverError::InvalidMagic);
        }
        if version != BUNDLE_VERSION {
            return Err(DeliverError::UnsupportedVersion(version));
        }

        let toc_size = toc_size as usize;
        if toc_size > footer_start {
            return Err(DeliverError::TocTooLarge(toc_size as u64));
        }
        let toc_start = footer_start - toc_size;
        let toc: BundleToc =
            postcard::from_bytes(&data[toc_start..footer_start]).map_err(DeliverError::Serialization)?;

        let mut classes = Vec::with_capacity(toc.entries.len());
        for entry in &toc.entries {
            let start = entry.offset as usize;
            let end = start.saturating_add(entry.size as usize);
            if end > toc_start {
                return Err(DeliverError::EntryOutOfBounds {
                    path: entry.path.clone(),
                    start,
                    end,
                });
            }
            let raw = zstd::decode_all(&data[start..end]).map_err(DeliverError::Compression)?;
            if raw.len() as u64 != entry.raw_size {
                return Err(DeliverError::SizeMismatch {
                    path: entry.path.clone(),
                    expected: entry.raw_size,
                    found: raw.len() as u64,
                });
            }
            classes.push((entry.path.split('/').collect(), raw));
        }

        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.classes.iter().map(|(path, _)| path.as_path())
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.classes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[u8])> {
        self.classes.iter().map(|(p, b)| (p.as_path(), b.as_slice()))
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

/// Platform-independent `/`-separated form of a relative path.
fn bundle_path(path: &Path) -> Result<String, DeliverError> {
    let parts = path
        .components()
        .map(|c| match c {
            std::path::Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>();
    match parts {
        Some(parts) if !parts.is_empty() => Ok(parts.join("/")),
        _ => Err(DeliverError::InvalidPath(path.to_path_buf())),
    }
}
