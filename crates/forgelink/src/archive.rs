//! Repository archive extraction.
//!
//! Adapters download a gzipped tarball and hand the bytes to an
//! [`ArchiveExtractor`]. Providers whose archives carry no repository
//! metadata also get a [`RemoteMarker`] written next to the extracted tree.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::platform::ProviderKind;

/// File name of the remote marker written into extracted trees.
pub const MARKER_FILE: &str = ".forgelink-remote.json";

/// Where an extracted tree came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMarker {
    pub provider: ProviderKind,
    pub owner: String,
    pub repo: String,
    pub http_clone_url: String,
    pub ssh_clone_url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Unpacks downloaded archives.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract a gzipped tarball into `dest`, dropping the first
    /// `strip_components` path components of every entry.
    fn extract(&self, archive: &[u8], dest: &Path, strip_components: usize) -> io::Result<()>;

    /// Record the archive's origin inside `dest`.
    fn write_marker(&self, dest: &Path, marker: &RemoteMarker) -> io::Result<()>;
}

/// Default extractor backed by `tar` and `flate2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extract(&self, archive: &[u8], dest: &Path, strip_components: usize) -> io::Result<()> {
        fs::create_dir_all(dest)?;
        let mut archive = tar::Archive::new(GzDecoder::new(archive));
        let mut written = 0usize;
        let mut links = 0usize;

        for entry in archive.entries()? {
            let mut entry = entry?;
            let kind = entry.header().entry_type();
            if kind.is_pax_global_extensions() || kind.is_pax_local_extensions() {
                continue;
            }
            // A link could point outside `dest` and later entries would be
            // written through it.
            if kind.is_symlink() || kind.is_hard_link() {
                tracing::debug!("Skipping link entry {}", entry.path()?.display());
                links += 1;
                continue;
            }

            let path = entry.path()?.into_owned();
            let Some(relative) = strip(&path, strip_components)? else {
                continue;
            };

            let target = dest.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
            written += 1;
        }

        tracing::debug!(
            "Extracted {} entries into {} ({} links skipped)",
            written,
            dest.display(),
            links
        );
        Ok(())
    }

    fn write_marker(&self, dest: &Path, marker: &RemoteMarker) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(marker).map_err(io::Error::other)?;
        fs::write(dest.join(MARKER_FILE), json)
    }
}

/// Drop leading components. `None` when nothing is left; an error when the
/// remainder would escape the destination.
fn strip(path: &Path, components: usize) -> io::Result<Option<PathBuf>> {
    let rest: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .skip(components)
        .collect();
    if rest.as_os_str().is_empty() {
        return Ok(None);
    }
    if rest.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("archive entry {} escapes the destination", path.display()),
        ));
    }
    Ok(Some(rest))
}

/// Build an in-memory gzipped tarball of regular files.
#[cfg(test)]
pub(crate) fn test_tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}
