//! Data bundle protocol for moving whitelisted files across the boundary.
//!
//! Outbound, [`build_bundle`] packs every whitelisted file under the data
//! root into one zip archive. Inbound, [`merge_bundle`] unpacks an archive
//! returned by the pool. Merge is the only place remote bytes touch the local
//! filesystem, so every entry is checked before it is written:
//!
//! - names are normalized (`\` becomes `/`, empty and `.` segments dropped)
//! - absolute names, drive prefixes and any `..` segment are rejected
//! - the top-level segment must be in the current whitelist and never in
//!   the blacklist
//! - no path component below the root may be a symlink
//!
//! Rejected entries are skipped and never raise.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::types::is_blacklisted;

/// Errors that abort bundling or merging as a whole.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// An in-memory zip archive of whitelisted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBundle {
    bytes: Vec<u8>,
}

impl DataBundle {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Names of the file entries in the archive.
    pub fn entry_names(&self) -> Result<Vec<String>, BundleError> {
        let archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        Ok(archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect())
    }
}

/// Returns true if `item` names exactly one entry directly under the data
/// root (no separators, no `.` or `..`).
pub fn is_top_level_name(item: &str) -> bool {
    if item.is_empty() || item.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(item).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn archive_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn add_file(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    root: &Path,
    path: &Path,
    options: SimpleFileOptions,
) -> Result<(), BundleError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), root.display()),
        )
    })?;
    let contents = fs::read(path)?;
    writer.start_file(archive_name(rel), options)?;
    writer.write_all(&contents)?;
    Ok(())
}

/// Pack the whitelisted paths under `root` into a zip archive.
///
/// Returns `Ok(None)` when no whitelisted path exists, which tells the
/// bootstrap step to skip data provisioning. Symlinks are neither followed
/// nor included.
pub fn build_bundle(root: &Path, whitelist: &[String]) -> Result<Option<DataBundle>, BundleError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut found = false;
    let mut files = 0usize;

    for item in whitelist {
        if !is_top_level_name(item) || is_blacklisted(item) {
            warn!("Skipping unsafe whitelist entry {:?}", item);
            continue;
        }
        let path = root.join(item);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        if meta.file_type().is_file() {
            add_file(&mut writer, root, &path, options)?;
            found = true;
            files += 1;
        } else if meta.file_type().is_dir() {
            found = true;
            for entry in WalkDir::new(&path).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(|source| BundleError::Walk {
                    path: path.clone(),
                    source,
                })?;
                if entry.file_type().is_file() {
                    add_file(&mut writer, root, entry.path(), options)?;
                    files += 1;
                }
            }
        } else {
            debug!("Skipping non-regular whitelist entry {}", path.display());
        }
    }

    if !found {
        debug!("No whitelisted data present under {}", root.display());
        return Ok(None);
    }

    let bytes = writer.finish()?.into_inner();
    debug!("Built data bundle: {} files, {} bytes", files, bytes.len());
    Ok(Some(DataBundle::from_bytes(bytes)))
}

/// Normalize an archive entry name into relative path segments.
///
/// Returns `None` for names that could resolve outside the root.
fn normalize_entry_name(name: &str) -> Option<Vec<String>> {
    if name.contains('\0') {
        return None;
    }
    let name = name.replace('\\', "/");
    if name.starts_with('/') {
        return None;
    }

    let mut segments = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if segments.is_empty() && s.ends_with(':') => return None,
            s => segments.push(s.to_string()),
        }
    }
    if segments.is_empty() { None } else { Some(segments) }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Create the parent directories of `segments` below `root`, refusing to
/// pass through any symlink. Returns the target file path.
fn prepare_target(root: &Path, segments: &[String]) -> io::Result<Option<PathBuf>> {
    let Some((file_name, dirs)) = segments.split_last() else {
        return Ok(None);
    };

    let mut current = root.to_path_buf();
    for dir in dirs {
        current.push(dir);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Ok(None),
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
            Err(e) => return Err(e),
        }
    }

    current.push(file_name);
    if is_symlink(&current) {
        return Ok(None);
    }
    Ok(Some(current))
}

/// Unpack a returned archive into `root`, writing only whitelisted entries.
///
/// Returns the number of entries written. Unsafe or non-whitelisted entries
/// are skipped. Only an archive that cannot be opened at all is an error.
pub fn merge_bundle(bytes: &[u8], root: &Path, whitelist: &[String]) -> Result<usize, BundleError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(root)?;

    let mut accepted = 0usize;
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable archive entry #{}: {}", index, e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let Some(segments) = normalize_entry_name(&name) else {
            warn!("Rejected archive entry outside data root: {:?}", name);
            continue;
        };
        if is_blacklisted(&segments[0]) || !whitelist.iter().any(|w| *w == segments[0]) {
            debug!("Rejected non-whitelisted archive entry: {:?}", name);
            continue;
        }

        let target = match prepare_target(root, &segments) {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!("Rejected archive entry through symlink or non-directory: {:?}", name);
                continue;
            }
            Err(e) => {
                warn!("Failed to prepare {:?}: {}", name, e);
                continue;
            }
        };

        let written = File::create(&target).and_then(|mut out| io::copy(&mut entry, &mut out));
        match written {
            Ok(_) => accepted += 1,
            Err(e) => warn!("Failed to write {}: {}", target.display(), e),
        }
    }

    debug!("Merged {} archive entries into {}", accepted, root.display());
    Ok(accepted)
}
