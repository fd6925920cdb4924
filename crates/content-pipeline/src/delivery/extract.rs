//! Archive extraction on the blocking pool

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{ContentError, FileOperation, Result};
use crate::model::ArchiveKind;

/// Called with (entries done, total entries)
pub type ExtractProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

fn extraction_error(archive: &Path, reason: impl std::fmt::Display) -> ContentError {
    ContentError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_zip_blocking(
    archive_path: &Path,
    destination: &Path,
    progress: Option<&ExtractProgressCallback>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let file = File::open(archive_path).map_err(|e| ContentError::file_system(archive_path, FileOperation::Read, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extraction_error(archive_path, e))?;
    let total = archive.len() as u64;
    let mut extracted = 0;

    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("extract {}", archive_path.display())));
        }

        let mut entry = archive.by_index(index).map_err(|e| extraction_error(archive_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe entry '{}' in {}", entry.name(), archive_path.display());
            continue;
        };
        let out_path = destination.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| ContentError::file_system(&out_path, FileOperation::CreateDir, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ContentError::file_system(parent, FileOperation::CreateDir, e))?;
            }
            let mut out = File::create(&out_path).map_err(|e| ContentError::file_system(&out_path, FileOperation::Create, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| ContentError::file_system(&out_path, FileOperation::Write, e))?;
            extracted += 1;
        }

        if let Some(callback) = progress {
            callback(index as u64 + 1, total);
        }
    }
    Ok(extracted)
}

fn extract_7z_blocking(archive_path: &Path, destination: &Path, cancel: &CancellationToken) -> Result<u64> {
    if cancel.is_cancelled() {
        return Err(ContentError::cancelled(format!("extract {}", archive_path.display())));
    }
    sevenz_rust2::decompress_file(archive_path, destination).map_err(|e| extraction_error(archive_path, e))?;

    let count = walkdir::WalkDir::new(destination)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    Ok(count as u64)
}

/// Extract `archive_path` into `destination`, returning the number of files written
pub async fn extract_archive(
    archive_path: &Path,
    kind: ArchiveKind,
    destination: &Path,
    progress: Option<ExtractProgressCallback>,
    cancel: &CancellationToken,
) -> Result<u64> {
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|e| ContentError::file_system(destination, FileOperation::CreateDir, e))?;

    let archive: PathBuf = archive_path.to_path_buf();
    let dest = destination.to_path_buf();
    let cancel = cancel.clone();
    debug!("Extracting {} ({:?}) into {}", archive.display(), kind, dest.display());

    tokio::task::spawn_blocking(move || match kind {
        ArchiveKind::Zip => extract_zip_blocking(&archive, &dest, progress.as_ref(), &cancel),
        ArchiveKind::SevenZip => extract_7z_blocking(&archive, &dest, &cancel),
    })
    .await
    .map_err(|e| extraction_error(archive_path, format!("extraction task failed: {}", e)))?
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;

    /// Write a zip holding `entries` (path, contents)
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }
}
