//! Content hashing with xxHash64

use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use xxhash_rust::xxh64::Xxh64;

use crate::core::{ContentError, FileOperation, Result};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Computes content hashes of files on disk
#[async_trait]
pub trait FileHashProvider: Send + Sync {
    async fn compute_file_hash(&self, path: &Path, cancel: &CancellationToken) -> Result<String>;
}

/// Lowercase hex of the big-endian xxHash64 digest
pub fn xxhash64_hex(hash: u64) -> String {
    hex::encode(hash.to_be_bytes())
}

/// Hash a file on the current thread, streaming in 64KB chunks
pub fn hash_file_blocking(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| ContentError::file_system(path, FileOperation::Read, e))?;
    let mut hasher = Xxh64::new(0);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| ContentError::file_system(path, FileOperation::Read, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(xxhash64_hex(hasher.digest()))
}

/// [`FileHashProvider`] that hashes on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct XxHashFileHashProvider;

impl XxHashFileHashProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileHashProvider for XxHashFileHashProvider {
    async fn compute_file_hash(&self, path: &Path, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("hash {}", path.display())));
        }

        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || hash_file_blocking(&owned))
            .await
            .map_err(|e| ContentError::file_system(
                path,
                FileOperation::Read,
                std::io::Error::other(format!("hash task failed: {}", e)),
            ))?
    }
}
