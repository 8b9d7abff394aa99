use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::memory::{apply_batch, scan_prefix};
use crate::domain::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};

/// File-backed key-value store.
///
/// Keeps everything in memory and rewrites a single bincode snapshot on
/// every mutation (temp file, fsync, rename). Header records are small and
/// writes come in batches, so this is adequate without RocksDB.
pub struct FileBackedKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
}

fn io_error(err: std::io::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: err.to_string(),
    }
}

impl FileBackedKVStore {
    /// Open the snapshot at `path`, or start empty if it does not exist.
    ///
    /// A snapshot that exists but cannot be decoded is reported as
    /// corruption rather than silently discarded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read(&path) {
            Ok(bytes) => {
                let data: BTreeMap<Vec<u8>, Vec<u8>> =
                    bincode::deserialize(&bytes).map_err(|e| KVStoreError::Corruption {
                        message: format!("{}: {}", path.display(), e),
                    })?;
                info!(
                    "[zeta-store] Loaded {} keys from {} ({} bytes)",
                    data.len(),
                    path.display(),
                    bytes.len()
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[zeta-store] No existing storage file at {}", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(io_error(e)),
        };

        Ok(Self { data, path })
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_to_file(&self) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let bytes = bincode::serialize(&self.data).map_err(|e| KVStoreError::IOError {
            message: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_error)?;

        debug!(
            "[zeta-store] Wrote {} keys to {}",
            self.data.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Apply `operations` to a copy, persist it, then swap it in.
    ///
    /// The in-memory view only changes once the snapshot is on disk.
    fn commit(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let previous = self.data.clone();
        apply_batch(&mut self.data, operations);
        if let Err(e) = self.save_to_file() {
            self.data = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::put(key, value)])
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::delete(key)])
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.commit(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(scan_prefix(&self.data, prefix))
    }
}
