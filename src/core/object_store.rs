// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Two content-addressed directories: `pinned/` (authoritative replicas)
//! and `cached/` (opportunistic, pull-through entries subject to eviction).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs as tfs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::core::object_id::ContentHash;

/// Object file store I/O errors.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// `pinned/` and `cached/` directories under the node's data directory,
/// plus the in-memory cache table (hash -> hash, set semantics) that
/// mirrors `cached/`'s contents. Not persisted across restarts.
pub struct ObjectStore {
    pinned_dir: PathBuf,
    cached_dir: PathBuf,
    cache_table: RwLock<HashSet<ContentHash>>,
}

impl ObjectStore {
    /// Open the store, creating `pinned/` if absent and recreating `cached/`
    /// empty (the cache is not persisted across restarts).
    pub async fn open(data_dir: &Path) -> Result<Self, ObjectStoreError> {
        let pinned_dir = data_dir.join("pinned");
        let cached_dir = data_dir.join("cached");

        tfs::create_dir_all(&pinned_dir).await?;
        if cached_dir.exists() {
            tfs::remove_dir_all(&cached_dir).await?;
        }
        tfs::create_dir_all(&cached_dir).await?;

        Ok(Self {
            pinned_dir,
            cached_dir,
            cache_table: RwLock::new(HashSet::new()),
        })
    }

    /// Write `bytes` to `pinned/<hash>`, fsyncing before returning.
    pub async fn write_pinned(&self, hash: &ContentHash, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        Self::write_fsynced(&self.pinned_dir.join(hash.as_str()), bytes).await
    }

    /// Write `bytes` to `cached/<hash>`, fsyncing, then record `hash` in the
    /// cache table.
    pub async fn write_cached(&self, hash: &ContentHash, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        Self::write_fsynced(&self.cached_dir.join(hash.as_str()), bytes).await?;
        self.cache_table.write().await.insert(hash.clone());
        Ok(())
    }

    /// Whether `hash` is present in the in-memory cache table.
    pub async fn cache_contains(&self, hash: &ContentHash) -> bool {
        self.cache_table.read().await.contains(hash)
    }

    async fn write_fsynced(path: &Path, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let mut f = tfs::File::create(path).await?;
        f.write_all(bytes).await?;
        f.sync_all().await?;
        Ok(())
    }

    /// Read `pinned/<hash>` if present.
    pub async fn read_pinned(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        tfs::read(self.pinned_dir.join(hash.as_str())).await.ok()
    }

    /// Read `cached/<hash>` if present.
    pub async fn read_cached(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        tfs::read(self.cached_dir.join(hash.as_str())).await.ok()
    }

    /// Remove `pinned/<hash>` if present; missing file is not an error.
    pub async fn unlink_pinned(&self, hash: &ContentHash) -> Result<(), ObjectStoreError> {
        Self::remove_if_present(&self.pinned_dir.join(hash.as_str())).await
    }

    /// Remove `cached/<hash>` if present and forget it from the cache table;
    /// missing file is not an error.
    pub async fn unlink_cached(&self, hash: &ContentHash) -> Result<(), ObjectStoreError> {
        self.cache_table.write().await.remove(hash);
        Self::remove_if_present(&self.cached_dir.join(hash.as_str())).await
    }

    async fn remove_if_present(path: &Path) -> Result<(), ObjectStoreError> {
        match tfs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Evict the oldest `cached/` entries (by mtime) until the directory's
    /// total size is back under half of `max_size`, if it currently exceeds
    /// `max_size`.
    pub async fn evict_cache(&self, max_size: u64) -> Result<(), ObjectStoreError> {
        let mut entries = Vec::new();
        let mut total: u64 = 0;

        let mut rd = tfs::read_dir(&self.cached_dir).await?;
        while let Some(entry) = rd.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            total += meta.len();
            entries.push((entry.path(), meta.len(), modified));
        }

        if total <= max_size {
            return Ok(());
        }

        entries.sort_by_key(|(_, _, modified)| *modified);

        let target = max_size / 2;
        let mut cache_table = self.cache_table.write().await;
        for (path, len, _) in entries {
            if total <= target {
                break;
            }
            if tfs::remove_file(&path).await.is_ok() {
                total = total.saturating_sub(len);
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if let Ok(hash) = name.parse::<ContentHash>() {
                        cache_table.remove(&hash);
                    }
                }
            }
        }

        Ok(())
    }
}
