//! LRU block cache with TTL for FUSE reads
//!
//! The kernel reads files in small chunks, and every chunk that misses
//! here becomes a blocking read against the download engine. Payload is
//! cached in fixed-size blocks keyed by inode and block index, bounded by
//! total bytes and expired after a TTL.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::config::FuseConfig;

/// Size of a cached block
pub const BLOCK_SIZE: u64 = 128 * 1024;

/// Configuration for the block cache
#[derive(Debug, Clone)]
pub struct BlockCacheConfig {
    /// Maximum cache size in megabytes
    pub max_size_mb: u32,
    /// TTL for cached blocks in seconds
    pub ttl_secs: u32,
}

impl Default for BlockCacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 64,
            ttl_secs: 300,
        }
    }
}

impl From<&FuseConfig> for BlockCacheConfig {
    fn from(config: &FuseConfig) -> Self {
        Self {
            max_size_mb: config.cache_size_mb,
            ttl_secs: config.cache_ttl_secs,
        }
    }
}

/// Payload block cache shared by all reads of one mount
#[derive(Clone)]
pub struct BlockCache {
    /// (inode, block index) → block bytes
    blocks: Cache<(u64, u64), Arc<Vec<u8>>>,
    config: BlockCacheConfig,
}

impl BlockCache {
    pub fn new(config: BlockCacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs as u64);
        let max_bytes = (config.max_size_mb as u64) * 1024 * 1024;

        Self {
            blocks: Cache::builder()
                .weigher(|_key, block: &Arc<Vec<u8>>| {
                    u32::try_from(block.len()).unwrap_or(u32::MAX)
                })
                .time_to_live(ttl)
                .max_capacity(max_bytes)
                .build(),
            config,
        }
    }

    /// Get block `index` of inode `ino`, loading it with `load` on a miss.
    ///
    /// Concurrent misses on the same block share one load.
    pub fn get_or_load<F>(&self, ino: u64, index: u64, load: F) -> io::Result<Arc<Vec<u8>>>
    where
        F: FnOnce() -> io::Result<Vec<u8>>,
    {
        self.blocks
            .try_get_with((ino, index), || load().map(Arc::new))
            .map_err(|err: Arc<io::Error>| io::Error::new(err.kind(), err.to_string()))
    }

    pub fn get(&self, ino: u64, index: u64) -> Option<Arc<Vec<u8>>> {
        self.blocks.get(&(ino, index))
    }

    /// Invalidate all cached blocks
    pub fn invalidate_all(&self) {
        self.blocks.invalidate_all();
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.blocks.run_pending_tasks();
        CacheStats {
            block_count: self.blocks.entry_count(),
            weighted_bytes: self.blocks.weighted_size(),
            max_size_mb: self.config.max_size_mb,
            ttl_secs: self.config.ttl_secs,
        }
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("config", &self.config)
            .field("block_count", &self.blocks.entry_count())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub block_count: u64,
    pub weighted_bytes: u64,
    pub max_size_mb: u32,
    pub ttl_secs: u32,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_load_once() {
        let cache = BlockCache::new(BlockCacheConfig::default());
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let block = cache
                .get_or_load(2, 0, || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(block.as_slice(), &[1, 2, 3]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocks_keyed_by_inode_and_index() {
        let cache = BlockCache::new(BlockCacheConfig::default());
        cache.get_or_load(2, 0, || Ok(vec![0])).unwrap();
        cache.get_or_load(2, 1, || Ok(vec![1])).unwrap();
        cache.get_or_load(3, 0, || Ok(vec![2])).unwrap();

        assert_eq!(cache.get(2, 1).unwrap().as_slice(), &[1]);
        assert_eq!(cache.get(3, 0).unwrap().as_slice(), &[2]);
        assert!(cache.get(3, 1).is_none());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = BlockCache::new(BlockCacheConfig::default());

        let err = cache
            .get_or_load(2, 0, || {
                Err(io::Error::new(io::ErrorKind::TimedOut, "piece not available"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(cache.get(2, 0).is_none());

        let block = cache.get_or_load(2, 0, || Ok(vec![9])).unwrap();
        assert_eq!(block.as_slice(), &[9]);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = BlockCache::new(BlockCacheConfig::default());
        cache.get_or_load(2, 0, || Ok(vec![1])).unwrap();
        cache.get_or_load(2, 1, || Ok(vec![2])).unwrap();

        cache.invalidate_all();

        assert!(cache.get(2, 0).is_none());
        assert!(cache.get(2, 1).is_none());
    }

    #[test]
    fn test_stats() {
        let cache = BlockCache::new(BlockCacheConfig::from(&FuseConfig::default()));
        cache.get_or_load(2, 0, || Ok(vec![0; 10])).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.weighted_bytes, 10);
        assert_eq!(stats.max_size_mb, 64);
    }
}
