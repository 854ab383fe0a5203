//! persistence of individual leaves in a key value store
use crate::{
    error::Result,
    store::{Batch, KvStore},
};
use tracing::*;

/// key under which the leaf with the given index is stored
pub fn leaf_key(index: u64) -> String {
    format!("leaf-{}", index)
}

/// Stores leaves in an externally owned key value store, under the keys `leaf-0`, `leaf-1`, ...
///
/// This never opens or closes the store. Reads may be done from many threads at once, writes
/// are serialized by the store itself, so concurrent writes to the same index are last write wins.
#[derive(Debug, Clone)]
pub struct LeafStore<S> {
    store: S,
}

impl<S: KvStore> LeafStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// store a single leaf at the given index, overwriting what was there
    pub fn put_leaf(&self, index: u64, leaf: &[u8]) -> Result<()> {
        #[cfg(feature = "metrics")]
        let _timer = crate::metrics::LEAF_PUT_HIST.start_timer();
        #[cfg(feature = "metrics")]
        crate::metrics::LEAF_PUT_SIZE_HIST.observe(leaf.len() as f64);
        let key = leaf_key(index);
        trace!("put {} ({} bytes)", key, leaf.len());
        self.store.put(key.as_bytes(), leaf.to_vec())
    }

    /// Store leaves one by one, starting from index 0.
    ///
    /// Stops at the first error. Leaves that were stored before the error stay in the store,
    /// use [save_leaves_batch](Self::save_leaves_batch) if you need all or nothing.
    pub fn save_leaves<I>(&self, leaves: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut count = 0u64;
        for (index, leaf) in (0u64..).zip(leaves) {
            if let Err(cause) = self.put_leaf(index, leaf.as_ref()) {
                warn!("saving leaves failed at {} after {} puts: {}", index, count, cause);
                return Err(cause);
            }
            count += 1;
        }
        debug!("saved {} leaves", count);
        Ok(())
    }

    /// Store leaves starting from index 0 in a single atomic batch write
    pub fn save_leaves_batch<I>(&self, leaves: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut batch = Batch::new();
        for (index, leaf) in (0u64..).zip(leaves) {
            let leaf = leaf.as_ref();
            #[cfg(feature = "metrics")]
            crate::metrics::LEAF_PUT_SIZE_HIST.observe(leaf.len() as f64);
            batch.put(leaf_key(index), leaf);
        }
        let count = batch.len();
        #[cfg(feature = "metrics")]
        let _timer = crate::metrics::LEAF_PUT_HIST.start_timer();
        self.store.write(batch)?;
        debug!("saved {} leaves in one batch", count);
        Ok(())
    }

    /// Fetch a leaf by key.
    ///
    /// A missing key results in [Error::NotFound](crate::Error::NotFound).
    pub fn fetch_leaf(&self, key: &str) -> Result<Box<[u8]>> {
        #[cfg(feature = "metrics")]
        let _timer = crate::metrics::LEAF_GET_HIST.start_timer();
        trace!("get {}", key);
        self.store.get(key.as_bytes())
    }

    /// Fetch a leaf by index
    pub fn fetch_leaf_at(&self, index: u64) -> Result<Box<[u8]>> {
        self.fetch_leaf(&leaf_key(index))
    }

    /// Same as [fetch_leaf](Self::fetch_leaf).
    ///
    /// Safe to call from many threads at the same time, since the store supports concurrent
    /// reads. No additional locking is done here.
    pub fn fetch_leaf_concurrent(&self, key: &str) -> Result<Box<[u8]>> {
        self.fetch_leaf(key)
    }

    /// Delete the leaves `leaf-0` to `leaf-<count - 1>`.
    ///
    /// Leaves that are already gone are skipped, so pruning is idempotent. Any other error
    /// stops pruning, and the remaining leaves are left in place.
    pub fn prune_leaves(&self, count: u64) -> Result<()> {
        let mut deleted = 0u64;
        for index in 0..count {
            let key = leaf_key(index);
            match self.store.delete(key.as_bytes()) {
                Ok(()) => deleted += 1,
                Err(cause) if cause.is_not_found() => {
                    trace!("{} already pruned", key);
                }
                Err(cause) => {
                    warn!("pruning failed at {}: {}", key, cause);
                    return Err(cause);
                }
            }
        }
        #[cfg(feature = "metrics")]
        crate::metrics::LEAF_PRUNED.inc_by(deleted);
        debug!("pruned {} of {} leaves", deleted, count);
        Ok(())
    }
}
