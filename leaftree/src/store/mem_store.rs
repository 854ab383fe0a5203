use super::{Batch, BatchOp, KvStore};
use crate::error::{Error, Result};
use anyhow::anyhow;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// A MemStore is a pure in memory store. Mostly useful for testing.
///
/// Clones share the same data. Reads take a shared lock, so they can run concurrently.
#[derive(Clone)]
pub struct MemStore(Arc<Inner>);

struct Inner {
    entries: RwLock<Entries>,
    max_size: usize,
}

#[derive(Debug, Default)]
struct Entries {
    map: BTreeMap<Vec<u8>, Box<[u8]>>,
    current_size: usize,
}

impl Entries {
    fn insert(&mut self, key: Vec<u8>, value: Box<[u8]>) {
        self.remove(&key);
        self.current_size += key.len() + value.len();
        self.map.insert(key, value);
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        match self.map.remove(key) {
            Some(old) => {
                self.current_size -= key.len() + old.len();
                true
            }
            None => false,
        }
    }
}

impl MemStore {
    /// Creates an empty store that refuses writes that would grow it beyond `max_size` bytes
    /// (keys plus values).
    pub fn new(max_size: usize) -> Self {
        Self(Arc::new(Inner {
            entries: RwLock::new(Entries::default()),
            max_size,
        }))
    }

    pub fn unbounded() -> Self {
        Self::new(usize::max_value())
    }

    pub fn len(&self) -> usize {
        self.0.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// current size of all keys and values, in bytes
    pub fn size(&self) -> usize {
        self.0.entries.read().current_size
    }

    /// all keys, in order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.0.entries.read().map.keys().cloned().collect()
    }

    pub fn into_inner(self) -> anyhow::Result<BTreeMap<Vec<u8>, Box<[u8]>>> {
        let inner = Arc::try_unwrap(self.0).map_err(|_| anyhow!("busy"))?;
        Ok(inner.entries.into_inner().map)
    }

    /// size of the store after applying the given operations, without applying them
    fn size_after<'a>(&self, entries: &Entries, ops: impl Iterator<Item = &'a BatchOp>) -> usize {
        let mut staged: BTreeMap<&[u8], Option<usize>> = BTreeMap::new();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => staged.insert(k.as_slice(), Some(v.len())),
                BatchOp::Delete(k) => staged.insert(k.as_slice(), None),
            };
        }
        let mut size = entries.current_size;
        for (key, new_len) in staged {
            if let Some(old) = entries.map.get(key) {
                size -= key.len() + old.len();
            }
            if let Some(new_len) = new_len {
                size += key.len() + new_len;
            }
        }
        size
    }
}

impl KvStore for MemStore {
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(key, value);
        self.write(batch)
    }

    fn get(&self, key: &[u8]) -> Result<Box<[u8]>> {
        let entries = self.0.entries.read();
        entries
            .map
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut entries = self.0.entries.write();
        if entries.remove(key) {
            Ok(())
        } else {
            Err(Error::not_found(key))
        }
    }

    fn write(&self, batch: Batch) -> Result<()> {
        let mut entries = self.0.entries.write();
        if self.size_after(&entries, batch.ops().iter()) > self.0.max_size {
            return Err(anyhow!("full").into());
        }
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => entries.insert(key, value.into()),
                BatchOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
