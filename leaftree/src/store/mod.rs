//! interface to an ordered key value store
use crate::error::Result;
use std::sync::Arc;
mod mem_store;

pub use mem_store::MemStore;

/// An ordered byte key / byte value store.
///
/// Implementations must allow concurrent reads, and must serialize writes on their own.
pub trait KvStore: Send + Sync {
    /// insert or overwrite a value
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()>;

    /// get a value, or [Error::NotFound](crate::Error::NotFound) if there is none
    fn get(&self, key: &[u8]) -> Result<Box<[u8]>>;

    /// delete a value, or [Error::NotFound](crate::Error::NotFound) if there is none
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// apply all operations in the batch atomically. Either all of them are visible afterwards, or none.
    fn write(&self, batch: Batch) -> Result<()>;
}

/// A key value store, we use dyn to avoid having just another type parameter
pub type ArcKvStore = Arc<dyn KvStore + 'static>;

impl KvStore for ArcKvStore {
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.as_ref().put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Box<[u8]>> {
        self.as_ref().get(key)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.as_ref().delete(key)
    }

    fn write(&self, batch: Batch) -> Result<()> {
        self.as_ref().write(batch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A set of mutations that is committed as a unit via [KvStore::write]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// stage a put. Later operations on the same key win.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    /// stage a delete. Deleting a missing key in a batch is not an error.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
