//! helper methods for the tests
use anyhow::anyhow;
use leaftree::{Batch, KvStore, MemStore, Result};
use quickcheck::{Arbitrary, Gen};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};

/// log to the test output, filtered by RUST_LOG
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// sha2-256 computed directly, independent of the library
#[allow(dead_code)]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[allow(dead_code)]
pub fn sha256_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// A store that wraps a [MemStore] and starts failing after a number of successful writes.
///
/// Deletes of keys listed in `broken` fail with a generic store error.
#[allow(dead_code)]
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemStore,
    writes_left: std::sync::Arc<AtomicUsize>,
    broken: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(writes: usize) -> Self {
        Self {
            inner: MemStore::unbounded(),
            writes_left: std::sync::Arc::new(AtomicUsize::new(writes)),
            broken: Vec::new(),
        }
    }

    pub fn with_broken_key(mut self, key: &str) -> Self {
        self.broken.push(key.as_bytes().to_vec());
        self
    }

    fn take_write(&self) -> Result<()> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| anyhow!("disk full").into())
    }
}

impl KvStore for FlakyStore {
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.take_write()?;
        self.inner.put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Box<[u8]>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        if self.broken.iter().any(|k| k == key) {
            return Err(anyhow!("io error deleting").into());
        }
        self.inner.delete(key)
    }

    fn write(&self, batch: Batch) -> Result<()> {
        self.take_write()?;
        self.inner.write(batch)
    }
}

/// A non empty list of leaves
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Leaves(pub Vec<Vec<u8>>);

impl Arbitrary for Leaves {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut leaves: Vec<Vec<u8>> = Arbitrary::arbitrary(g);
        if leaves.is_empty() {
            leaves.push(Arbitrary::arbitrary(g));
        }
        Self(leaves)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(
            self.0
                .shrink()
                .filter(|x| !x.is_empty())
                .map(Leaves),
        )
    }
}
