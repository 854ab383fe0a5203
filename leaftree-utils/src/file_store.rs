//! a key value store that keeps everything in memory and persists to a single json file
use anyhow::Context;
use leaftree::{store::BatchOp, Batch, Error, KvStore, Result};
use parking_lot::RwLock;
use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::*;

/// Keys and values are arbitrary bytes, json strings are not, so the file stores them as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Blob(pub Vec<u8>);

impl Serialize for Base64Blob {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(base64::encode(&self.0).as_ref())
    }
}

impl<'de> Deserialize<'de> for Base64Blob {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Base64Blob, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MyVisitor();

        impl<'de> Visitor<'de> for MyVisitor {
            type Value = Base64Blob;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                base64::decode(v).map(Base64Blob).map_err(|err| {
                    serde::de::Error::custom(format!("Error decoding base64 string: {}", err))
                })
            }
        }

        deserializer.deserialize_any(MyVisitor())
    }
}

#[derive(Serialize, Deserialize)]
struct FileStoreIo {
    entries: Vec<(Base64Blob, Base64Blob)>,
}

type Entries = BTreeMap<Vec<u8>, Box<[u8]>>;

/// A store that is fully loaded into memory, and written back to disk on every write.
///
/// Every write replaces the file via a rename, so a batch is either fully persisted or not at all.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl FileStore {
    /// Open the store at `path`, or create an empty one if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_owned();
        let entries: Entries = if path.exists() {
            let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let io: FileStoreIo = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?;
            io.entries
                .into_iter()
                .map(|(k, v)| (k.0, v.0.into()))
                .collect()
        } else {
            Entries::new()
        };
        debug!("opened {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &Entries) -> anyhow::Result<()> {
        let io = FileStoreIo {
            entries: entries
                .iter()
                .map(|(k, v)| (Base64Blob(k.clone()), Base64Blob(v.to_vec())))
                .collect(),
        };
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&io)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} to {}", tmp.display(), self.path.display()))?;
        Ok(())
    }

    /// apply `f` to a copy of the entries, and only keep the result once it is on disk
    fn update(&self, f: impl FnOnce(&mut Entries) -> Result<()>) -> Result<()> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        f(&mut updated)?;
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_vec(), value.into());
            Ok(())
        })
    }

    fn get(&self, key: &[u8]) -> Result<Box<[u8]>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                key: String::from_utf8_lossy(key).into_owned(),
            })
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.update(|entries| match entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                key: String::from_utf8_lossy(key).into_owned(),
            }),
        })
    }

    fn write(&self, batch: Batch) -> Result<()> {
        self.update(|entries| {
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put(key, value) => {
                        entries.insert(key, value.into());
                    }
                    BatchOp::Delete(key) => {
                        entries.remove(&key);
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leaftree::LeafStore;
    use quickcheck::quickcheck;

    #[test]
    fn survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("leaves.json");
        {
            let leaves = LeafStore::new(FileStore::open(&path)?);
            leaves.save_leaves_batch(&[b"a", b"b", b"c"])?;
            leaves.prune_leaves(1)?;
        }
        let leaves = LeafStore::new(FileStore::open(&path)?);
        assert_eq!(leaves.store().len(), 2);
        assert!(leaves.fetch_leaf("leaf-0").unwrap_err().is_not_found());
        assert_eq!(leaves.fetch_leaf("leaf-2")?.as_ref(), b"c");
        Ok(())
    }

    #[test]
    fn batches_survive_reopen() {
        // small keys so that batches overwrite and delete each other's entries
        fn prop(batches: Vec<Vec<(u8, Option<Vec<u8>>)>>) -> anyhow::Result<bool> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("leaves.json");
            let store = FileStore::open(&path)?;
            let mut expected = BTreeMap::new();
            for ops in batches {
                let mut batch = Batch::new();
                for (key, value) in ops {
                    let key = vec![key % 8];
                    match value {
                        Some(value) => {
                            expected.insert(key.clone(), value.clone());
                            batch.put(key, value);
                        }
                        None => {
                            expected.remove(&key);
                            batch.delete(key);
                        }
                    }
                }
                store.write(batch)?;
            }
            drop(store);
            let store = FileStore::open(&path)?;
            if store.len() != expected.len() {
                return Ok(false);
            }
            for (key, value) in &expected {
                if store.get(key)?.as_ref() != value.as_slice() {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        fn check(batches: Vec<Vec<(u8, Option<Vec<u8>>)>>) -> bool {
            prop(batches).unwrap()
        }
        quickcheck(check as fn(Vec<Vec<(u8, Option<Vec<u8>>)>>) -> bool);
    }

    #[test]
    fn failed_write_changes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("leaves.json");
        let store = FileStore::open(&path)?;
        store.put(b"leaf-0", b"a".to_vec())?;
        // make the rename target a non empty directory so persisting fails
        fs::remove_file(&path)?;
        fs::create_dir(&path)?;
        fs::write(path.join("blocker"), b"x")?;
        let mut batch = Batch::new();
        batch.put(&b"leaf-1"[..], &b"b"[..]);
        assert!(store.write(batch).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.get(b"leaf-1").unwrap_err().is_not_found());
        Ok(())
    }
}
