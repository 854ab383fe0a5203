//! read only memory mapping of files, with a limit on the file size
//!
//! A [MmapService] owns its size limit and its lock, so independent services can have
//! independent limits. [MmapService::global] gives a process wide instance.
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::{
    convert::TryFrom,
    fmt,
    fs::File,
    ops::Deref,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::*;

/// 1 GiB in bytes
pub const GIB: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapConfig {
    /// files larger than this many bytes will not be mapped
    pub max_file_size: u64,
}

impl Default for MmapConfig {
    fn default() -> Self {
        Self { max_file_size: GIB }
    }
}

impl MmapConfig {
    /// config with a tiny limit of 64 KiB, for tests
    pub fn debug() -> Self {
        Self {
            max_file_size: 1 << 16,
        }
    }

    /// config with a limit of `gib` GiB. The size must be positive.
    pub fn from_gib(gib: i64) -> Result<Self> {
        let max_file_size = u64::try_from(gib)
            .ok()
            .filter(|gib| *gib > 0)
            .and_then(|gib| gib.checked_mul(GIB))
            .ok_or(Error::InvalidSizeCeiling(gib))?;
        Ok(Self { max_file_size })
    }
}

/// A read only view of the content of a file.
///
/// The length is the file size at the time of mapping. The view stays valid until it is
/// handed back to [MmapService::unmap], even if the size limit changes in the meantime.
pub struct MappedRegion {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedRegion {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.mmap
    }
}

impl AsRef<[u8]> for MappedRegion {
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}

lazy_static! {
    static ref GLOBAL: MmapService = MmapService::default();
}

pub struct MmapService {
    max_file_size: AtomicU64,
    lock: Mutex<()>,
}

impl Default for MmapService {
    fn default() -> Self {
        Self::new(MmapConfig::default())
    }
}

impl fmt::Debug for MmapService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapService")
            .field("max_file_size", &self.max_file_size())
            .finish()
    }
}

impl MmapService {
    pub fn new(config: MmapConfig) -> Self {
        Self {
            max_file_size: AtomicU64::new(config.max_file_size),
            lock: Mutex::new(()),
        }
    }

    /// The process wide service, with a limit of 1 GiB unless changed
    pub fn global() -> &'static MmapService {
        &GLOBAL
    }

    pub fn config(&self) -> MmapConfig {
        MmapConfig {
            max_file_size: self.max_file_size(),
        }
    }

    /// current limit in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.load(Ordering::SeqCst)
    }

    /// Set the limit to `gib` GiB.
    ///
    /// A size that is not positive is rejected and the limit stays unchanged.
    pub fn set_max_file_size(&self, gib: i64) -> Result<()> {
        match MmapConfig::from_gib(gib) {
            Ok(config) => {
                self.set_max_file_size_bytes(config.max_file_size)?;
                Ok(())
            }
            Err(cause) => {
                warn!("{}", cause);
                Err(cause)
            }
        }
    }

    /// Set the limit in bytes. Existing mappings are not affected.
    pub fn set_max_file_size_bytes(&self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            warn!("Invalid size 0. Must be greater than 0");
            return Err(Error::InvalidSizeCeiling(0));
        }
        self.max_file_size.store(bytes, Ordering::SeqCst);
        debug!("max file size for mapping set to {} bytes", bytes);
        Ok(())
    }

    /// Map the file at `path` read only.
    ///
    /// Fails with [Error::FileTooLarge] if the file is larger than the current limit. The file
    /// handle is closed when this returns, the mapping stays valid.
    pub fn map_file(&self, path: impl AsRef<Path>) -> Result<MappedRegion> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io("opening file", path, e))?;
        let size = file
            .metadata()
            .map_err(|e| Error::io("getting file stats for", path, e))?
            .len();
        let max = self.max_file_size();
        if size > max {
            #[cfg(feature = "metrics")]
            crate::metrics::MMAP_REJECTED.inc();
            warn!("not mapping {}, {} bytes > {}", path.display(), size, max);
            return Err(Error::FileTooLarge { size, max });
        }
        let len = usize::try_from(size).map_err(|_| Error::FileTooLarge { size, max })?;
        // the mapping is read only, modifying the file while mapped is up to the caller
        let mmap = unsafe { MmapOptions::new().len(len).map(&file) }
            .map_err(|e| Error::io("mapping file", path, e))?;
        #[cfg(feature = "metrics")]
        crate::metrics::MMAP_SIZE_HIST.observe(size as f64);
        trace!("mapped {} ({} bytes)", path.display(), size);
        Ok(MappedRegion {
            mmap,
            path: path.to_owned(),
        })
    }

    /// Release a mapping.
    ///
    /// Takes the region by value, so it can neither be used nor released again afterwards.
    pub fn unmap(&self, region: MappedRegion) -> Result<()> {
        let MappedRegion { mmap, path } = region;
        drop(mmap);
        trace!("unmapped {}", path.display());
        Ok(())
    }

    /// [map_file](Self::map_file), with at most one map or unmap of this service in flight
    pub fn safe_map_file(&self, path: impl AsRef<Path>) -> Result<MappedRegion> {
        let _guard = self.lock.lock();
        self.map_file(path)
    }

    /// [unmap](Self::unmap), with at most one map or unmap of this service in flight
    pub fn safe_unmap(&self, region: MappedRegion) -> Result<()> {
        let _guard = self.lock.lock();
        self.unmap(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, sync::Arc};

    fn file_of_size(dir: &tempfile::TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn limit_is_inclusive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = MmapService::new(MmapConfig { max_file_size: 100 });
        let exact = file_of_size(&dir, "exact", 100);
        let over = file_of_size(&dir, "over", 101);
        let region = service.map_file(&exact)?;
        assert_eq!(region.len(), 100);
        assert_eq!(region[99], 99);
        service.unmap(region)?;
        assert!(matches!(
            service.map_file(&over),
            Err(Error::FileTooLarge { size: 101, max: 100 })
        ));
        Ok(())
    }

    #[test]
    fn lowering_limit_keeps_mappings() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = MmapService::new(MmapConfig::debug());
        let path = file_of_size(&dir, "data", 1000);
        let region = service.safe_map_file(&path)?;
        service.set_max_file_size_bytes(10)?;
        assert_eq!(region.len(), 1000);
        assert_eq!(region[500], (500 % 256) as u8);
        assert!(service.safe_map_file(&path).is_err());
        service.safe_unmap(region)?;
        Ok(())
    }

    #[test]
    fn invalid_limit_is_rejected() {
        let service = MmapService::default();
        assert!(matches!(
            service.set_max_file_size(0),
            Err(Error::InvalidSizeCeiling(0))
        ));
        assert!(matches!(
            service.set_max_file_size(-3),
            Err(Error::InvalidSizeCeiling(-3))
        ));
        assert_eq!(service.max_file_size(), GIB);
        service.set_max_file_size(2).unwrap();
        assert_eq!(service.max_file_size(), 2 * GIB);
    }

    #[test]
    fn services_are_independent() {
        let a = MmapService::new(MmapConfig::debug());
        let b = MmapService::default();
        a.set_max_file_size_bytes(1).unwrap();
        assert_eq!(b.config(), MmapConfig::default());
    }

    #[test]
    fn empty_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = file_of_size(&dir, "empty", 0);
        let region = MmapService::default().map_file(&path)?;
        assert!(region.is_empty());
        Ok(())
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MmapService::default()
            .map_file(dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn concurrent_safe_mapping() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = Arc::new(MmapService::new(MmapConfig::debug()));
        let paths = (0..8)
            .map(|i| file_of_size(&dir, &format!("f{}", i), 100 * (i + 1)))
            .collect::<Vec<_>>();
        let handles = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let service = service.clone();
                std::thread::spawn(move || -> crate::Result<()> {
                    for _ in 0..20 {
                        let region = service.safe_map_file(&path)?;
                        assert_eq!(region.len(), 100 * (i + 1));
                        service.safe_unmap(region)?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap()?;
        }
        Ok(())
    }
}
