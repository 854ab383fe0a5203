use leaftree::{save_root, Error, MmapConfig, MmapService, Node};
use std::{fs, io::Write, sync::Arc};

#[test]
fn map_root_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("root.bin");
    let root = Node::build(&[b"a", b"b", b"c"])?;
    save_root(&root, &path)?;
    let service = MmapService::new(MmapConfig::debug());
    let region = service.safe_map_file(&path)?;
    assert_eq!(&region[..], root.digest().as_ref());
    assert_eq!(region.path(), path.as_path());
    service.safe_unmap(region)?;
    Ok(())
}

#[test]
fn ceiling_boundary() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let service = MmapService::new(MmapConfig::debug());
    let max = service.max_file_size() as usize;
    let at = dir.path().join("at");
    let over = dir.path().join("over");
    fs::write(&at, vec![1u8; max])?;
    fs::write(&over, vec![1u8; max + 1])?;
    let region = service.map_file(&at)?;
    assert_eq!(region.len(), max);
    match service.map_file(&over) {
        Err(Error::FileTooLarge { size, max: limit }) => {
            assert_eq!(size, max as u64 + 1);
            assert_eq!(limit, max as u64);
        }
        other => panic!("expected FileTooLarge, got {:?}", other),
    }
    service.unmap(region)?;
    Ok(())
}

#[test]
fn size_is_fixed_at_map_time() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("growing");
    fs::write(&path, b"0123456789")?;
    let service = MmapService::new(MmapConfig::debug());
    let region = service.map_file(&path)?;
    fs::OpenOptions::new()
        .append(true)
        .open(&path)?
        .write_all(b"more data")?;
    assert_eq!(region.len(), 10);
    service.unmap(region)?;
    assert_eq!(service.map_file(&path)?.len(), 19);
    Ok(())
}

#[test]
fn ceiling_changes_from_other_threads() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("data");
    fs::write(&path, vec![0u8; 4096])?;
    let service = Arc::new(MmapService::new(MmapConfig::debug()));
    let setter = {
        let service = service.clone();
        std::thread::spawn(move || {
            for i in 0..100u64 {
                service.set_max_file_size_bytes(1 + (i % 2) * 10000).unwrap();
            }
        })
    };
    for _ in 0..100 {
        match service.safe_map_file(&path) {
            Ok(region) => {
                assert_eq!(region.len(), 4096);
                service.safe_unmap(region)?;
            }
            Err(Error::FileTooLarge { size, .. }) => assert_eq!(size, 4096),
            Err(other) => return Err(other.into()),
        }
    }
    setter.join().unwrap();
    Ok(())
}

#[test]
fn global_service_defaults_to_one_gib() {
    assert_eq!(
        MmapService::global().max_file_size(),
        MmapConfig::default().max_file_size
    );
    assert!(MmapService::global().set_max_file_size(0).is_err());
    assert_eq!(MmapService::global().max_file_size(), 1 << 30);
}
