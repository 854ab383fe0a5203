//! saving and loading root digests. The file content is the raw digest, without any framing.
use crate::{
    digest::Digest,
    error::{Error, Result},
    tree::Node,
};
use std::{fs, path::Path};
use tracing::*;

/// write the digest of `root` to `path`, creating or truncating the file
pub fn save_root(root: &Node, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, root.digest()).map_err(|e| Error::io("writing root to", path, e))?;
    debug!("saved root {} to {}", root.digest(), path.display());
    Ok(())
}

/// read the entire file content
pub fn load_root(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::io("reading root from", path, e))
}

/// like [load_root], but the file must contain exactly one digest
pub fn load_root_digest(path: impl AsRef<Path>) -> Result<Digest> {
    Digest::read(&load_root(path)?)
}
