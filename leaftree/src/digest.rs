//! fixed size digests and the hash function used to compute them
use crate::error::{Error, Result};
use sha2::{Digest as _, Sha256};
use std::{
    convert::{TryFrom, TryInto},
    fmt,
    str::FromStr,
};

/// Size of a digest in bytes
pub const DIGEST_SIZE: usize = 32;

/// A 32 byte digest. Equality is byte-wise.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, derive_more::From)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// read a digest from a slice that must be exactly 32 bytes long
    pub fn read(data: &[u8]) -> Result<Self> {
        let bytes: [u8; DIGEST_SIZE] = data
            .try_into()
            .map_err(|_| Error::InvalidDigestLength(data.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Self::read(value)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_ref()))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::Invalid(format!("bad hex digest: {}", e)))?;
        Self::read(&bytes)
    }
}

/// A hash function with a fixed 32 byte output.
///
/// The tree does not care which function is used, as long as it is deterministic and total.
pub trait HashFunction: Send + Sync {
    fn hash(&self, data: &[u8]) -> Digest;

    /// hash of the concatenation `left ++ right`
    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        let mut buf = [0u8; DIGEST_SIZE * 2];
        buf[..DIGEST_SIZE].copy_from_slice(left.as_ref());
        buf[DIGEST_SIZE..].copy_from_slice(right.as_ref());
        self.hash(&buf)
    }
}

impl<H: HashFunction + ?Sized> HashFunction for &H {
    fn hash(&self, data: &[u8]) -> Digest {
        (**self).hash(data)
    }
}

/// The default hash function, sha2-256
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl HashFunction for Sha256Hasher {
    fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Digest(hasher.finalize().into())
    }
}

/// sha2-256 of the given data
pub fn hash(data: &[u8]) -> Digest {
    Sha256Hasher.hash(data)
}

/// sha2-256 of `left ++ right`
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    Sha256Hasher.hash_pair(left, right)
}
