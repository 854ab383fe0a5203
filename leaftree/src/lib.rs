//! # Leaf trees
//!
//! Binary merkle hash trees over a sequence of opaque leaves, such as serialized signatures.
//!
//! ## Building
//!
//! Leaves are hashed and then combined pairwise from left to right, level by level, until a
//! single root remains. When a level has an odd number of nodes, the last node is carried to
//! the next level as it is. It is neither duplicated nor hashed again. The shape of the tree and
//! the root digest only depend on the order and the number of leaves.
//!
//! ```
//! # fn main() -> leaftree::Result<()> {
//! use leaftree::{digest::{hash, hash_pair}, Node};
//! let root = Node::build(&[b"a", b"b"])?;
//! assert_eq!(root.digest(), &hash_pair(&hash(b"a"), &hash(b"b")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! Only the root digest is persisted, as a raw 32 byte file. The tree itself lives in memory.
//!
//! The leaves are persisted separately in a key value store under the keys `leaf-<index>`,
//! either one by one or as a single atomic batch. Old leaves can be pruned by count.
//!
//! ## Mapping
//!
//! Files backing leaf or root data can be memory mapped read only, with a limit on the file
//! size, through a [MmapService].
pub mod digest;
mod error;
pub mod leaf_store;
#[cfg(feature = "metrics")]
mod metrics;
pub mod mmap;
pub mod root;
pub mod store;
pub mod tree;

pub use digest::{Digest, HashFunction, Sha256Hasher};
pub use error::{Error, Result};
pub use leaf_store::{leaf_key, LeafStore};
#[cfg(feature = "metrics")]
pub use metrics::register_metrics;
pub use mmap::{MappedRegion, MmapConfig, MmapService};
pub use root::{load_root, load_root_digest, save_root};
pub use store::{Batch, KvStore, MemStore};
pub use tree::Node;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
