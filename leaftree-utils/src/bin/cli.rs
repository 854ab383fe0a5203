use std::{fs, path::PathBuf};
use structopt::StructOpt;
use tracing::Level;

use leaftree::{load_root, save_root, KvStore, LeafStore, MemStore, MmapConfig, MmapService, Node};
use leaftree_utils::{
    dump,
    file_store::FileStore,
    random::{random_data, random_leaves},
};

pub type Result<T> = anyhow::Result<T>;

enum Storage {
    Memory(MemStore),
    File(FileStore),
}

impl KvStore for Storage {
    fn put(&self, key: &[u8], value: Vec<u8>) -> leaftree::Result<()> {
        match self {
            Self::Memory(m) => m.put(key, value),
            Self::File(f) => f.put(key, value),
        }
    }

    fn get(&self, key: &[u8]) -> leaftree::Result<Box<[u8]>> {
        match self {
            Self::Memory(m) => m.get(key),
            Self::File(f) => f.get(key),
        }
    }

    fn delete(&self, key: &[u8]) -> leaftree::Result<()> {
        match self {
            Self::Memory(m) => m.delete(key),
            Self::File(f) => f.delete(key),
        }
    }

    fn write(&self, batch: leaftree::Batch) -> leaftree::Result<()> {
        match self {
            Self::Memory(m) => m.write(batch),
            Self::File(f) => f.write(batch),
        }
    }
}

impl Storage {
    fn open(storage: &str) -> Result<Self> {
        Ok(match storage {
            "memory" => Self::Memory(MemStore::unbounded()),
            path => Self::File(FileStore::open(path)?),
        })
    }
}

#[derive(StructOpt)]
#[structopt(about = "CLI to work with leaftree hash trees and leaf stores")]
struct Opts {
    #[structopt(short, parse(from_occurrences = set_log_level), global = true)]
    #[allow(dead_code)] // log level will bet set in [`set_log_level`]
    /// Increase verbosity
    verbosity: u64,
    #[structopt(long, default_value = "leaves.json", global = true)]
    /// Storage for leaves, "memory" or a path to a json file (will create it if it doesn't exist)
    storage: String,
    #[structopt(subcommand)]
    cmd: Command,
}

fn set_log_level(verbosity: u64) -> u64 {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    verbosity
}

#[derive(StructOpt)]
enum Command {
    /// Build a tree from files (one leaf per file) or from random leaves
    Build {
        /// Files to use as leaves, in order
        files: Vec<PathBuf>,
        #[structopt(long)]
        /// Number of random leaves to use instead of files
        random: Option<usize>,
        #[structopt(long, default_value = "64")]
        /// Size of each random leaf
        size: usize,
        #[structopt(long)]
        /// Write the root hash to this file
        root: Option<PathBuf>,
        #[structopt(long)]
        /// Also save the leaves in the storage
        save: bool,
        #[structopt(long)]
        /// Save leaves one by one instead of in a single batch
        unbatched: bool,
        #[structopt(long)]
        /// Print the tree as dot instead of the root hash.
        /// Can be piped directly: `leaftree-cli build --graph .. | dot -Tpng > tree.png`
        graph: bool,
    },
    /// Print a root hash saved in a file
    Root {
        /// The root hash file
        path: PathBuf,
    },
    /// Print leaves from the storage as hex
    Fetch {
        #[structopt(long)]
        /// The key of a single leaf, e.g. leaf-0
        key: Option<String>,
        #[structopt(long, default_value = "1")]
        /// The number of leaves to print when no key is given
        count: u64,
    },
    /// Delete the first leaves from the storage
    Prune {
        #[structopt(long)]
        /// The number of leaves to delete
        count: u64,
    },
    /// Memory map a file and print its size and digest
    Map {
        /// The file to map
        path: PathBuf,
        #[structopt(long)]
        /// Maximum file size in GiB
        max_gib: Option<i64>,
    },
    /// Print random bytes as hex
    Random {
        #[structopt(long, default_value = "16")]
        /// Number of bytes
        size: usize,
    },
}

fn main() -> Result<()> {
    let opts = Opts::from_args();
    match opts.cmd {
        Command::Build {
            files,
            random,
            size,
            root,
            save,
            unbatched,
            graph,
        } => {
            let leaves = match random {
                Some(count) => random_leaves(count, size),
                None => files
                    .iter()
                    .map(fs::read)
                    .collect::<std::io::Result<Vec<_>>>()?,
            };
            let t0 = std::time::Instant::now();
            let tree = Node::build(&leaves)?;
            let dt = t0.elapsed();
            tracing::info!("built tree over {} leaves in {}s", leaves.len(), dt.as_secs_f64());
            if graph {
                dump::graph(&tree, std::io::stdout())?;
            } else {
                println!("Root Hash: {}", tree.digest());
            }
            if let Some(path) = root {
                save_root(&tree, &path)?;
            }
            if save {
                let store = LeafStore::new(Storage::open(&opts.storage)?);
                if unbatched {
                    store.save_leaves(&leaves)?;
                } else {
                    store.save_leaves_batch(&leaves)?;
                }
            }
        }
        Command::Root { path } => {
            let root = load_root(&path)?;
            println!("Loaded Root Hash: {}", hex::encode(&root));
        }
        Command::Fetch { key, count } => {
            let store = LeafStore::new(Storage::open(&opts.storage)?);
            match key {
                Some(key) => println!("{}", hex::encode(store.fetch_leaf(&key)?)),
                None => dump::dump_leaves(&store, count, std::io::stdout())?,
            }
        }
        Command::Prune { count } => {
            let store = LeafStore::new(Storage::open(&opts.storage)?);
            store.prune_leaves(count)?;
        }
        Command::Map { path, max_gib } => {
            let config = match max_gib {
                Some(gib) => MmapConfig::from_gib(gib)?,
                None => MmapConfig::default(),
            };
            let service = MmapService::new(config);
            let region = service.safe_map_file(&path)?;
            println!("{}: {} bytes", path.display(), region.len());
            println!("Digest: {}", leaftree::digest::hash(&region));
            service.safe_unmap(region)?;
        }
        Command::Random { size } => {
            println!("Random Data: {}", hex::encode(random_data(size)));
        }
    }
    Ok(())
}
