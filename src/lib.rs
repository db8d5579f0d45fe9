#![warn(unused_crate_dependencies)]
#![warn(rustdoc::broken_intra_doc_links)]
//! Construction of UnixFS v1 DAGs over DAG-PB.
//!
//! Byte streams become balanced trees of raw leaves under file interior
//! nodes, directory entries become single-block directories or HAMT shards,
//! and every block is keyed by a CIDv1 over its SHA-256 digest. Output is
//! deterministic: the same bytes, chunking and widths always reproduce the
//! same root CID, bit-for-bit compatible with the go and js builders.
//!
//! Blocks are written to a caller-supplied [`BlockSink`] in post-order,
//! children before parents, root last. Builders return the root [`Cid`]
//! together with the total number of block bytes written by the build.
//!
//! ```no_run
//! # async fn example() -> Result<(), arbor::Error> {
//! use arbor::{build_unixfs_file, Config, MemoryBlockstore};
//!
//! let file = tokio::fs::File::open("film.mkv").await?;
//! let mut store = MemoryBlockstore::new();
//! let (root, written) = build_unixfs_file(file, Config::default(), &mut store).await?;
//! println!("{root} ({written} bytes)");
//! # Ok(())
//! # }
//! ```

mod chunker;
mod dag_pb;
mod dir;
mod fs;
mod multicodec;
mod stores;
mod unixfs;

pub use chunker::{Chunker, BLOCK_SIZE_LIMIT, DEFAULT_CHUNK_SIZE};
pub use dir::{
    build_directory, build_entry, build_plain_directory, build_sharded_directory,
    DEFAULT_SHARD_WIDTH, SHARD_SPLIT_THRESHOLD,
};
pub use fs::build_unixfs_path;
pub use multicodec::{DAG_PB_CODE, MURMUR3_X64_64_CODE, RAW_CODE, SHA_256_CODE};
pub use stores::{BlockSink, Config, MemoryBlockstore, DEFAULT_TREE_WIDTH};
pub use unixfs::{build_unixfs_file, build_unixfs_symlink};

// We need to expose these because blocks are keyed by `Cid` and directory
// entries are `PbLink`s.
pub use ipld_core::cid::Cid;
pub use ipld_dagpb::PbLink;

/// UnixFS building errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chunker produced a chunk above [`BLOCK_SIZE_LIMIT`].
    #[error("chunk of {0} bytes exceeds the block size limit")]
    OversizedChunkError(usize),

    /// The chunker specification was not understood. Recognized forms are
    /// the empty string and `size-<n>`.
    #[error("unrecognized chunker specification: {0:?}")]
    ChunkerSpecError(String),

    /// A balanced tree cannot be built with fewer than two links per node.
    #[error("tree width must be at least 2, got {0}")]
    TreeWidthError(usize),

    /// Shard fanouts must be powers of two of at least 8, so that bucket
    /// indexes are whole numbers of hash bits and the bitmap fills whole
    /// bytes.
    #[error("fanout must be a power of two of at least 8, got {0}")]
    FanoutError(usize),

    /// The entries cannot fit a single directory block. The caller decides
    /// whether to retry with [`build_sharded_directory`].
    #[error("directory estimated at {estimated} bytes exceeds the {limit} byte single-block limit")]
    DirectoryTooLargeError { estimated: usize, limit: usize },

    /// Two entry names hashed to the same bucket path through every level
    /// of the trie. Practically unreachable with a 64-bit name hash.
    #[error("entry names collide: the name digest was exhausted")]
    HashExhaustedError,

    /// A size accumulator would wrap. `FileSize` and `Tsize` are unsigned
    /// 64-bit on the wire; wrapping would silently corrupt them.
    #[error("size accounting overflowed a 64-bit counter")]
    SizeOverflowError,

    /// Names on the wire are UTF-8, the filesystem handed us something
    /// else.
    #[error("file name {0:?} is not valid unicode")]
    FileNameError(std::ffi::OsString),

    /// The builder finished without producing a block; a build always
    /// produces at least one.
    #[error("the build produced no blocks")]
    EmptyTreeError,

    /// See [`IoError`](tokio::io::Error) for more information.
    #[error(transparent)]
    IoError(#[from] tokio::io::Error),

    /// See [`Error`](ipld_dagpb::Error) for more information.
    #[error(transparent)]
    DagPbError(#[from] ipld_dagpb::Error),

    /// See [`Error`](quick_protobuf::Error) for more information.
    #[error(transparent)]
    ProtobufError(#[from] quick_protobuf::Error),
}
