//! Where finished blocks go, and the knobs controlling how they are built.

mod memory;

pub use memory::MemoryBlockstore;

use bytes::Bytes;
use ipld_core::cid::Cid;

use crate::{chunker::Chunker, Error};

/// The default tree width, also called links per block, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/625ba769263c2beeec934836f54bbd6624db945a/ipld/unixfs/importer/helpers/helpers.go#L16-L30).
pub const DEFAULT_TREE_WIDTH: usize = 174;

/// Sink for finished blocks.
///
/// Builders write blocks in post-order: every block is committed before any
/// block linking to it, and the root arrives last. A sink is used by one
/// build at a time; a failed `put_block` aborts the build, leaving whatever
/// was already committed in place.
pub trait BlockSink {
    /// Store a finished block under `cid`.
    fn put_block(
        &mut self,
        cid: &Cid,
        data: Bytes,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

/// Build configuration options.
#[derive(Debug, Clone, Copy)]
pub enum Config {
    /// Use the balanced tree layout, splitting the source with `chunker`
    /// and gathering nodes in groups of at most `tree_width` children.
    Balanced {
        chunker: Chunker,
        tree_width: usize,
    },
}

impl Config {
    /// Create a new [`Config::Balanced`].
    pub fn balanced(chunker: Chunker, tree_width: usize) -> Self {
        Self::Balanced {
            chunker,
            tree_width,
        }
    }

    /// Create a [`Config::Balanced`] from a chunker specification string,
    /// keeping the default tree width.
    pub fn with_chunker_spec(spec: &str) -> Result<Self, Error> {
        Ok(Self::Balanced {
            chunker: Chunker::from_spec(spec)?,
            tree_width: DEFAULT_TREE_WIDTH,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::Balanced {
            chunker: Chunker::default(),
            tree_width: DEFAULT_TREE_WIDTH,
        }
    }
}
