use bytes::Bytes;
use indexmap::IndexMap;
use ipld_core::cid::Cid;

use super::BlockSink;
use crate::Error;

/// A [`BlockSink`] keeping pairs of [`Cid`] and [`Bytes`] in memory.
///
/// Blocks are kept in insertion order, which for a single build is the
/// post-order of the DAG with the root last. Blocks are de-duplicated by
/// [`Cid`]: re-inserting an existing block is a no-op, so identical chunks
/// are stored once no matter how often they occur.
#[derive(Debug, Default)]
pub struct MemoryBlockstore {
    blocks: IndexMap<Cid, Bytes>,
}

impl MemoryBlockstore {
    /// Construct an empty [`MemoryBlockstore`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of unique blocks held.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    pub fn get(&self, cid: &Cid) -> Option<&Bytes> {
        self.blocks.get(cid)
    }

    /// Total size of the unique blocks held. A build over content with
    /// repeated chunks reports a larger written total than this.
    pub fn total_size(&self) -> u64 {
        self.blocks.values().map(|block| block.len() as u64).sum()
    }

    /// Iterate over the blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = (&Cid, &Bytes)> {
        self.blocks.iter()
    }
}

impl BlockSink for MemoryBlockstore {
    async fn put_block(&mut self, cid: &Cid, data: Bytes) -> Result<(), Error> {
        self.blocks.entry(*cid).or_insert(data);
        Ok(())
    }
}
