//! HAMT sharded directories.
//!
//! Entry names are hashed and the digest consumed `log2(fanout)` bits per
//! trie level, so the resulting DAG depends only on the entry set, never on
//! insertion order. Serialization is post-order: child shards are written
//! before the shard linking to them.

use std::collections::BTreeMap;

use bytes::Bytes;
use ipld_core::cid::Cid;
use ipld_dagpb::PbLink;

use super::{hash_bits::HashBits, murmur3};
use crate::{
    dag_pb,
    multicodec::MURMUR3_X64_64_CODE,
    stores::BlockSink,
    unixfs::{encode_unixfs_data, unixfs_pb},
    Error,
};

/// One bucket of a shard: either a direct entry or a nested shard.
#[derive(Debug)]
enum Bucket {
    Leaf { link: PbLink, digest: [u8; 8] },
    Shard(Shard),
}

/// A single node of the trie.
#[derive(Debug)]
struct Shard {
    fanout: usize,
    /// Bits of the digest consumed per level, `log2(fanout)`.
    bits: usize,
    depth: usize,
    children: BTreeMap<usize, Bucket>,
}

impl Shard {
    fn new(fanout: usize, bits: usize, depth: usize) -> Self {
        Self {
            fanout,
            bits,
            depth,
            children: BTreeMap::new(),
        }
    }

    fn insert(&mut self, link: PbLink, digest: [u8; 8]) -> Result<(), Error> {
        let bucket = HashBits::new(&digest).slice(self.depth * self.bits, self.bits)?;
        match self.children.remove(&bucket) {
            None => {
                self.children.insert(bucket, Bucket::Leaf { link, digest });
            }
            Some(Bucket::Shard(mut child)) => {
                child.insert(link, digest)?;
                self.children.insert(bucket, Bucket::Shard(child));
            }
            Some(Bucket::Leaf {
                link: incumbent,
                digest: incumbent_digest,
            }) => {
                // The bucket splits: both the incumbent and the newcomer
                // move down a level, where their digests diverge again.
                let mut child = Shard::new(self.fanout, self.bits, self.depth + 1);
                child.insert(incumbent, incumbent_digest)?;
                child.insert(link, digest)?;
                self.children.insert(bucket, Bucket::Shard(child));
            }
        }
        Ok(())
    }

    /// The occupied-bucket bitmap: bit `i` of a big-endian integer, with
    /// leading zero bytes trimmed off the serialized form.
    fn bitmap(&self) -> Vec<u8> {
        let mut bitmap = vec![0u8; self.fanout / 8];
        let len = bitmap.len();
        for index in self.children.keys() {
            bitmap[len - 1 - index / 8] |= 1 << (index % 8);
        }
        let occupied = bitmap.iter().position(|byte| *byte != 0).unwrap_or(len);
        bitmap.split_off(occupied)
    }

    /// Serialize the shard and everything below it into `blocks`,
    /// children first. Returns the shard's [`Cid`] and the cumulative size
    /// of the subtree (entry sizes plus every shard block).
    fn serialize(self, blocks: &mut Vec<(Cid, Bytes)>) -> Result<(Cid, u64), Error> {
        let width = hex_width(self.fanout);
        let bitmap = self.bitmap();

        let mut links = Vec::with_capacity(self.children.len());
        let mut total: u64 = 0;
        for (index, bucket) in self.children {
            match bucket {
                Bucket::Shard(child) => {
                    let (cid, size) = child.serialize(blocks)?;
                    total = total.checked_add(size).ok_or(Error::SizeOverflowError)?;
                    links.push(PbLink {
                        cid,
                        name: Some(format!("{index:0width$X}")),
                        size: Some(size),
                    });
                }
                Bucket::Leaf { link, .. } => {
                    let name = format!(
                        "{index:0width$X}{}",
                        link.name.as_deref().unwrap_or_default()
                    );
                    total = total
                        .checked_add(link.size.unwrap_or(0))
                        .ok_or(Error::SizeOverflowError)?;
                    links.push(PbLink {
                        cid: link.cid,
                        name: Some(name),
                        size: link.size,
                    });
                }
            }
        }

        let node_data = unixfs_pb::Data {
            Type: unixfs_pb::mod_Data::DataType::HAMTShard,
            Data: Some(bitmap),
            hashType: Some(MURMUR3_X64_64_CODE),
            fanout: Some(self.fanout as u64),
            ..Default::default()
        };
        let data = encode_unixfs_data(node_data)?;
        let (cid, block) = dag_pb::encode_node(Some(data.into()), links)?;
        let total = total
            .checked_add(block.len() as u64)
            .ok_or(Error::SizeOverflowError)?;
        blocks.push((cid, block));
        Ok((cid, total))
    }
}

/// Link names carry the bucket index as zero-padded uppercase hex, wide
/// enough for the largest index.
fn hex_width(fanout: usize) -> usize {
    format!("{:X}", fanout - 1).len()
}

/// Build a HAMT over `entries` with the given `fanout`, writing every shard
/// block to `sink`.
///
/// `fanout` must be a power of two of at least 8. Returns the root shard's
/// [`Cid`] and the cumulative stored size of the directory: the entries'
/// `Tsize`s plus every shard block written by this call.
pub async fn build_sharded_directory<S>(
    fanout: usize,
    entries: Vec<PbLink>,
    sink: &mut S,
) -> Result<(Cid, u64), Error>
where
    S: BlockSink,
{
    if !fanout.is_power_of_two() || fanout < 8 {
        return Err(Error::FanoutError(fanout));
    }
    let bits = fanout.trailing_zeros() as usize;

    let mut root = Shard::new(fanout, bits, 0);
    for link in entries {
        let digest = murmur3::name_digest(link.name.as_deref().unwrap_or_default().as_bytes());
        root.insert(link, digest)?;
    }

    let mut blocks = Vec::new();
    let (root_cid, total) = root.serialize(&mut blocks)?;
    let shard_count = blocks.len();
    for (cid, block) in blocks {
        sink.put_block(&cid, block).await?;
    }
    tracing::debug!(root = %root_cid, total, shard_count, "built sharded directory");
    Ok((root_cid, total))
}
