//! UnixFS file DAGs: chunk leaves packed under a balanced tree of
//! interior nodes.
//!
//! The layout matches what `ipfs add --cid-version=1` produces, so a given
//! byte stream, chunk size and tree width always reproduce the same root.

pub(crate) mod unixfs_pb;

use std::collections::VecDeque;

use async_stream::try_stream;
use bytes::Bytes;
use futures::TryStreamExt;
use ipld_core::cid::Cid;
use ipld_dagpb::PbLink;
use quick_protobuf::MessageWrite;
use sha2::Sha256;
use tokio::io::AsyncRead;
use tokio_stream::{Stream, StreamExt};

use crate::{
    chunker::{chunk_stream, BLOCK_SIZE_LIMIT},
    dag_pb,
    multicodec::{generate_multihash, RAW_CODE},
    stores::{BlockSink, Config},
    Error,
};

/// Serialize a UnixFS [`unixfs_pb::Data`] message.
pub(crate) fn encode_unixfs_data(data: unixfs_pb::Data) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::with_capacity(data.get_size());
    let mut writer = quick_protobuf::Writer::new(&mut bytes);
    data.write_message(&mut writer)?;
    Ok(bytes)
}

/// Sizes tracked for every node already emitted. `payload` counts the file
/// bytes reachable through the node, `stored` counts the encoded bytes of
/// the node and everything below it. The two drift apart on interior nodes:
/// `payload` feeds `FileSize`/`BlockSizes`, `stored` feeds link `Tsize`s.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkInfo {
    payload: u64,
    stored: u64,
}

#[derive(Debug)]
enum TreeNode {
    Leaf(Bytes),
    Stem(Vec<(Cid, LinkInfo)>),
}

impl TreeNode {
    fn encode(self) -> Result<((Cid, Bytes), LinkInfo), Error> {
        match self {
            TreeNode::Leaf(bytes) => {
                if bytes.len() > BLOCK_SIZE_LIMIT {
                    return Err(Error::OversizedChunkError(bytes.len()));
                }
                let size = bytes.len() as u64;
                // Leaves are raw blocks, the chunk bytes are stored verbatim.
                let cid = Cid::new_v1(RAW_CODE, generate_multihash::<Sha256, _>(&bytes));
                Ok((
                    (cid, bytes),
                    LinkInfo {
                        payload: size,
                        stored: size,
                    },
                ))
            }
            TreeNode::Stem(children) => {
                let mut filesize: u64 = 0;
                let mut stored: u64 = 0;
                let mut blocksizes = Vec::with_capacity(children.len());
                let mut links = Vec::with_capacity(children.len());
                for (cid, info) in children {
                    filesize = filesize
                        .checked_add(info.payload)
                        .ok_or(Error::SizeOverflowError)?;
                    stored = stored
                        .checked_add(info.stored)
                        .ok_or(Error::SizeOverflowError)?;
                    blocksizes.push(info.payload);
                    links.push(PbLink {
                        cid,
                        // Present-but-empty name, matching the go builders.
                        name: Some("".to_string()),
                        size: Some(info.stored),
                    });
                }

                let node_data = unixfs_pb::Data {
                    Type: unixfs_pb::mod_Data::DataType::File,
                    filesize: Some(filesize),
                    blocksizes,
                    ..Default::default()
                };
                let node_data_bytes = encode_unixfs_data(node_data)?;

                let (cid, outer) = dag_pb::encode_node(Some(node_data_bytes.into()), links)?;
                let stored = stored
                    .checked_add(outer.len() as u64)
                    .ok_or(Error::SizeOverflowError)?;
                Ok((
                    (cid, outer),
                    LinkInfo {
                        payload: filesize,
                        stored,
                    },
                ))
            }
        }
    }
}

/// Turn a stream of chunks into a stream of blocks forming a balanced tree.
///
/// Leaves accumulate level by level: whenever a level holds `width` nodes it
/// is packed into a stem one level up and evicted, so state never exceeds
/// `depth × width` links. Every block is yielded exactly once, children
/// before the stems referencing them, root last.
///
/// Once the input is exhausted the leftover levels are stemmed bottom-up,
/// each remainder gaining a parent per level on the way to the root. Two
/// inputs get special treatment: an empty stream still yields a single empty
/// leaf, and a single-chunk stream yields that leaf as the root with no
/// stems at all.
pub(crate) fn stream_balanced_tree<I>(
    input: I,
    width: usize,
) -> impl Stream<Item = Result<(Cid, Bytes), Error>>
where
    I: Stream<Item = std::io::Result<Bytes>> + Send,
{
    try_stream! {
        let mut tree: VecDeque<Vec<(Cid, LinkInfo)>> = VecDeque::new();
        tree.push_back(vec![]);

        let input = input
            .err_into::<Error>()
            .map(|data| data.and_then(|data| TreeNode::Leaf(data).encode()));
        tokio::pin!(input);

        while let Some(data) = input.next().await {
            let (block @ (cid, _), link_info) = data?;
            let tree_height = tree.len();

            // A full leaf level means a stem can be built, which in turn
            // may complete the level above it, and so on upwards.
            if tree[0].len() == width {
                for level in 0..tree_height {
                    if tree[level].len() < width {
                        break;
                    }

                    // Completing the top level grows the tree.
                    if level == tree_height - 1 {
                        tree.push_back(Vec::with_capacity(width));
                    }

                    let links = std::mem::replace(&mut tree[level], Vec::with_capacity(width));
                    let (block @ (cid, _), link_info) = TreeNode::Stem(links).encode()?;
                    yield block;

                    tree[level + 1].push((cid, link_info));
                }
            }

            tree[0].push((cid, link_info));
            yield block;
        }

        // An empty source still produces a (single, empty) leaf.
        if tree.len() == 1 && tree[0].is_empty() {
            let (block, _) = TreeNode::Leaf(Bytes::new()).encode()?;
            yield block;
            return;
        }

        // A lone block is its own root.
        if tree.len() == 1 && tree[0].len() == 1 {
            return;
        }

        // Stem the leftovers level by level; once the front level is the
        // last one, the stem built over it is the root.
        while let Some(links) = tree.pop_front() {
            let (block @ (cid, _), link_info) = TreeNode::Stem(links).encode()?;
            yield block;

            if let Some(front) = tree.front_mut() {
                front.push((cid, link_info));
            }
        }
    }
}

/// Build a balanced UnixFS file DAG out of `source`, writing every block
/// to `sink`.
///
/// Returns the root [`Cid`] and the total number of bytes handed to the
/// sink, which for a deduplicating sink may exceed what it retained.
pub async fn build_unixfs_file<Src, S>(
    source: Src,
    config: Config,
    sink: &mut S,
) -> Result<(Cid, u64), Error>
where
    Src: AsyncRead + Unpin + Send,
    S: BlockSink,
{
    let Config::Balanced {
        chunker,
        tree_width,
    } = config;
    if tree_width < 2 {
        return Err(Error::TreeWidthError(tree_width));
    }

    let chunks = chunk_stream(source, chunker.chunk_size());
    let tree = stream_balanced_tree(chunks, tree_width);
    tokio::pin!(tree);

    let mut root = None;
    let mut total: u64 = 0;
    while let Some(block) = tree.next().await {
        let (cid, bytes) = block?;
        total = total
            .checked_add(bytes.len() as u64)
            .ok_or(Error::SizeOverflowError)?;
        sink.put_block(&cid, bytes).await?;
        root = Some(cid);
    }

    // The tree stream always yields at least one block.
    let Some(root) = root else {
        return Err(Error::EmptyTreeError);
    };
    tracing::debug!(root = %root, total, "built file tree");
    Ok((root, total))
}

/// Build a UnixFS symlink node pointing at `target`, writing it to `sink`.
pub async fn build_unixfs_symlink<S>(target: &str, sink: &mut S) -> Result<(Cid, u64), Error>
where
    S: BlockSink,
{
    let node_data = unixfs_pb::Data {
        Type: unixfs_pb::mod_Data::DataType::Symlink,
        Data: Some(target.as_bytes().to_vec()),
        ..Default::default()
    };
    let data = encode_unixfs_data(node_data)?;
    let (cid, block) = dag_pb::encode_node(Some(data.into()), vec![])?;
    let size = block.len() as u64;
    sink.put_block(&cid, block).await?;
    Ok((cid, size))
}
