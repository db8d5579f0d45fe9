//! UnixFS directories: single-block directories and the switch into
//! HAMT shards when the entry list no longer fits one block.

mod hash_bits;
mod murmur3;
mod shard;

pub use shard::build_sharded_directory;

use ipld_core::cid::Cid;
use ipld_dagpb::PbLink;

use crate::{
    dag_pb,
    stores::BlockSink,
    unixfs::{encode_unixfs_data, unixfs_pb},
    Error,
};

/// Estimated directory size above which entries no longer fit a single
/// block and the directory is sharded, as defined in
/// [go-unixfsnode](https://github.com/ipfs/go-unixfsnode/blob/v1.9.0/data/builder/directory.go#L17-L24).
pub const SHARD_SPLIT_THRESHOLD: usize = 262144;

/// The fanout used when a directory is sharded automatically.
pub const DEFAULT_SHARD_WIDTH: usize = 256;

/// Build the link for one directory entry.
///
/// `size` is the entry's cumulative stored size, which lands in the link's
/// `Tsize` field; builders return exactly the value expected here.
pub fn build_entry(name: impl Into<String>, size: u64, hash: Cid) -> PbLink {
    PbLink {
        cid: hash,
        name: Some(name.into()),
        size: Some(size),
    }
}

/// Estimate of the serialized directory size: names plus link targets.
fn estimate_size(entries: &[PbLink]) -> usize {
    entries
        .iter()
        .map(|link| link.name.as_deref().unwrap_or_default().len() + link.cid.encoded_len())
        .sum()
}

/// Build a single-block UnixFS directory over `entries`.
///
/// Entries may be handed over in any order, the encoder writes links in
/// canonical name order. Fails with [`Error::DirectoryTooLargeError`] when
/// the entries cannot fit a single block; the caller decides whether to
/// retry with [`build_sharded_directory`], or use [`build_directory`] to
/// make that switch automatic.
///
/// Returns the directory [`Cid`] and the cumulative stored size: the
/// entries' `Tsize`s plus the directory block itself.
pub async fn build_plain_directory<S>(entries: Vec<PbLink>, sink: &mut S) -> Result<(Cid, u64), Error>
where
    S: BlockSink,
{
    let estimated = estimate_size(&entries);
    if estimated > SHARD_SPLIT_THRESHOLD {
        return Err(Error::DirectoryTooLargeError {
            estimated,
            limit: SHARD_SPLIT_THRESHOLD,
        });
    }

    let mut total: u64 = 0;
    for link in &entries {
        total = total
            .checked_add(link.size.unwrap_or(0))
            .ok_or(Error::SizeOverflowError)?;
    }

    let node_data = unixfs_pb::Data {
        Type: unixfs_pb::mod_Data::DataType::Directory,
        ..Default::default()
    };
    let data = encode_unixfs_data(node_data)?;
    let (cid, block) = dag_pb::encode_node(Some(data.into()), entries)?;
    total = total
        .checked_add(block.len() as u64)
        .ok_or(Error::SizeOverflowError)?;
    sink.put_block(&cid, block).await?;
    Ok((cid, total))
}

/// Build a UnixFS directory over `entries`, sharding it when the entry
/// list no longer fits a single block.
pub async fn build_directory<S>(entries: Vec<PbLink>, sink: &mut S) -> Result<(Cid, u64), Error>
where
    S: BlockSink,
{
    if estimate_size(&entries) > SHARD_SPLIT_THRESHOLD {
        tracing::trace!(entries = entries.len(), "directory exceeds a single block, sharding");
        build_sharded_directory(DEFAULT_SHARD_WIDTH, entries, sink).await
    } else {
        build_plain_directory(entries, sink).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ipld_core::codec::Codec;
    use ipld_dagpb::{DagPbCodec, PbNode};

    use super::*;
    use crate::{build_unixfs_file, Config, MemoryBlockstore};

    async fn file_entry(name: &str, content: &[u8], store: &mut MemoryBlockstore) -> PbLink {
        let (cid, size) = build_unixfs_file(
            Cursor::new(content.to_vec()),
            Config::default(),
            store,
        )
        .await
        .unwrap();
        build_entry(name, size, cid)
    }

    fn clone_link(link: &PbLink) -> PbLink {
        PbLink {
            cid: link.cid,
            name: link.name.clone(),
            size: link.size,
        }
    }

    #[tokio::test]
    async fn entry_helper_fills_all_fields() {
        let mut store = MemoryBlockstore::new();
        let entry = file_entry("hello.txt", b"hello", &mut store).await;
        assert_eq!(entry.name, Some("hello.txt".to_string()));
        assert_eq!(entry.size, Some(5));
        assert_eq!(
            entry.cid.to_string(),
            "bafkreibm6jg3ux5qumhcn2b3flc3tyu6dmlb4xa7u5bf44yegnrjhc4yeq"
        );
    }

    #[tokio::test]
    async fn empty_directory_reference() {
        let mut store = MemoryBlockstore::new();
        let (root, size) = build_plain_directory(vec![], &mut store).await.unwrap();
        assert_eq!(
            root.to_string(),
            "bafybeiczsscdsbs7ffqz55asqdf3smv6klcw3gofszvwlyarci47bgf354"
        );
        assert_eq!(size, 4);
    }

    #[tokio::test]
    async fn single_file_wrapped_in_directory() {
        let mut store = MemoryBlockstore::new();
        let entry = file_entry("hello.txt", b"hello", &mut store).await;
        let (root, size) = build_plain_directory(vec![entry], &mut store).await.unwrap();
        assert_eq!(
            root.to_string(),
            "bafybeifvbzj3rk2unsdhbq6wisbcblekwf2pjpgjmppv6ejplsyyhdn4ym"
        );
        assert_eq!(size, 62);
        assert_eq!(store.total_size(), size);
    }

    #[tokio::test]
    async fn links_are_canonically_ordered() {
        let mut store = MemoryBlockstore::new();
        let mut entries = vec![];
        for name in ["zanzibar", "alpha", "mid", "Beta", "42"] {
            entries.push(file_entry(name, name.as_bytes(), &mut store).await);
        }
        let (root, _) = build_plain_directory(entries, &mut store).await.unwrap();
        let node: PbNode = DagPbCodec::decode_from_slice(store.get(&root).unwrap()).unwrap();
        let names: Vec<_> = node
            .links
            .iter()
            .map(|l| l.name.clone().unwrap())
            .collect();
        // ascending name bytes: digits before uppercase before lowercase
        assert_eq!(names, vec!["42", "Beta", "alpha", "mid", "zanzibar"]);
    }

    #[tokio::test]
    async fn shuffled_entries_share_a_root() {
        let mut store = MemoryBlockstore::new();
        let mut entries = vec![];
        for name in ["one", "two", "three", "four"] {
            entries.push(file_entry(name, name.as_bytes(), &mut store).await);
        }
        let mut backwards: Vec<_> = entries.iter().map(clone_link).collect();
        backwards.reverse();
        let (root_a, _) = build_plain_directory(entries, &mut store).await.unwrap();
        let (root_b, _) = build_plain_directory(backwards, &mut store).await.unwrap();
        assert_eq!(root_a, root_b);
    }

    /// 1343 long-named entries still fit a single block; one more tips the
    /// estimate over [`SHARD_SPLIT_THRESHOLD`] and the directory becomes a
    /// fanout-256 HAMT. Roots and totals are fixtures from the reference
    /// implementation.
    #[tokio::test]
    async fn sharding_boundary_reference() {
        const NAME_PREFIX: &str = "long name to fill out bytes to make the sharded directory \
                                   test flip over the sharded directory limit because link \
                                   names are included in the directory entry ";

        async fn long_entries(count: usize, store: &mut MemoryBlockstore) -> Vec<PbLink> {
            let mut entries = Vec::with_capacity(count);
            for i in 0..count {
                let name = format!("{NAME_PREFIX}{i}");
                let (cid, size) = build_unixfs_file(
                    Cursor::new(name.clone().into_bytes()),
                    Config::default(),
                    store,
                )
                .await
                .unwrap();
                entries.push(build_entry(name, size, cid));
            }
            entries
        }

        let mut store = MemoryBlockstore::new();
        let entries = long_entries(1343, &mut store).await;
        let (root, size) = build_directory(entries, &mut store).await.unwrap();
        assert_eq!(
            root.to_string(),
            "bafybeihecq4rpl4nw3cgfb2uiwltgsmw5sutouvuldv5fxn4gfbihvnalq"
        );
        assert_eq!(size, 490_665);
        assert_eq!(store.total_size(), size);
        // 1343 leaves and one directory block: it stayed plain
        assert_eq!(store.len(), 1344);

        let mut store = MemoryBlockstore::new();
        let entries = long_entries(1344, &mut store).await;
        let leaf_count = store.len();
        let (root, size) = build_directory(entries, &mut store).await.unwrap();
        assert_eq!(
            root.to_string(),
            "bafybeigyvxs6og5jbmpaa43qbhhd5swklqcfzqdrtjgfh53qjon6hpjaye"
        );
        assert_eq!(size, 515_735);
        assert_eq!(store.total_size(), size);
        // this time the entries fanned out across shards
        assert!(store.len() > leaf_count + 1);
    }

    #[tokio::test]
    async fn oversized_directory_is_rejected() {
        let mut store = MemoryBlockstore::new();
        // names this long blow the estimate with just a handful of entries
        let filler = "x".repeat(100_000);
        let mut entries = vec![];
        for i in 0..3 {
            entries.push(file_entry(&format!("{filler}{i}"), b"payload", &mut store).await);
        }
        let copies: Vec<_> = entries.iter().map(clone_link).collect();
        let result = build_plain_directory(copies, &mut store).await;
        assert!(matches!(
            result,
            Err(Error::DirectoryTooLargeError { .. })
        ));

        // the automatic builder shards instead
        let (root, _) = build_directory(entries, &mut store).await.unwrap();
        let node: PbNode = DagPbCodec::decode_from_slice(store.get(&root).unwrap()).unwrap();
        assert!(!node.links.is_empty());
    }
}
