//! Canonical DAG-PB node assembly.

use bytes::Bytes;
use ipld_core::{cid::Cid, codec::Codec};
use ipld_dagpb::{DagPbCodec, PbLink, PbNode};
use sha2::Sha256;

use crate::{
    multicodec::{generate_multihash, DAG_PB_CODE},
    Error,
};

/// Assemble, order and encode a DAG-PB node, returning its [`Cid`]
/// and the encoded block.
///
/// Links are sorted by name bytes before encoding so callers never have to
/// pre-sort. The sort is stable: links with equal names — file interior nodes
/// carry nothing but empty names — keep their insertion order.
pub(crate) fn encode_node(
    data: Option<Bytes>,
    mut links: Vec<PbLink>,
) -> Result<(Cid, Bytes), Error> {
    links.sort_by(|a, b| {
        let left = a.name.as_deref().unwrap_or_default();
        let right = b.name.as_deref().unwrap_or_default();
        left.as_bytes().cmp(right.as_bytes())
    });
    let node = PbNode { links, data };
    let encoded = DagPbCodec::encode_to_vec(&node)?;
    let cid = Cid::new_v1(DAG_PB_CODE, generate_multihash::<Sha256, _>(&encoded));
    Ok((cid, encoded.into()))
}

#[cfg(test)]
mod tests {
    use ipld_core::cid::Cid;
    use sha2::Sha256;

    use super::*;
    use crate::multicodec::RAW_CODE;

    fn raw_cid(data: &[u8]) -> Cid {
        Cid::new_v1(RAW_CODE, generate_multihash::<Sha256, _>(data))
    }

    #[test]
    fn named_links_are_sorted() {
        // Links assembled out of order, `Data` holding a UnixFS directory
        // marker. The expected bytes were cross-checked against an
        // independent encoder.
        let links = vec![
            PbLink {
                cid: raw_cid(b"bbb"),
                name: Some("b".to_string()),
                size: Some(7),
            },
            PbLink {
                cid: raw_cid(b"aaa"),
                name: Some("a".to_string()),
                size: Some(3),
            },
        ];
        let (cid, block) = encode_node(Some(vec![0x08, 0x01].into()), links).unwrap();
        assert_eq!(
            const_hex(&block),
            "122b0a24015512209834876dcfb05cb167a5c24953eba58c4ac89b1adf57f28f2f9d09af107ee8f0\
             1201611803122b0a24015512203e744b9dc39389baf0c5a0660589b8402f3dbb49b89b3e75f2c935\
             5852a3c67712016218070a020801"
        );
        assert_eq!(
            cid.to_string(),
            "bafybeifdjhxn4rr26cv532xx56khdbiwuv7fjs6km3japlg7wqo25gmrji"
        );
    }

    #[test]
    fn empty_names_keep_insertion_order() {
        let unnamed = |cid: Cid| PbLink {
            cid,
            name: Some("".to_string()),
            size: Some(3),
        };
        let first = raw_cid(b"zzz");
        let second = raw_cid(b"yyy");

        let (_, block) = encode_node(None, vec![unnamed(first), unnamed(second)]).unwrap();
        let decoded: PbNode = DagPbCodec::decode_from_slice(&block).unwrap();
        assert_eq!(decoded.links[0].cid, first);
        assert_eq!(decoded.links[1].cid, second);

        // swapping the input swaps the output, the sort must not
        // fall back to hash ordering
        let (_, block) = encode_node(None, vec![unnamed(second), unnamed(first)]).unwrap();
        let decoded: PbNode = DagPbCodec::decode_from_slice(&block).unwrap();
        assert_eq!(decoded.links[0].cid, second);
        assert_eq!(decoded.links[1].cid, first);
    }

    #[test]
    fn data_is_omitted_when_absent() {
        let (_, block) = encode_node(
            None,
            vec![PbLink {
                cid: raw_cid(b"aaa"),
                name: Some("a".to_string()),
                size: Some(3),
            }],
        )
        .unwrap();
        // a single link field and nothing else
        assert_eq!(block[0], 0x12);
        let decoded: PbNode = DagPbCodec::decode_from_slice(&block).unwrap();
        assert!(decoded.data.is_none());
    }

    fn const_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
