//! Splitting a byte source into fixed-size chunks.

use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_stream::Stream;

use crate::Error;

/// The default chunk size, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/f4fe8997dcbeb39b3a4842d8f08b34739bfd84a4/chunker/parse.go#L13).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 256;

/// The maximum size a block is allowed to have, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/625ba769263c2beeec934836f54bbd6624db945a/ipld/unixfs/importer/helpers/helpers.go#L13).
pub const BLOCK_SIZE_LIMIT: usize = 1_048_576;

/// Strategy used to split a byte source into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunker {
    /// Split the source into chunks of exactly this many bytes,
    /// the last chunk holding whatever remains.
    Fixed(usize),
}

impl Chunker {
    /// Parse a chunker specification.
    ///
    /// The empty specification yields the default fixed-size chunker,
    /// `size-<n>` yields a fixed-size chunker over `n` byte chunks.
    /// Chunk sizes of zero or above [`BLOCK_SIZE_LIMIT`] are rejected,
    /// as is any other specification.
    pub fn from_spec(spec: &str) -> Result<Self, Error> {
        if spec.is_empty() {
            return Ok(Self::default());
        }
        match spec.split_once('-') {
            Some(("size", size)) => {
                let size = size
                    .parse()
                    .map_err(|_| Error::ChunkerSpecError(spec.to_string()))?;
                if size == 0 || size > BLOCK_SIZE_LIMIT {
                    return Err(Error::ChunkerSpecError(spec.to_string()));
                }
                Ok(Chunker::Fixed(size))
            }
            _ => Err(Error::ChunkerSpecError(spec.to_string())),
        }
    }

    pub(crate) fn chunk_size(&self) -> usize {
        match self {
            Chunker::Fixed(size) => *size,
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Chunker::Fixed(DEFAULT_CHUNK_SIZE)
    }
}

impl FromStr for Chunker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chunker::from_spec(s)
    }
}

/// Gather `source` into chunks of exactly `chunk_size` bytes.
///
/// `tokio_util::io::ReaderStream` does a very similar thing, however, it does
/// not attempt to fill its buffer before returning, voiding the whole promise
/// of properly sized chunks. Short reads are therefore accumulated until a
/// full chunk can be split off; only the final chunk may be shorter.
pub(crate) fn chunk_stream<S>(
    mut source: S,
    chunk_size: usize,
) -> impl Stream<Item = std::io::Result<Bytes>>
where
    S: AsyncRead + Unpin,
{
    async_stream::try_stream! {
        let mut buf = BytesMut::with_capacity(chunk_size);

        loop {
            // A single read may cross several chunk boundaries,
            // `split_to` leaves the overflow for the next chunk.
            while buf.len() >= chunk_size {
                yield buf.split_to(chunk_size).freeze();
            }

            // `reserve` may allocate more than requested to avoid further
            // allocations, the exact split above keeps that harmless.
            buf.reserve(chunk_size - buf.len());
            let read = source.read_buf(&mut buf).await?;
            if read == 0 {
                if !buf.is_empty() {
                    yield buf.split().freeze();
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio_stream::StreamExt;

    use super::*;

    #[test]
    fn parse_default_spec() {
        assert_eq!(Chunker::from_spec("").unwrap(), Chunker::Fixed(DEFAULT_CHUNK_SIZE));
        assert_eq!("".parse::<Chunker>().unwrap(), Chunker::default());
    }

    #[test]
    fn parse_sized_spec() {
        assert_eq!(Chunker::from_spec("size-1024").unwrap(), Chunker::Fixed(1024));
        assert_eq!(Chunker::from_spec("size-1").unwrap(), Chunker::Fixed(1));
    }

    #[test]
    fn reject_unknown_specs() {
        for spec in ["size-0", "size-", "size-banana", "rabin-16-32-64", "buzhash"] {
            assert!(matches!(
                Chunker::from_spec(spec),
                Err(Error::ChunkerSpecError(_))
            ));
        }
        // over the block limit
        assert!(Chunker::from_spec("size-1048577").is_err());
        assert!(Chunker::from_spec("size-1048576").is_ok());
    }

    async fn collect_chunks(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
        let stream = chunk_stream(Cursor::new(data.to_vec()), chunk_size);
        tokio::pin!(stream);
        let mut chunks = vec![];
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn exact_chunk_sizes() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        let chunks = collect_chunks(&data, 256).await;
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![256, 256, 256, 232]
        );
        let rejoined: Vec<u8> = chunks.concat();
        assert_eq!(rejoined, data);
    }

    #[tokio::test]
    async fn multiple_of_chunk_size() {
        let data = vec![0xAB; 512];
        let chunks = collect_chunks(&data, 256).await;
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![256, 256]);
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        let chunks = collect_chunks(&[], 256).await;
        assert!(chunks.is_empty());
    }
}
