//! Importing filesystem trees.

use std::path::Path;

use futures::future::BoxFuture;
use ipld_core::cid::Cid;
use tokio::fs;

use crate::{
    dir::{build_directory, build_entry},
    stores::{BlockSink, Config},
    unixfs::{build_unixfs_file, build_unixfs_symlink},
    Error,
};

/// Build the UnixFS DAG for the file, directory or symlink at `path`,
/// writing every block to `sink`.
///
/// Directories are visited with their entries in name order, files are
/// chunked per `config`, and symlinks become UnixFS symlink nodes holding
/// their target path. Returns the root [`Cid`] and the cumulative stored
/// size of the imported tree.
pub async fn build_unixfs_path<P, S>(
    path: P,
    config: Config,
    sink: &mut S,
) -> Result<(Cid, u64), Error>
where
    P: AsRef<Path>,
    S: BlockSink + Send,
{
    build_path(path.as_ref(), config, sink).await
}

// Directory recursion makes the future self-referential, hence the manual
// boxing.
fn build_path<'a, S>(
    path: &'a Path,
    config: Config,
    sink: &'a mut S,
) -> BoxFuture<'a, Result<(Cid, u64), Error>>
where
    S: BlockSink + Send,
{
    Box::pin(async move {
        let metadata = fs::symlink_metadata(path).await?;

        if metadata.is_symlink() {
            let target = fs::read_link(path).await?;
            let target = target
                .to_str()
                .ok_or_else(|| Error::FileNameError(target.clone().into_os_string()))?
                .to_owned();
            return build_unixfs_symlink(&target, sink).await;
        }

        if metadata.is_dir() {
            let mut names = vec![];
            let mut dir = fs::read_dir(path).await?;
            while let Some(entry) = dir.next_entry().await? {
                names.push(entry.file_name());
            }
            names.sort();

            let mut entries = Vec::with_capacity(names.len());
            for name in names {
                let (cid, size) = build_path(&path.join(&name), config, sink).await?;
                let name = name
                    .into_string()
                    .map_err(Error::FileNameError)?;
                entries.push(build_entry(name, size, cid));
            }
            return build_directory(entries, sink).await;
        }

        let file = fs::File::open(path).await?;
        build_unixfs_file(file, config, sink).await
    })
}
