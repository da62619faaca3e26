use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ovl_types::StoreKey;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use crate::format::{encode_header_block, read_header_block, validate_headers};
use crate::traits::EntryStore;

/// How `set` puts bytes on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Exclusively create the final file and stream into it.
    ///
    /// A body copy that fails midway leaves a truncated entry behind, which
    /// stays visible until it is deleted.
    #[default]
    Direct,
    /// Stream into a private temporary file, then publish it with a hard
    /// link that fails if the final name exists.
    ///
    /// A failed copy never exposes a partial entry. Requires a filesystem
    /// with hard link support.
    Staged,
}

/// Filesystem-backed entry store.
///
/// Each entry is one file under `root`, named by the hex [`StoreKey`] of its
/// path. Creation uses the filesystem's exclusive-create primitive, which
/// is the only concurrency control: no in-process locks are taken, so any
/// number of tasks or processes can share one root.
#[derive(Clone, Debug)]
pub struct FsEntryStore {
    root: PathBuf,
    mode: WriteMode,
}

impl FsEntryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>, mode: WriteMode) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, mode })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configured write mode.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// On-disk location of the entry for `path`.
    pub fn location(&self, path: &str) -> PathBuf {
        self.root.join(StoreKey::derive(path).to_hex())
    }

    async fn create_direct(
        &self,
        path: &str,
        target: &Path,
        block: &[u8],
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<()> {
        let file = create_exclusive(target)
            .await
            .map_err(|e| exists_or_io(e, path))?;
        let mut writer = BufWriter::new(file);
        write_entry(&mut writer, block, body).await?;
        Ok(())
    }

    async fn create_staged(
        &self,
        path: &str,
        target: &Path,
        block: &[u8],
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<()> {
        let staging = self.root.join(format!(".tmp-{}", Uuid::now_v7()));
        let file = create_exclusive(&staging).await?;
        let mut writer = BufWriter::new(file);
        if let Err(e) = write_entry(&mut writer, block, body).await {
            drop(writer);
            discard(&staging).await;
            return Err(e.into());
        }
        drop(writer);

        let published = fs::hard_link(&staging, target).await;
        discard(&staging).await;
        published.map_err(|e| exists_or_io(e, path))
    }
}

#[async_trait]
impl EntryStore for FsEntryStore {
    async fn get(&self, path: &str) -> StoreResult<Entry> {
        let location = self.location(path);
        let file = match File::open(&location).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let headers = read_header_block(&mut reader).await?;
        Ok(Entry::new(headers, reader))
    }

    async fn set(&self, path: &str, entry: Entry) -> StoreResult<()> {
        validate_headers(entry.headers())?;
        let (headers, mut body) = entry.into_parts();
        let block = encode_header_block(&headers);
        let target = self.location(path);

        let result = match self.mode {
            WriteMode::Direct => self.create_direct(path, &target, &block, &mut body).await,
            WriteMode::Staged => self.create_staged(path, &target, &block, &mut body).await,
        };
        match &result {
            Ok(()) => debug!(path, file = %target.display(), "entry created"),
            Err(StoreError::Exists(_)) => debug!(path, "entry already exists"),
            Err(e) => warn!(path, error = %e, "entry write failed"),
        }
        result
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        match fs::remove_file(self.location(path)).await {
            Ok(()) => {
                debug!(path, "entry deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn create_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn write_entry<W>(
    writer: &mut W,
    block: &[u8],
    body: &mut (dyn AsyncRead + Send + Unpin),
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(block).await?;
    let copied = tokio::io::copy(body, writer).await?;
    writer.flush().await?;
    Ok(copied)
}

fn exists_or_io(e: std::io::Error, path: &str) -> StoreError {
    if e.kind() == ErrorKind::AlreadyExists {
        StoreError::Exists(path.to_string())
    } else {
        StoreError::Io(e)
    }
}

async fn discard(staging: &Path) {
    if let Err(e) = fs::remove_file(staging).await {
        warn!(file = %staging.display(), error = %e, "failed to remove staging file");
    }
}
