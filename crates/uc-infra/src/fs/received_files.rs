use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uc_core::ports::ReceivedFileStorePort;
use uc_core::TransferRecord;

/// Writes received files into a shared folder.
///
/// Only the final path component of the announced name is used. An existing
/// file with the same name is never overwritten; a numbered name is picked
/// instead.
pub struct FsReceivedFileStore {
    dir: PathBuf,
}

impl FsReceivedFileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn free_path(&self, filename: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(filename);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(filename);
        let extension = path.extension().and_then(|ext| ext.to_str());
        for n in 1u32.. {
            let name = match extension {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.dir.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        anyhow::bail!("no free file name for {filename}")
    }
}

#[async_trait]
impl ReceivedFileStorePort for FsReceivedFileStore {
    async fn store(&self, record: &TransferRecord, content: Bytes) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create shared dir failed: {}", self.dir.display()))?;

        let filename = sanitize_filename(&record.filename)
            .unwrap_or_else(|| format!("received-{}", record.fingerprint.short()));
        let path = self.free_path(&filename).await?;

        let tmp_path = self
            .dir
            .join(format!(".{}.part", record.fingerprint.short()));
        tokio::fs::write(&tmp_path, &content)
            .await
            .with_context(|| format!("write temp file failed: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("move received file failed: {}", path.display()))?;

        debug!(path = %path.display(), size_bytes = content.len(), "Stored received file");
        Ok(path)
    }
}

/// Last path component, or `None` when nothing usable is left.
fn sanitize_filename(announced: &str) -> Option<String> {
    let name = announced
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
