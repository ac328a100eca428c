//! File-system store for uploaded cover images.

use std::{
    io,
    path::{Path, PathBuf},
};

use time::OffsetDateTime;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};

/// URL prefix uploaded files are served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Suffixed names tried after the bare timestamp is taken.
const MAX_NAME_ATTEMPTS: u32 = 64;

/// Longest single path component common file systems accept.
const MAX_NAME_BYTES: usize = 255;

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Use `root` as the upload directory, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::info!(dir = %root.display(), "upload directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a fresh `<unix millis><.ext>` name and return that name.
    ///
    /// Files are created exclusively, so two uploads landing in the same
    /// millisecond get `-1`, `-2`, ... suffixes instead of overwriting each other.
    pub async fn save(&self, data: &[u8], original_name: &str) -> io::Result<String> {
        let extension = extension_of(original_name);
        let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = if attempt == 0 {
                format!("{stamp}{extension}")
            } else {
                format!("{stamp}-{attempt}{extension}")
            };

            let path = self.root.join(&filename);
            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match opened {
                Ok(file) => {
                    write_or_discard(file, &path, data).await?;
                    tracing::debug!(%filename, bytes = data.len(), "stored upload");
                    return Ok(filename);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free upload name for timestamp {stamp}"),
        ))
    }

    /// On-disk path for a served filename, or `None` if the name could step
    /// outside the upload directory.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let is_plain = !filename.is_empty()
            && filename.len() <= MAX_NAME_BYTES
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\', '\0']);
        is_plain.then(|| self.root.join(filename))
    }

    /// Public path a stored file is reachable at.
    pub fn served_path(filename: &str) -> String {
        format!("{UPLOADS_ROUTE}/{filename}")
    }
}

/// Write all of `data`, removing `path` if the write does not complete so a
/// truncated file is never served.
async fn write_or_discard<W>(mut file: W, path: &Path, data: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(data).await {
        Ok(()) => file.flush().await,
        Err(err) => Err(err),
    };
    drop(file);

    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(path).await {
            tracing::warn!(
                path = %path.display(),
                error = %cleanup,
                "failed to remove partial upload"
            );
        }
        return Err(err);
    }
    Ok(())
}

/// `.ext` of the client's filename, dropped unless plain ASCII alphanumerics.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
