use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Oid;

/// Bytes moved per chunk when streaming a blob in or out. Bounds memory use
/// to a small constant regardless of object size, and gives long transfers a
/// natural point to reset any enclosing inactivity deadline between chunks.
const CHUNK_SIZE: usize = 64 * 1024;

/// Content-addressed, filesystem-backed blob store.
///
/// `BlobStore` itself is immutable and safely shared across concurrent
/// requests (`Arc<BlobStore>`); repo scoping is realized as
/// [`BlobStore::scope`], which returns a lightweight, repo-bound handle
/// instead of mutating shared state — the natural Rust shape for "scope
/// subsequent operations" under a request-per-task model where two requests
/// must never share one mutable cursor.
pub struct BlobStore {
    data_root: PathBuf,
    repositories: Vec<String>,
    /// When set, `open_write`'s `commit` recomputes the SHA-256 of the bytes
    /// received and refuses to commit on mismatch. Off by default: OIDs are
    /// trusted as given, and verifying them would mean hashing every byte of
    /// every upload a second time.
    pub verify_digest_on_write: bool,
    /// Mode applied to newly created fan-out directories and the per-repo
    /// `tmp/` directory. Defaults to `0700` (unix only; a no-op elsewhere).
    pub dir_mode: u32,
    /// Mode applied to blob files once committed. Defaults to `0600`.
    pub file_mode: u32,
}

impl BlobStore {
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>, repositories: Vec<String>) -> Self {
        Self {
            data_root: data_root.into(),
            repositories,
            verify_digest_on_write: false,
            dir_mode: 0o700,
            file_mode: 0o600,
        }
    }

    /// Scopes subsequent operations to `repo`. Fails if `repo` is empty or
    /// not present in the configured allowlist — this check runs before any
    /// filesystem access, so an unconfigured or path-traversal-shaped repo
    /// name never reaches `std::fs`.
    pub fn scope<'a>(&'a self, repo: &str) -> Result<RepoBlobStore<'a>> {
        if repo.is_empty() || !self.repositories.iter().any(|r| r == repo) {
            return Err(Error::UnknownRepo(repo.to_string()));
        }
        Ok(RepoBlobStore {
            store: self,
            repo: repo.to_string(),
        })
    }
}

/// A [`BlobStore`] scoped to one repository, as returned by
/// [`BlobStore::scope`]. All paths it computes are namespaced under that
/// repo so OIDs never collide across repositories.
pub struct RepoBlobStore<'a> {
    store: &'a BlobStore,
    repo: String,
}

impl RepoBlobStore<'_> {
    /// `<data_root>/<repo>/<ab>/<cd>/<ef>/<01>/<23>/<64-hex-oid>` — five
    /// nested 2-hex-char directories bounding each directory to 256 entries,
    /// terminal filename is the full OID.
    fn object_path(&self, oid: &Oid) -> PathBuf {
        let [p1, p2, p3, p4, p5] = oid.prefixes();
        self.store
            .data_root
            .join(&self.repo)
            .join(p1)
            .join(p2)
            .join(p3)
            .join(p4)
            .join(p5)
            .join(oid.as_str())
    }

    fn tmp_dir(&self) -> PathBuf {
        self.store.data_root.join(&self.repo).join("tmp")
    }

    /// True iff the blob is present and, when `size` is given, its length
    /// matches exactly. A length mismatch is reported as non-existence
    /// (never an error) so the caller treats it as "must be re-uploaded"
    /// without the store destroying the stale file itself.
    pub async fn exists(&self, oid: &Oid, size: Option<u64>) -> Result<bool> {
        let path = self.object_path(oid);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(match size {
            Some(expected) => metadata.len() == expected,
            None => true,
        })
    }

    /// Opens a streaming write handle. Directories are created eagerly;
    /// bytes land in a per-repo temp area first and only become visible at
    /// the final OID path once [`BlobWriter::commit`] renames them in,
    /// atomically, so concurrent readers never observe a truncated file.
    pub async fn open_write(&self, oid: &Oid) -> Result<BlobWriter> {
        let tmp_dir = self.tmp_dir();
        fs::create_dir_all(&tmp_dir).await?;
        set_mode(&tmp_dir, self.store.dir_mode).await?;
        let temp_path = tmp_dir.join(Uuid::new_v4().to_string());
        let file = File::create(&temp_path).await?;
        set_mode(&temp_path, self.store.file_mode).await?;

        Ok(BlobWriter {
            file,
            temp_path,
            final_path: self.object_path(oid),
            oid: oid.clone(),
            written: 0,
            hasher: self.store.verify_digest_on_write.then(Sha256::new),
            dir_mode: self.store.dir_mode,
            file_mode: self.store.file_mode,
        })
    }

    /// Opens the blob for reading along with its size. `NotFound` if absent.
    pub async fn open_read(&self, oid: &Oid) -> Result<(File, u64)> {
        let path = self.object_path(oid);
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::BlobMissing),
            Err(e) => return Err(Error::Io(e)),
        };
        let size = file.metadata().await?.len();
        Ok((file, size))
    }

    /// Streams the whole blob body to `sink` in bounded-size chunks.
    pub async fn stream_to<W: AsyncWrite + Unpin>(&self, oid: &Oid, sink: &mut W) -> Result<u64> {
        let (mut reader, size) = self.open_read(oid).await?;
        copy_in_chunks(&mut reader, sink).await?;
        Ok(size)
    }
}

/// Applies `mode` to `path`. A no-op on non-unix targets, where the platform
/// default (whatever the deploying process's umask yields) is left as-is.
async fn set_mode(path: &std::path::Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

async fn copy_in_chunks<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// A streaming write handle returned by [`RepoBlobStore::open_write`].
/// Dropping it without calling [`commit`](BlobWriter::commit) leaves an
/// orphaned file under the repo's `tmp/` directory — never a truncated file
/// at the visible OID path, so a client disconnecting mid-upload can never
/// expose partial content to a concurrent reader.
pub struct BlobWriter {
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    oid: Oid,
    written: u64,
    hasher: Option<Sha256>,
    dir_mode: u32,
    file_mode: u32,
}

impl BlobWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(chunk);
        }
        Ok(())
    }

    /// Syncs, renames the temp file into place, and returns the number of
    /// bytes written. When digest verification is enabled and the computed
    /// digest doesn't match the OID the writer was opened for, the temp file
    /// is removed and the commit fails without ever touching the final path.
    pub async fn commit(self) -> Result<u64> {
        if let Some(hasher) = self.hasher {
            let digest = hex::encode(hasher.finalize());
            if digest != self.oid.as_str() {
                let _ = fs::remove_file(&self.temp_path).await;
                return Err(Error::Internal(format!(
                    "digest mismatch: expected {}, computed {digest}",
                    self.oid
                )));
            }
        }

        self.file.sync_all().await?;
        if let Some(parent) = self.final_path.parent() {
            fs::create_dir_all(parent).await?;
            set_mode(parent, self.dir_mode).await?;
        }
        fs::rename(&self.temp_path, &self.final_path).await?;
        set_mode(&self.final_path, self.file_mode).await?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn oid(hex: &str) -> Oid {
        Oid::parse(hex).unwrap()
    }

    fn test_oid() -> Oid {
        oid("a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3")
    }

    async fn store_with(dir: &TempDir, repos: &[&str]) -> BlobStore {
        BlobStore::new(
            dir.path(),
            repos.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn write_then_exists_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p"]).await;
        let scoped = store.scope("org/p").unwrap();
        let id = test_oid();

        let mut writer = scoped.open_write(&id).await.unwrap();
        writer.write_chunk(b"hello ").await.unwrap();
        writer.write_chunk(b"world").await.unwrap();
        let written = writer.commit().await.unwrap();
        assert_eq!(written, 11);

        assert!(scoped.exists(&id, Some(11)).await.unwrap());
        assert!(scoped.exists(&id, None).await.unwrap());

        let (mut reader, size) = scoped.open_read(&id).await.unwrap();
        assert_eq!(size, 11);
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn size_mismatch_reports_non_existence_without_deleting() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p"]).await;
        let scoped = store.scope("org/p").unwrap();
        let id = test_oid();

        let mut writer = scoped.open_write(&id).await.unwrap();
        writer.write_chunk(b"abc").await.unwrap();
        writer.commit().await.unwrap();

        assert!(!scoped.exists(&id, Some(999)).await.unwrap());
        // the stale file is still there, ready to be overwritten
        assert!(scoped.exists(&id, Some(3)).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_repo_is_rejected_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p"]).await;
        assert!(matches!(
            store.scope("../../../etc"),
            Err(Error::UnknownRepo(_))
        ));
        assert!(matches!(store.scope(""), Err(Error::UnknownRepo(_))));
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p"]).await;
        let scoped = store.scope("org/p").unwrap();
        let id = test_oid();
        assert!(!scoped.exists(&id, None).await.unwrap());
        assert!(matches!(scoped.open_read(&id).await, Err(Error::BlobMissing)));
    }

    #[tokio::test]
    async fn dropping_writer_without_commit_leaves_no_final_blob() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p"]).await;
        let scoped = store.scope("org/p").unwrap();
        let id = test_oid();

        {
            let mut writer = scoped.open_write(&id).await.unwrap();
            writer.write_chunk(b"partial").await.unwrap();
            // dropped here without commit
        }

        assert!(!scoped.exists(&id, None).await.unwrap());
    }

    #[tokio::test]
    async fn digest_verification_rejects_mismatched_content() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, &["org/p"]).await;
        store.verify_digest_on_write = true;
        let scoped = store.scope("org/p").unwrap();
        let id = test_oid();

        let mut writer = scoped.open_write(&id).await.unwrap();
        writer.write_chunk(b"not the right content").await.unwrap();
        assert!(writer.commit().await.is_err());
        assert!(!scoped.exists(&id, None).await.unwrap());
    }

    #[tokio::test]
    async fn oids_are_namespaced_per_repo() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["org/p", "org/q"]).await;
        let id = test_oid();

        let p = store.scope("org/p").unwrap();
        let mut writer = p.open_write(&id).await.unwrap();
        writer.write_chunk(b"in p").await.unwrap();
        writer.commit().await.unwrap();

        let q = store.scope("org/q").unwrap();
        assert!(!q.exists(&id, None).await.unwrap());
    }
}
