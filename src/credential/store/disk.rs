/// File-based credential store
use crate::{
    credential::{store::CredentialStore, store::KeyLocks, CredentialKey, Token},
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Distinguishes temp files of concurrent writers within one process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Disk credential store
///
/// One file per key under a base directory. File names are the SHA-256 of
/// the key, so DIDs with `:` or `/` never reach the filesystem.
///
/// Several instances may share a directory. Each write goes through its own
/// temp file and is published with a rename, so the last rename wins and a
/// reader never sees a partial token.
#[derive(Clone)]
pub struct FileCredentialStore {
    base_path: PathBuf,
    locks: KeyLocks,
}

impl FileCredentialStore {
    /// Create the store, making the base directory if needed
    pub async fn open(base_path: PathBuf) -> VaultResult<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            VaultError::Storage(format!(
                "Failed to create credential directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self {
            base_path,
            locks: KeyLocks::new(),
        })
    }

    /// Get the file path for a key
    fn credential_path(&self, key: &CredentialKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.base_path.join(format!("{}.token", hex::encode(digest)))
    }

    /// Temp file private to one write
    fn temp_path(&self, path: &std::path::Path) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("{}.{}.tmp", std::process::id(), seq))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, key: &CredentialKey) -> VaultResult<Option<Token>> {
        let path = self.credential_path(key);

        match fs::read_to_string(&path).await {
            Ok(data) if data.is_empty() => Err(VaultError::Storage(format!(
                "Credential file for {} is empty",
                key
            ))),
            Ok(data) => Ok(Some(Token::new(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::Storage(format!(
                "Failed to read credential for {}: {}",
                key, e
            ))),
        }
    }

    async fn store(&self, key: &CredentialKey, token: &Token) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;
        let path = self.credential_path(key);
        let tmp_path = self.temp_path(&path);

        let written = match fs::write(&tmp_path, token.as_str()).await {
            Ok(()) => fs::rename(&tmp_path, &path).await.map_err(|e| {
                VaultError::Storage(format!("Failed to commit credential for {}: {}", key, e))
            }),
            Err(e) => Err(VaultError::Storage(format!(
                "Failed to write credential for {}: {}",
                key, e
            ))),
        };

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        written
    }

    async fn remove(&self, key: &CredentialKey) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;
        let path = self.credential_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Storage(format!(
                "Failed to delete credential for {}: {}",
                key, e
            ))),
        }
    }
}
