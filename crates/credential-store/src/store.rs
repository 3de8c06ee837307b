//! Filesystem-backed credential store.

use crate::error::StoreError;
use crate::types::CredentialBundle;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// File name of the primary registration-state artifact.
pub const CREDS_FILE: &str = "creds.json";

/// Credential store scoped to a single session directory.
///
/// All writes are write-through: every update lands on disk before the call
/// returns. Individual files are written atomically via temp file + rename.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk until the
    /// first `load` or `persist`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The session directory this store owns.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the persisted bundle, creating the session directory and
    /// returning an empty bundle if nothing has been written yet.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn load(&self) -> Result<CredentialBundle, StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let creds = match fs::read(self.dir.join(CREDS_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No persisted credentials, starting fresh");
                return Ok(CredentialBundle::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let mut keys = BTreeMap::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if name == CREDS_FILE {
                continue;
            }
            let value = serde_json::from_slice(&fs::read(entry.path()).await?)?;
            keys.insert(stem.to_string(), value);
        }

        Ok(CredentialBundle { creds, keys })
    }

    /// Persist the full bundle: `creds.json` plus one file per key artifact.
    #[instrument(skip(self, bundle), fields(dir = %self.dir.display()))]
    pub async fn persist(&self, bundle: &CredentialBundle) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        self.write_atomic(CREDS_FILE, &serde_json::to_vec(&bundle.creds)?)
            .await?;
        for (name, value) in &bundle.keys {
            self.write_atomic(&format!("{name}.json"), &serde_json::to_vec(value)?)
                .await?;
        }

        debug!(key_count = bundle.keys.len(), "Persisted credential bundle");
        Ok(())
    }

    /// Read the raw bytes of a named artifact.
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the session directory and everything in it.
    ///
    /// Idempotent: an already-absent directory is not an error. Other I/O
    /// failures are logged and swallowed so cleanup can never abort a
    /// session teardown.
    pub async fn delete(&self) {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "Removed session state"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Failed to remove session state"),
        }
    }

    async fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}
