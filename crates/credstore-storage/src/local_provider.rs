use std::{
    fmt,
    fs::{self, Permissions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use credstore_core::{
    error::BoxError, CredentialEntry, CredentialError, CredentialProvider, KeyStoreSnapshot,
    ProviderAddress,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::{
    keystore::KeyStoreCodec,
    passphrase::Passphrase,
    variants::{KeyStoreVariant, ProviderConfiguration},
};

/// Credential provider backed by one keystore file on the local filesystem.
///
/// The whole store is loaded at [`open`](Self::open) and kept in memory.
/// `put`/`delete` only change that snapshot; [`flush`](CredentialProvider::flush)
/// writes a complete new file next to the target and renames it into place, so
/// readers see either the old store or the new one, never a partial write.
///
/// There is no cross-process locking: two instances flushing the same file
/// race at the rename and the last one wins.
pub struct LocalKeyStoreProvider {
    address: ProviderAddress,
    path: PathBuf,
    variant: KeyStoreVariant,
    codec: KeyStoreCodec,
    passphrase: Passphrase,
    /// Permissions of the file as found at open; re-applied on every flush.
    permissions: Option<Permissions>,
    snapshot: KeyStoreSnapshot,
}

impl LocalKeyStoreProvider {
    /// Open the store named by `address`, loading it if the file exists.
    #[instrument(skip_all, fields(address = %address))]
    pub fn open(
        address: &ProviderAddress,
        config: ProviderConfiguration,
    ) -> Result<Self, CredentialError> {
        let variant = config.variant();
        if address.scheme() != variant.scheme {
            return Err(CredentialError::UnsupportedScheme {
                scheme: address.scheme().to_string(),
                address: address.to_string(),
            });
        }

        let path = variant.translator().to_local_path(address)?;
        let passphrase = config.resolve_passphrase()?;
        let codec = config.codec();

        let (snapshot, permissions) = match fs::read(&path) {
            Ok(bytes) => {
                let entries =
                    codec
                        .decode(&bytes, &passphrase)
                        .map_err(|e| CredentialError::KeyStoreLoad {
                            path: path.clone(),
                            source: Box::new(e),
                        })?;
                let permissions = fs::metadata(&path).ok().map(|m| m.permissions());
                debug!(entries = entries.len(), "keystore loaded");
                (KeyStoreSnapshot::from_entries(entries), permissions)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("keystore file absent; starting empty");
                (KeyStoreSnapshot::new(), None)
            }
            Err(err) => {
                return Err(CredentialError::KeyStoreLoad {
                    path,
                    source: Box::new(err),
                })
            }
        };

        if passphrase.is_default() {
            warn!(path = %path.display(), "keystore is protected by the default passphrase");
        }

        Ok(Self {
            address: address.clone(),
            path,
            variant,
            codec,
            passphrase,
            permissions,
            snapshot,
        })
    }

    /// Local file backing this provider.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> KeyStoreVariant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Serialize the snapshot into a synced temp file beside the target.
    /// Dropping the returned file removes it without touching the target.
    fn stage(&self) -> Result<NamedTempFile, CredentialError> {
        let bytes = self
            .codec
            .encode(self.snapshot.entries(), &self.passphrase)
            .map_err(|e| self.persistence(e))?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| self.persistence("keystore path has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|e| self.persistence(e))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".credstore-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| self.persistence(e))?;
        staged.write_all(&bytes).map_err(|e| self.persistence(e))?;
        staged.as_file().sync_all().map_err(|e| self.persistence(e))?;
        Ok(staged)
    }

    /// Atomically replace the target with a staged file.
    fn commit(&self, staged: NamedTempFile) -> Result<(), CredentialError> {
        if let Some(permissions) = self.permissions.clone().or_else(default_permissions) {
            staged
                .as_file()
                .set_permissions(permissions)
                .map_err(|e| self.persistence(e))?;
        }
        staged
            .persist(&self.path)
            .map_err(|e| self.persistence(e.error))?;
        Ok(())
    }

    fn persistence(&self, source: impl Into<BoxError>) -> CredentialError {
        CredentialError::Persistence {
            path: self.path.clone(),
            source: source.into(),
        }
    }
}

impl CredentialProvider for LocalKeyStoreProvider {
    fn address(&self) -> &ProviderAddress {
        &self.address
    }

    fn get(&self, alias: &str) -> Result<&CredentialEntry, CredentialError> {
        self.snapshot
            .get(alias)
            .ok_or_else(|| CredentialError::NotFound {
                alias: alias.to_string(),
                provider: self.address.to_string(),
            })
    }

    #[instrument(skip_all, fields(alias, path = %self.path.display()))]
    fn put(&mut self, alias: &str, secret: &[u8]) -> Result<&CredentialEntry, CredentialError> {
        self.snapshot.put(alias, secret, self.address.as_str())
    }

    #[instrument(skip_all, fields(alias, path = %self.path.display()))]
    fn delete(&mut self, alias: &str) -> Result<(), CredentialError> {
        self.snapshot.delete(alias, self.address.as_str())
    }

    fn aliases(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.snapshot.aliases())
    }

    fn is_dirty(&self) -> bool {
        self.snapshot.is_dirty()
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn flush(&mut self) -> Result<(), CredentialError> {
        if !self.snapshot.is_dirty() {
            debug!("keystore unchanged; nothing to flush");
            return Ok(());
        }
        let staged = self.stage()?;
        self.commit(staged)?;
        self.snapshot.mark_clean();
        info!(entries = self.snapshot.len(), "keystore flushed");
        Ok(())
    }
}

impl Drop for LocalKeyStoreProvider {
    fn drop(&mut self) {
        if self.snapshot.is_dirty() {
            warn!(path = %self.path.display(), "keystore provider dropped with unflushed changes");
        }
    }
}

impl fmt::Debug for LocalKeyStoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyStoreProvider")
            .field("address", &self.address.as_str())
            .field("path", &self.path)
            .field("store_type", &self.variant.store_type)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}
