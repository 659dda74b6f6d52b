use std::{
    env, fmt, fs,
    path::PathBuf,
    sync::Arc,
};

use credstore_core::ProviderSettings;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Passphrase used when nothing else is configured. Stores protected by it are
/// only obfuscated, so using it logs a warning.
pub const DEFAULT_PASSPHRASE: &str = "none";

/// Keystore passphrase. Wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_default(&self) -> bool {
        self.0.as_str() == DEFAULT_PASSPHRASE
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum PassphraseError {
    /// The source has nothing to offer; a chain moves on to the next one.
    #[error("{source_name} is not configured")]
    NotConfigured { source_name: String },
    #[error("failed to read password file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("no passphrase source produced a value")]
    Exhausted,
}

/// Supplies the keystore passphrase (environment, file, OS keychain, or a fixed value).
pub trait PassphraseProvider: Send + Sync {
    /// Short description used in logs.
    fn describe(&self) -> String;

    fn passphrase(&self) -> Result<Passphrase, PassphraseError>;
}

/// Reads the passphrase from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvPassphrase {
    var: String,
}

impl EnvPassphrase {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl PassphraseProvider for EnvPassphrase {
    fn describe(&self) -> String {
        format!("environment variable {}", self.var)
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        match env::var(&self.var) {
            Ok(value) => Ok(Passphrase::new(value)),
            Err(_) => Err(PassphraseError::NotConfigured {
                source_name: self.describe(),
            }),
        }
    }
}

/// Reads the passphrase from a file; trailing line breaks are ignored.
#[derive(Debug, Clone)]
pub struct FilePassphrase {
    path: PathBuf,
}

impl FilePassphrase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PassphraseProvider for FilePassphrase {
    fn describe(&self) -> String {
        format!("password file {}", self.path.display())
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        let contents = Zeroizing::new(fs::read_to_string(&self.path).map_err(|e| {
            PassphraseError::File {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?);
        Ok(Passphrase::new(contents.trim_end_matches(['\r', '\n'])))
    }
}

/// OS keyring-backed passphrase. Uses the `keyring` crate to look up the secret.
pub struct KeyringPassphrase {
    service: String,
    account: String,
}

impl KeyringPassphrase {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

impl PassphraseProvider for KeyringPassphrase {
    fn describe(&self) -> String {
        format!("keyring entry {}/{}", self.service, self.account)
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| PassphraseError::Keyring(e.to_string()))?;
        match entry.get_password() {
            Ok(secret) => Ok(Passphrase::new(secret)),
            Err(keyring::Error::NoEntry) => Err(PassphraseError::NotConfigured {
                source_name: self.describe(),
            }),
            Err(err) => Err(PassphraseError::Keyring(err.to_string())),
        }
    }
}

/// Fixed passphrase for tests and embedding applications.
#[derive(Debug, Clone)]
pub struct StaticPassphrase(Passphrase);

impl StaticPassphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Passphrase::new(value))
    }
}

impl PassphraseProvider for StaticPassphrase {
    fn describe(&self) -> String {
        "static passphrase".to_string()
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        Ok(self.0.clone())
    }
}

/// Last resort: the well-known default passphrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPassphrase;

impl PassphraseProvider for DefaultPassphrase {
    fn describe(&self) -> String {
        "default passphrase".to_string()
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        warn!("no keystore passphrase configured; using the default, stores are not protected");
        Ok(Passphrase::new(DEFAULT_PASSPHRASE))
    }
}

/// Tries each source in order. Unconfigured sources are skipped; any other
/// failure stops the lookup.
#[derive(Clone, Default)]
pub struct ChainedPassphrase {
    sources: Vec<Arc<dyn PassphraseProvider>>,
}

impl ChainedPassphrase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl PassphraseProvider + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Environment variable, then keyring, then password file, then the default.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let mut chain = Self::new().with(EnvPassphrase::new(&settings.password_env));
        if let Some(keyring) = &settings.keyring {
            chain = chain.with(KeyringPassphrase::new(&keyring.service, &keyring.account));
        }
        if let Some(path) = &settings.password_file {
            chain = chain.with(FilePassphrase::new(path));
        }
        chain.with(DefaultPassphrase)
    }
}

impl PassphraseProvider for ChainedPassphrase {
    fn describe(&self) -> String {
        let parts: Vec<_> = self.sources.iter().map(|s| s.describe()).collect();
        format!("chain[{}]", parts.join(", "))
    }

    fn passphrase(&self) -> Result<Passphrase, PassphraseError> {
        for source in &self.sources {
            match source.passphrase() {
                Ok(passphrase) => {
                    debug!(source = %source.describe(), "keystore passphrase resolved");
                    return Ok(passphrase);
                }
                Err(PassphraseError::NotConfigured { source_name }) => {
                    debug!(source = %source_name, "passphrase source skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Err(PassphraseError::Exhausted)
    }
}

impl fmt::Debug for ChainedPassphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let pass = Passphrase::new("hunter2");
        assert_eq!(format!("{pass:?}"), "Passphrase(<redacted>)");
    }

    #[test]
    fn env_source_reads_variable() {
        const VAR: &str = "CREDSTORE_TEST_ENV_SOURCE_4f1c";
        let source = EnvPassphrase::new(VAR);
        assert!(matches!(
            source.passphrase(),
            Err(PassphraseError::NotConfigured { .. })
        ));

        env::set_var(VAR, "from-env");
        let pass = source.passphrase().expect("set variable");
        assert_eq!(pass.as_bytes(), b"from-env");
        env::remove_var(VAR);
    }

    #[test]
    fn file_source_strips_trailing_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pass.txt");
        fs::write(&path, "from-file\n").expect("write");

        let pass = FilePassphrase::new(&path).passphrase().expect("read");
        assert_eq!(pass.as_bytes(), b"from-file");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FilePassphrase::new(dir.path().join("absent"))
            .passphrase()
            .expect_err("missing file");
        assert!(matches!(err, PassphraseError::File { .. }));
    }

    #[test]
    fn chain_skips_unconfigured_sources() {
        let chain = ChainedPassphrase::new()
            .with(EnvPassphrase::new("CREDSTORE_TEST_UNSET_VAR_91ab"))
            .with(StaticPassphrase::new("fallback"));
        let pass = chain.passphrase().expect("fallback");
        assert_eq!(pass.as_bytes(), b"fallback");
    }

    #[test]
    fn chain_stops_on_real_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain = ChainedPassphrase::new()
            .with(FilePassphrase::new(dir.path().join("absent")))
            .with(StaticPassphrase::new("never reached"));
        let err = chain.passphrase().expect_err("file error wins");
        assert!(matches!(err, PassphraseError::File { .. }));
    }

    #[test]
    fn settings_chain_prefers_password_file_over_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pass");
        fs::write(&path, "file-pass").expect("write");
        let settings = ProviderSettings {
            password_env: "CREDSTORE_TEST_SETTINGS_UNSET_77de".into(),
            password_file: Some(path),
            ..ProviderSettings::default()
        };

        let pass = ChainedPassphrase::from_settings(&settings)
            .passphrase()
            .expect("resolve");
        assert_eq!(pass.as_bytes(), b"file-pass");
    }

    #[test]
    fn settings_chain_falls_back_to_default() {
        let settings = ProviderSettings {
            password_env: "CREDSTORE_TEST_SETTINGS_UNSET_e310".into(),
            ..ProviderSettings::default()
        };
        let pass = ChainedPassphrase::from_settings(&settings)
            .passphrase()
            .expect("resolve");
        assert!(pass.is_default());
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let err = ChainedPassphrase::new().passphrase().expect_err("empty");
        assert!(matches!(err, PassphraseError::Exhausted));
    }
}
