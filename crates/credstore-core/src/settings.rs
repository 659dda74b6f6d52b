use std::{
    fs,
    path::{Path, PathBuf},
};

use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::{address::ProviderAddress, error::CredentialError};

/// Environment variable consulted for the keystore passphrase unless overridden.
pub const DEFAULT_PASSWORD_ENV: &str = "CREDSTORE_PASSWORD";
/// PBKDF2 rounds used when writing new keystores.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Provider configuration loaded from `~/.config/credstore/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider URIs consulted in order. Entries may also be comma-separated lists.
    pub provider_path: Vec<String>,
    /// File holding the keystore passphrase, used when the environment variable is unset.
    pub password_file: Option<PathBuf>,
    /// Environment variable holding the keystore passphrase.
    pub password_env: String,
    /// Key-derivation rounds for newly written keystores.
    pub kdf_iterations: u32,
    /// OS keyring entry holding the keystore passphrase.
    pub keyring: Option<KeyringSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyringSettings {
    pub service: String,
    pub account: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_path: Vec::new(),
            password_file: None,
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            keyring: None,
        }
    }
}

impl ProviderSettings {
    /// Parse the configured provider path into addresses, skipping blanks.
    pub fn provider_addresses(&self) -> Result<Vec<ProviderAddress>, CredentialError> {
        self.provider_path
            .iter()
            .flat_map(|item| item.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ProviderAddress::parse)
            .collect()
    }
}

/// Load settings from the default path; if missing, return defaults.
pub fn load() -> Result<ProviderSettings, CredentialError> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load settings from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProviderSettings, CredentialError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ProviderSettings::default());
    }
    let contents = fs::read_to_string(path).map_err(settings_err)?;
    if contents.trim().is_empty() {
        return Ok(ProviderSettings::default());
    }
    toml::from_str(&contents).map_err(settings_err)
}

/// Resolve the default settings path (platform aware).
pub fn default_path() -> Result<PathBuf, CredentialError> {
    let base = config_dir().ok_or_else(|| CredentialError::Settings {
        reason: "no config dir available".to_string(),
    })?;
    Ok(base.join("credstore").join("config.toml"))
}

/// Write `settings` to `path` unless a file is already there.
pub fn write_if_missing(
    settings: &ProviderSettings,
    path: impl AsRef<Path>,
) -> Result<PathBuf, CredentialError> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(settings_err)?;
    }
    let body = toml::to_string_pretty(settings).map_err(settings_err)?;
    fs::write(path, body).map_err(settings_err)?;
    Ok(path.to_path_buf())
}

fn settings_err<E: ToString>(err: E) -> CredentialError {
    CredentialError::Settings {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(settings.password_env, DEFAULT_PASSWORD_ENV);
    }

    #[test]
    fn parses_custom_settings() {
        let contents = r#"
            provider_path = ["localbcfks://file/etc/creds.bcfks", "memory://scratch"]
            password_file = "/etc/credstore/pass"
            password_env = "MY_STORE_PASS"
            kdf_iterations = 5000
            [keyring]
            service = "credstore"
            account = "default"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let settings = load_from_path(&path).expect("load");
        assert_eq!(
            settings,
            ProviderSettings {
                provider_path: vec![
                    "localbcfks://file/etc/creds.bcfks".into(),
                    "memory://scratch".into(),
                ],
                password_file: Some(PathBuf::from("/etc/credstore/pass")),
                password_env: "MY_STORE_PASS".into(),
                kdf_iterations: 5000,
                keyring: Some(KeyringSettings {
                    service: "credstore".into(),
                    account: "default".into(),
                }),
            }
        );
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let settings: ProviderSettings =
            toml::from_str("provider_path = [\"memory://a\"]").expect("parse");
        assert_eq!(settings.kdf_iterations, DEFAULT_KDF_ITERATIONS);
        assert_eq!(settings.password_env, DEFAULT_PASSWORD_ENV);
    }

    #[test]
    fn provider_path_accepts_comma_lists() {
        let settings = ProviderSettings {
            provider_path: vec![
                "memory://a, localbcfks://file/tmp/c.bcfks".into(),
                " ".into(),
                "memory://b".into(),
            ],
            ..ProviderSettings::default()
        };
        let addresses = settings.provider_addresses().expect("addresses");
        let schemes: Vec<_> = addresses.iter().map(|a| a.scheme()).collect();
        assert_eq!(schemes, ["memory", "localbcfks", "memory"]);
    }

    #[test]
    fn invalid_toml_is_a_settings_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "provider_path = 7").expect("write");
        let err = load_from_path(&path).expect_err("bad type");
        assert!(matches!(err, CredentialError::Settings { .. }));
    }

    #[test]
    fn write_if_missing_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let settings = ProviderSettings {
            provider_path: vec!["memory://a".into()],
            ..ProviderSettings::default()
        };

        write_if_missing(&settings, &path).expect("write should succeed");
        let other = ProviderSettings::default();
        let second = write_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, settings);
    }
}
