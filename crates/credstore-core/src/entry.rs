use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CredentialError;

/// A named secret. Secret bytes are wiped when the entry is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialEntry {
    alias: String,
    secret: Vec<u8>,
}

impl CredentialEntry {
    pub fn new(alias: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            alias: alias.into(),
            secret: secret.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("alias", &self.alias)
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .finish()
    }
}

pub(crate) fn validate_alias(alias: &str) -> Result<(), CredentialError> {
    if alias.is_empty() {
        return Err(CredentialError::InvalidAlias {
            reason: "alias must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_secret() {
        let entry = CredentialEntry::new("db.password", b"s3cr3t".to_vec());
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("db.password"));
        assert!(rendered.contains("<6 bytes>"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn empty_alias_is_rejected() {
        let err = validate_alias("").expect_err("empty alias");
        assert!(matches!(err, CredentialError::InvalidAlias { .. }));
        validate_alias(" ").expect("whitespace alias is a valid name");
    }
}
