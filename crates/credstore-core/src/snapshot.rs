use std::fmt;

use indexmap::{map::Entry, IndexMap};

use crate::{
    entry::{validate_alias, CredentialEntry},
    error::CredentialError,
};

/// In-memory alias → entry map for one store, plus an unflushed-changes flag.
///
/// Iteration follows insertion order; deleting an alias keeps the relative
/// order of the remaining ones.
#[derive(Default)]
pub struct KeyStoreSnapshot {
    entries: IndexMap<String, CredentialEntry>,
    dirty: bool,
}

impl KeyStoreSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot freshly loaded from storage (clean).
    pub fn from_entries(entries: IndexMap<String, CredentialEntry>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, alias: &str) -> Option<&CredentialEntry> {
        self.entries.get(alias)
    }

    /// Insert a new entry; never overwrites. `provider` names the owner in errors.
    pub fn put(
        &mut self,
        alias: &str,
        secret: &[u8],
        provider: &str,
    ) -> Result<&CredentialEntry, CredentialError> {
        validate_alias(alias)?;
        match self.entries.entry(alias.to_string()) {
            Entry::Occupied(_) => Err(CredentialError::DuplicateAlias {
                alias: alias.to_string(),
                provider: provider.to_string(),
            }),
            Entry::Vacant(slot) => {
                self.dirty = true;
                Ok(slot.insert(CredentialEntry::new(alias, secret)))
            }
        }
    }

    pub fn delete(&mut self, alias: &str, provider: &str) -> Result<(), CredentialError> {
        match self.entries.shift_remove(alias) {
            Some(_) => {
                self.dirty = true;
                Ok(())
            }
            None => Err(CredentialError::NotFound {
                alias: alias.to_string(),
                provider: provider.to_string(),
            }),
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CredentialEntry> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called once the current contents are durably stored.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl fmt::Debug for KeyStoreSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStoreSnapshot")
            .field("aliases", &self.entries.keys().collect::<Vec<_>>())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "memory://test";

    #[test]
    fn put_marks_dirty_and_keeps_order() {
        let mut snapshot = KeyStoreSnapshot::new();
        assert!(!snapshot.is_dirty());

        snapshot.put("b", b"2", OWNER).expect("put b");
        snapshot.put("a", b"1", OWNER).expect("put a");
        snapshot.put("c", b"3", OWNER).expect("put c");

        assert!(snapshot.is_dirty());
        assert_eq!(snapshot.aliases().collect::<Vec<_>>(), ["b", "a", "c"]);

        snapshot.delete("a", OWNER).expect("delete a");
        assert_eq!(snapshot.aliases().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn duplicate_put_keeps_original_value() {
        let mut snapshot = KeyStoreSnapshot::new();
        snapshot.put("db.password", b"first", OWNER).expect("put");
        snapshot.mark_clean();

        let err = snapshot
            .put("db.password", b"second", OWNER)
            .expect_err("duplicate should fail");
        assert!(matches!(err, CredentialError::DuplicateAlias { .. }));
        assert_eq!(
            snapshot.get("db.password").expect("still present").secret(),
            b"first"
        );
        assert!(!snapshot.is_dirty(), "failed put must not dirty the snapshot");
    }

    #[test]
    fn delete_missing_alias_fails() {
        let mut snapshot = KeyStoreSnapshot::new();
        let err = snapshot.delete("nope", OWNER).expect_err("missing alias");
        assert!(matches!(err, CredentialError::NotFound { .. }));
        assert!(!snapshot.is_dirty());
    }

    #[test]
    fn aliases_are_case_sensitive() {
        let mut snapshot = KeyStoreSnapshot::new();
        snapshot.put("Token", b"x", OWNER).expect("put Token");
        snapshot.put("token", b"y", OWNER).expect("put token");
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut snapshot = KeyStoreSnapshot::new();
        snapshot.put("api", b"hunter2", OWNER).expect("put");
        let rendered = format!("{snapshot:?}");
        assert!(rendered.contains("api"));
        assert!(!rendered.contains("hunter2"));
    }
}
