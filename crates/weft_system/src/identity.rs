//! Mod attribution.
//!
//! Every log line, captured fault, event handler and injection carries the
//! [`ModIdentity`] of the mod that owns it. Identities are immutable once
//! built and shared as `Arc<ModIdentity>`.

use core::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::service::{Service, Services};

/// Errors produced while building or registering a [`ModIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// A required attribute was empty.
    #[error("mod identity is missing its {field}")]
    MissingField {
        /// Name of the missing attribute.
        field: &'static str,
    },

    /// Another mod already registered under this name with different attributes.
    #[error("a different mod is already registered as '{0}'")]
    Conflict(String),
}

/// Attribution for a mod: display name, author, namespace, on-disk path and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModIdentity {
    name: String,
    author: String,
    namespace: String,
    file_path: PathBuf,
    version: String,
}

impl ModIdentity {
    /// Starts building an identity for the mod called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModIdentityBuilder {
        ModIdentityBuilder {
            name: name.into(),
            ..ModIdentityBuilder::default()
        }
    }

    /// The identity weft itself uses when it registers handlers or logs.
    #[must_use]
    pub fn framework() -> Arc<ModIdentity> {
        Arc::new(Self {
            name: "Weft".into(),
            author: "weft".into(),
            namespace: "weft".into(),
            file_path: PathBuf::from(env!("CARGO_MANIFEST_DIR")),
            version: env!("CARGO_PKG_VERSION").into(),
        })
    }

    /// Display name; also the prefix of the mod's log files.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mod author.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Namespace used for console commands and other dotted identifiers.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Location of the mod on disk.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Mod version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Attribution prefix written in front of log lines and fault records.
    #[must_use]
    pub fn attribution(&self) -> String {
        format!("{} v{} by {}", self.name, self.version, self.author)
    }
}

impl fmt::Display for ModIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`ModIdentity`]. Every attribute is required.
#[derive(Debug, Clone, Default)]
pub struct ModIdentityBuilder {
    name: String,
    author: String,
    namespace: String,
    file_path: PathBuf,
    version: String,
}

impl ModIdentityBuilder {
    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the on-disk location.
    #[must_use]
    pub fn file_path(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Validates that all five attributes are present.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::MissingField`] naming the first empty attribute.
    pub fn build(self) -> Result<ModIdentity, IdentityError> {
        let missing = [
            ("name", self.name.trim().is_empty()),
            ("author", self.author.trim().is_empty()),
            ("namespace", self.namespace.trim().is_empty()),
            ("file path", self.file_path.as_os_str().is_empty()),
            ("version", self.version.trim().is_empty()),
        ]
        .into_iter()
        .find_map(|(field, empty)| empty.then_some(field));

        if let Some(field) = missing {
            return Err(IdentityError::MissingField { field });
        }

        Ok(ModIdentity {
            name: self.name,
            author: self.author,
            namespace: self.namespace,
            file_path: self.file_path,
            version: self.version,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of every loaded mod, in load order.
#[derive(Debug, Default)]
pub struct ModRegistry {
    mods: RwLock<IndexMap<String, Arc<ModIdentity>>>,
}

impl Service for ModRegistry {
    fn create(_: &Services) -> Self {
        Self::default()
    }
}

impl ModRegistry {
    /// Registers a mod and returns its shared identity.
    ///
    /// Registering an identical identity twice returns the existing `Arc`,
    /// since mod code may be re-executed on reload.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Conflict`] if a different identity already uses the name.
    pub fn register(&self, identity: ModIdentity) -> Result<Arc<ModIdentity>, IdentityError> {
        let mut mods = self.mods.write();
        if let Some(existing) = mods.get(identity.name()) {
            if **existing == identity {
                return Ok(Arc::clone(existing));
            }
            return Err(IdentityError::Conflict(identity.name));
        }
        let shared = Arc::new(identity);
        mods.insert(shared.name().to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Looks up a mod by display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ModIdentity>> {
        self.mods.read().get(name).cloned()
    }

    /// Returns every registered mod in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<ModIdentity>> {
        self.mods.read().values().cloned().collect()
    }

    /// Returns the number of registered mods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mods.read().len()
    }

    /// Returns true if no mod is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mods.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, version: &str) -> ModIdentity {
        ModIdentity::builder(name)
            .author("tester")
            .namespace("tests")
            .file_path("Mods/Tests")
            .version(version)
            .build()
            .expect("complete identity")
    }

    #[test]
    fn builder_requires_every_field() {
        let err = ModIdentity::builder("NoAuthor")
            .namespace("ns")
            .file_path("Mods/NoAuthor")
            .version("1")
            .build()
            .unwrap_err();
        assert_eq!(err, IdentityError::MissingField { field: "author" });

        let err = ModIdentity::builder("  ").build().unwrap_err();
        assert_eq!(err, IdentityError::MissingField { field: "name" });
    }

    #[test]
    fn accessors_and_attribution() {
        let id = identity("Tidy", "2.1");
        assert_eq!(id.name(), "Tidy");
        assert_eq!(id.namespace(), "tests");
        assert_eq!(id.file_path(), Path::new("Mods/Tests"));
        assert_eq!(id.attribution(), "Tidy v2.1 by tester");
        assert_eq!(id.to_string(), "Tidy");
    }

    #[test]
    fn register_is_idempotent_for_identical_identity() {
        let registry = ModRegistry::default();
        let first = registry.register(identity("Tidy", "1")).unwrap();
        let second = registry.register(identity("Tidy", "1")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_conflicting_identity() {
        let registry = ModRegistry::default();
        registry.register(identity("Tidy", "1")).unwrap();
        let err = registry.register(identity("Tidy", "2")).unwrap_err();
        assert_eq!(err, IdentityError::Conflict("Tidy".into()));
    }

    #[test]
    fn all_preserves_registration_order() {
        let registry = ModRegistry::default();
        registry.register(identity("B", "1")).unwrap();
        registry.register(identity("A", "1")).unwrap();
        let names: Vec<_> = registry.all().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["B", "A"]);
        assert!(registry.get("A").is_some());
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn framework_identity_is_complete() {
        let weft = ModIdentity::framework();
        assert_eq!(weft.name(), "Weft");
        assert!(!weft.version().is_empty());
    }
}
