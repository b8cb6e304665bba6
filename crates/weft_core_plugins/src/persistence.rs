//! Versioned, file-backed data stores.
//!
//! This module provides:
//!
//! - [`DataStore`] - a mod's persistent state, with an identifier, a schema
//!   version and a default payload.
//! - [`DataStores`] - service that locates, loads and saves stores.
//! - [`StoreHandle`] - one loaded store; writes happen only on
//!   [`StoreHandle::save`].
//! - [`PersistencePlugin`] - configures where stores live.
//!
//! A store lives at `<root>/<Mod>/[<slot>/]<identifier>.json` as
//! `{ "version": N, "data": ... }`. Loading never fails: a missing,
//! outdated or malformed file yields the default payload, with a record in
//! the owner's log files saying why.
//!
//! # Derive Macro
//!
//! ```
//! # use serde::{Serialize, Deserialize};
//! use weft_core_plugins::persistence::DataStore;
//!
//! #[derive(Default, Serialize, Deserialize, DataStore)]
//! #[data_store(id = "relationship_notes", version = 2)]
//! struct RelationshipNotes {
//!     notes: Vec<String>,
//! }
//!
//! assert_eq!(RelationshipNotes::identifier(), "relationship_notes");
//! assert_eq!(RelationshipNotes::version(), 2);
//! ```

use core::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use weft_log::Logs;
use weft_system::identity::ModIdentity;
use weft_system::plugin::Plugin;
use weft_system::server::Server;
use weft_system::service::{Service, Services};

pub use data_store_macros::DataStore;

/// A mod's persistent state.
///
/// Can be derived via `#[derive(DataStore)]` for types implementing
/// [`Default`]; implement it by hand to provide [`DataStore::migrate`].
pub trait DataStore: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier; also the file name. Unique within a mod.
    fn identifier() -> &'static str;

    /// Schema version written next to the data. Defaults to `1`.
    fn version() -> u32 {
        1
    }

    /// Payload used when nothing usable is stored.
    fn default_payload() -> Self;

    /// Upgrades data stored under another schema version.
    ///
    /// Returning `None` (the default) discards the stored data in favor of
    /// [`DataStore::default_payload`].
    fn migrate(from_version: u32, data: Value) -> Option<Self> {
        let _ = (from_version, data);
        None
    }
}

/// Error type for data store paths and writes.
#[derive(Debug, thiserror::Error)]
pub enum DataStoreError {
    /// A mod name, slot or identifier is not a single plain path component.
    #[error("data store '{identifier}' cannot use {field} {value:?} as a path component")]
    InvalidPath {
        /// Store identifier.
        identifier: &'static str,
        /// Which part was rejected: `mod`, `slot` or `identifier`.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The payload could not be serialized.
    #[error("failed to serialize data store '{identifier}': {source}")]
    Serialization {
        /// Store identifier.
        identifier: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The file could not be written.
    #[error("failed to write data store '{identifier}' to {}: {source}", path.display())]
    Io {
        /// Store identifier.
        identifier: &'static str,
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Where data stores live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Directory holding one subdirectory per mod.
    pub root: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("weft").join("data"),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, D> {
    version: u32,
    data: &'a D,
}

/// Locates, loads and saves data stores.
pub struct DataStores {
    config: RwLock<PersistenceConfig>,
    logs: Arc<Logs>,
}

impl Service for DataStores {
    fn create(services: &Services) -> Self {
        Self::new(PersistenceConfig::default(), services.get::<Logs>())
    }
}

impl fmt::Debug for DataStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStores")
            .field("config", &*self.config.read())
            .finish()
    }
}

impl DataStores {
    /// Creates the service, recording load and save problems in `logs`.
    #[must_use]
    pub fn new(config: PersistenceConfig, logs: Arc<Logs>) -> Self {
        Self {
            config: RwLock::new(config),
            logs,
        }
    }

    /// Replaces the configuration for later opens.
    pub fn configure(&self, config: PersistenceConfig) {
        *self.config.write() = config;
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> PersistenceConfig {
        self.config.read().clone()
    }

    /// File backing store `D` of `mod_name`, optionally under a save slot.
    ///
    /// # Errors
    ///
    /// Fails if the mod name, slot or identifier is empty, is `.` or `..`,
    /// or contains a path separator, so a store never lands outside its
    /// mod's directory.
    pub fn path_for<D: DataStore>(
        &self,
        mod_name: &str,
        slot: Option<&str>,
    ) -> Result<PathBuf, DataStoreError> {
        let checked = |field: &'static str, value: &str| {
            if is_plain_component(value) {
                Ok(())
            } else {
                Err(DataStoreError::InvalidPath {
                    identifier: D::identifier(),
                    field,
                    value: value.to_string(),
                })
            }
        };
        checked("mod", mod_name)?;
        checked("identifier", D::identifier())?;

        let mut path = self.config.read().root.join(mod_name);
        if let Some(slot) = slot {
            checked("slot", slot)?;
            path.push(slot);
        }
        path.push(format!("{}.json", D::identifier()));
        Ok(path)
    }

    /// Loads store `D` of `owner`.
    ///
    /// # Errors
    ///
    /// Fails, and records the failure in the owner's exceptions file, if
    /// [`DataStores::path_for`] rejects the slot or identifier. Problems with
    /// the stored file itself never fail; they yield the default payload.
    pub fn open<D: DataStore>(
        &self,
        owner: &Arc<ModIdentity>,
        slot: Option<&str>,
    ) -> Result<StoreHandle<D>, DataStoreError> {
        let path = self.path_for::<D>(owner.name(), slot).inspect_err(|err| {
            self.logs.error(
                owner,
                "Refusing to open data store",
                &[
                    ("store", D::identifier().to_string()),
                    ("reason", err.to_string()),
                ],
            );
        })?;
        let data = self.load::<D>(owner, &path);
        Ok(StoreHandle {
            owner: Arc::clone(owner),
            path,
            data,
            logs: Arc::clone(&self.logs),
        })
    }

    fn load<D: DataStore>(&self, owner: &ModIdentity, path: &Path) -> D {
        let context = |reason: String| {
            vec![
                ("store", D::identifier().to_string()),
                ("path", path.display().to_string()),
                ("reason", reason),
            ]
        };
        let malformed = |reason: String| {
            self.logs.error(
                owner,
                "Malformed data store; using defaults",
                &context(reason),
            );
            D::default_payload()
        };

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    store = D::identifier(),
                    path = %path.display(),
                    "no stored data, using defaults"
                );
                return D::default_payload();
            }
            Err(err) => {
                self.logs.error(
                    owner,
                    "Failed to read data store; using defaults",
                    &context(err.to_string()),
                );
                return D::default_payload();
            }
        };

        let mut document = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(document)) => document,
            Ok(_) => return malformed("not a JSON object".into()),
            Err(err) => return malformed(err.to_string()),
        };

        let version = document.get("version").and_then(Value::as_u64);
        let (Some(version), Some(data)) = (version, document.remove("data")) else {
            return malformed("missing `version` or `data`".into());
        };

        if version == u64::from(D::version()) {
            return serde_json::from_value::<D>(data)
                .unwrap_or_else(|err| malformed(err.to_string()));
        }

        let mismatch = format!("stored version {version}, expected {}", D::version());
        match u32::try_from(version).ok().and_then(|from| D::migrate(from, data)) {
            Some(payload) => {
                tracing::info!(
                    store = D::identifier(),
                    from = version,
                    to = D::version(),
                    "data store migrated"
                );
                payload
            }
            None => {
                tracing::warn!(store = D::identifier(), %mismatch, "data store version mismatch");
                self.logs.advisory(
                    owner,
                    "Data store version mismatch; using defaults",
                    &context(mismatch),
                );
                D::default_payload()
            }
        }
    }
}

fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}

/// A loaded data store.
pub struct StoreHandle<D> {
    owner: Arc<ModIdentity>,
    path: PathBuf,
    data: D,
    logs: Arc<Logs>,
}

impl<D: DataStore + fmt::Debug> fmt::Debug for StoreHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("owner", &self.owner.name())
            .field("path", &self.path)
            .field("data", &self.data)
            .finish()
    }
}

impl<D: DataStore> StoreHandle<D> {
    /// The live payload.
    #[must_use]
    pub fn read(&self) -> &D {
        &self.data
    }

    /// Mutable access to the payload. Changes are kept in memory until
    /// [`StoreHandle::save`].
    pub fn write(&mut self) -> &mut D {
        &mut self.data
    }

    /// Replaces the payload with the default.
    pub fn reset(&mut self) {
        self.data = D::default_payload();
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the payload to disk.
    ///
    /// # Errors
    ///
    /// Returns the failure after recording it in the owner's exceptions
    /// file. Nothing is retried.
    pub fn save(&self) -> Result<(), DataStoreError> {
        let result = self.write_file();
        if let Err(error) = &result {
            self.logs.error(
                &self.owner,
                "Failed to save data store",
                &[
                    ("store", D::identifier().to_string()),
                    ("reason", error.to_string()),
                ],
            );
        }
        result
    }

    fn write_file(&self) -> Result<(), DataStoreError> {
        let text = serde_json::to_string_pretty(&Envelope {
            version: D::version(),
            data: &self.data,
        })
        .map_err(|source| DataStoreError::Serialization {
            identifier: D::identifier(),
            source,
        })?;
        let io_error = |source| DataStoreError::Io {
            identifier: D::identifier(),
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&self.path, text).map_err(io_error)?;
        tracing::debug!(store = D::identifier(), path = %self.path.display(), "data store saved");
        Ok(())
    }

    /// Consumes the handle, returning the payload.
    pub fn into_inner(self) -> D {
        self.data
    }
}

/// Plugin that configures the [`DataStores`] service.
#[derive(Debug, Clone, Default)]
pub struct PersistencePlugin {
    config: PersistenceConfig,
}

impl PersistencePlugin {
    /// Stores data under `root`.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }
}

impl Plugin for PersistencePlugin {
    fn build(&self, server: &mut Server) {
        server.service::<DataStores>().configure(self.config.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use weft_log::LogConfig;

    #[derive(Deserialize)]
    struct RawEnvelope {
        version: u32,
        data: Value,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, DataStore)]
    #[data_store(id = "garden")]
    struct Garden {
        plants: Vec<String>,
    }

    fn stores() -> (tempfile::TempDir, DataStores) {
        let dir = tempfile::tempdir().unwrap();
        let logs = Arc::new(Logs::new(LogConfig {
            directory: dir.path().join("logs"),
            ..LogConfig::default()
        }));
        let stores = DataStores::new(
            PersistenceConfig {
                root: dir.path().join("data"),
            },
            logs,
        );
        (dir, stores)
    }

    #[test]
    fn derived_defaults() {
        assert_eq!(Garden::identifier(), "garden");
        assert_eq!(Garden::version(), 1);
        assert_eq!(Garden::default_payload(), Garden::default());
    }

    #[test]
    fn paths_include_mod_and_slot() {
        let (dir, stores) = stores();
        assert_eq!(
            stores.path_for::<Garden>("Greenhouse", None).unwrap(),
            dir.path().join("data/Greenhouse/garden.json")
        );
        assert_eq!(
            stores.path_for::<Garden>("Greenhouse", Some("slot_3")).unwrap(),
            dir.path().join("data/Greenhouse/slot_3/garden.json")
        );
    }

    #[test]
    fn paths_reject_escaping_components() {
        let (_dir, stores) = stores();
        for slot in ["../other", "..", ".", "", "a/b", "a\\b"] {
            let err = stores.path_for::<Garden>("Greenhouse", Some(slot)).unwrap_err();
            assert!(
                matches!(err, DataStoreError::InvalidPath { field: "slot", .. }),
                "{slot:?}"
            );
        }
        assert!(stores.path_for::<Garden>("../Greenhouse", None).is_err());
        assert!(stores.path_for::<Garden>("Greenhouse", Some("slot..3")).is_ok());
    }

    #[test]
    fn save_writes_versioned_envelope() {
        let (_dir, stores) = stores();
        let owner = ModIdentity::framework();
        let mut handle = stores.open::<Garden>(&owner, None).unwrap();
        handle.write().plants.push("tomato".into());
        handle.save().unwrap();

        let raw: RawEnvelope =
            serde_json::from_str(&fs::read_to_string(handle.path()).unwrap()).unwrap();
        assert_eq!(raw.version, 1);
        assert_eq!(raw.data, serde_json::json!({ "plants": ["tomato"] }));
    }

    #[test]
    fn reset_restores_defaults() {
        let (_dir, stores) = stores();
        let mut handle = stores.open::<Garden>(&ModIdentity::framework(), None).unwrap();
        handle.write().plants.push("basil".into());
        handle.reset();
        assert!(handle.read().plants.is_empty());
    }
}
