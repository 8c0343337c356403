//! Per-scenario resource store.
//!
//! [`ResourceStore`] is a small JSON key-value file mapping logical resource
//! names (the topology constants, e.g. `VPC1` or `TGW_ATTACH_VPC2`) to the IDs
//! the provider assigned. Provisioning steps resolve their dependencies
//! through it and teardown walks it to decide what to delete.
//!
//! Each mutation is written through to disk immediately, so an interrupted
//! run still leaves behind everything needed to clean up.
//!
//! # File format
//!
//! ```json
//! {
//!   "SUBNET1_VPC1": { "id": "subnet-0a1b", "region": "us-east-1" },
//!   "VPC1": "vpc-0c2d"
//! }
//! ```
//!
//! A bare string value is an ID in the default region.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::Region;

/// A recorded resource: its provider ID and, when known, its region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredValue", into = "StoredValue")]
pub struct ResourceRecord {
    /// Provider-assigned ID.
    pub id: String,
    /// Region the resource lives in; `None` means the default region.
    pub region: Option<Region>,
}

impl ResourceRecord {
    /// Record for a resource in an explicit region.
    #[must_use]
    pub fn new(id: impl Into<String>, region: Region) -> Self {
        Self {
            id: id.into(),
            region: Some(region),
        }
    }

    /// Record for a resource in the default region.
    #[must_use]
    pub fn in_default_region(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            region: None,
        }
    }

    /// Region of the resource, falling back to `default`.
    #[must_use]
    pub fn region_or<'a>(&'a self, default: &'a Region) -> &'a Region {
        self.region.as_ref().unwrap_or(default)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Bare(String),
    Regional { id: String, region: Region },
}

impl From<StoredValue> for ResourceRecord {
    fn from(value: StoredValue) -> Self {
        match value {
            StoredValue::Bare(id) => Self::in_default_region(id),
            StoredValue::Regional { id, region } => Self::new(id, region),
        }
    }
}

impl From<ResourceRecord> for StoredValue {
    fn from(record: ResourceRecord) -> Self {
        match record.region {
            Some(region) => Self::Regional {
                id: record.id,
                region,
            },
            None => Self::Bare(record.id),
        }
    }
}

/// JSON-file backed map from logical resource name to [`ResourceRecord`].
#[derive(Debug)]
pub struct ResourceStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, ResourceRecord>>,
}

impl ResourceStore {
    /// Open the store for `scenario` inside `dir` (`<dir>/<scenario>.json`).
    pub fn open(dir: impl AsRef<Path>, scenario: &str) -> StateResult<Self> {
        Self::open_file(dir.as_ref().join(format!("{scenario}.json")))
    }

    /// Open the store backed by `path`.
    ///
    /// A missing or blank file yields an empty store; the file is created on
    /// the first write. A file that is not a JSON object of records is an
    /// error rather than being silently reset, so recorded IDs are never lost.
    pub fn open_file(path: impl Into<PathBuf>) -> StateResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StateError::Io { path, source }),
        };

        debug!(path = %path.display(), entries = entries.len(), "opened resource store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the record stored under `name`.
    pub fn get(&self, name: &str) -> StateResult<ResourceRecord> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StateError::MissingKey {
                name: name.to_owned(),
                path: self.path.clone(),
            })
    }

    /// Look up only the provider ID stored under `name`.
    pub fn id(&self, name: &str) -> StateResult<String> {
        self.get(name).map(|record| record.id)
    }

    /// Whether a record exists under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Insert or overwrite the record under `name` and persist.
    pub fn put(&self, name: impl Into<String>, record: ResourceRecord) -> StateResult<()> {
        let mut entries = self.entries.write();
        entries.insert(name.into(), record);
        self.persist(&entries)
    }

    /// Remove the record under `name` and persist. Returns the removed record.
    pub fn remove(&self, name: &str) -> StateResult<Option<ResourceRecord>> {
        let mut entries = self.entries.write();
        let removed = entries.remove(name);
        if removed.is_some() {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Replace the whole content of the store and persist.
    pub fn replace(
        &self,
        records: impl IntoIterator<Item = (String, ResourceRecord)>,
    ) -> StateResult<()> {
        let mut entries = self.entries.write();
        *entries = records.into_iter().collect();
        self.persist(&entries)
    }

    /// Snapshot of all records, sorted by logical name.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, ResourceRecord)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Render the store in its on-disk format.
    pub fn to_json_pretty(&self) -> StateResult<String> {
        serde_json::to_string_pretty(&*self.entries.read()).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source: source.into(),
        })
    }

    /// Atomically rewrite the backing file (temp file + rename).
    fn persist(&self, entries: &BTreeMap<String, ResourceRecord>) -> StateResult<()> {
        let io_err = |source: io::Error| StateError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, entries).map_err(|e| io_err(e.into()))?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "persisted resource store");
        Ok(())
    }
}
