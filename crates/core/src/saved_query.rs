use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{default_config_dir, ConfigError};

const DEFAULT_QUERY_VERSION: u8 = 2;

fn default_query_version() -> u8 {
    DEFAULT_QUERY_VERSION
}

/// A saved query as persisted by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedQueryRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_query_version")]
    pub version: u8,
    #[serde(default)]
    pub projects: Vec<u64>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

impl SavedQueryRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: DEFAULT_QUERY_VERSION,
            projects: Vec::new(),
            fields: Vec::new(),
            orderby: None,
            query: String::new(),
            environment: Vec::new(),
            range: None,
            start: None,
            end: None,
            date_created: None,
            date_updated: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub slug: String,
}

impl Organization {
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}

#[must_use]
pub fn find_by_id<'a>(records: &'a [SavedQueryRecord], id: &str) -> Option<&'a SavedQueryRecord> {
    records.iter().find(|record| record.id == id)
}

#[derive(Debug, Error)]
pub enum SavedQueriesError {
    #[error("failed to resolve default saved queries path: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read saved queries file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse saved queries file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize saved queries: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write saved queries file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedQueriesFile {
    #[serde(default)]
    queries: Vec<SavedQueryRecord>,
}

/// Collapses duplicate ids, keeping the last entry, and orders by id.
fn dedup_by_id(records: Vec<SavedQueryRecord>) -> Vec<SavedQueryRecord> {
    records
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}

/// Handle on a TOML file of saved queries. Nothing is cached: every call
/// reads the file, so writes from other processes are never overwritten by
/// a stale copy.
#[derive(Debug, Clone)]
pub struct FileSavedQueriesStore {
    path: PathBuf,
}

impl FileSavedQueriesStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or blank file holds no queries.
    pub fn load(&self) -> Result<Vec<SavedQueryRecord>, SavedQueriesError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| SavedQueriesError::Read {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: SavedQueriesFile =
            toml::from_str(&raw).map_err(|source| SavedQueriesError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(dedup_by_id(file.queries))
    }

    /// Replaces the whole file.
    pub fn save(&self, records: Vec<SavedQueryRecord>) -> Result<(), SavedQueriesError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SavedQueriesError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let file = SavedQueriesFile {
            queries: dedup_by_id(records),
        };
        let rendered = toml::to_string_pretty(&file)
            .map_err(|source| SavedQueriesError::Serialize { source })?;

        // Readers never see a half-written file.
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, rendered).map_err(|source| SavedQueriesError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| SavedQueriesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Re-reads the file, swaps in `update(existing)` for the record with
    /// `id` and writes everything back. Returns `None` without writing when
    /// no such record exists.
    pub fn update_record(
        &self,
        id: &str,
        update: impl FnOnce(&SavedQueryRecord) -> SavedQueryRecord,
    ) -> Result<Option<SavedQueryRecord>, SavedQueriesError> {
        let mut records = self.load()?;
        let Some(slot) = records.iter_mut().find(|record| record.id == id) else {
            return Ok(None);
        };

        let mut updated = update(&*slot);
        updated.id = id.to_string();
        slot.clone_from(&updated);
        self.save(records)?;
        Ok(Some(updated))
    }
}

pub fn default_saved_queries_path() -> Result<PathBuf, SavedQueriesError> {
    Ok(default_config_dir()?.join("saved_queries.toml"))
}
