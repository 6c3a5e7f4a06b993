//! Persisted credential store.
//!
//! Users live in a plain text file, one `(<id>, <password>)` record per
//! line. The whole file is loaded once at startup and rewritten after every
//! registration. Neither field may contain whitespace, so the `", "`
//! separator is unambiguous.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credential store {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write credential store {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed record on line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

/// Identifier to password mapping backed by a file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    users: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Creates an empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            users: BTreeMap::new(),
        }
    }

    /// Loads the store at `path`.
    ///
    /// A missing file is an empty store. Blank lines are skipped; any other
    /// line that is not a well-formed record fails the whole load.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::new(path));
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let mut users = BTreeMap::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (id, password) = parse_record(line).ok_or_else(|| StoreError::Malformed {
                line: index + 1,
                content: line.to_string(),
            })?;
            users.insert(id.to_string(), password.to_string());
        }

        Ok(Self { path, users })
    }

    /// Rewrites the backing file from the in-memory mapping.
    ///
    /// Records go to a sibling temp file first which is then renamed over the
    /// target, so readers never observe a half-written store.
    pub async fn save(&self) -> Result<(), StoreError> {
        let contents: String = self
            .users
            .iter()
            .map(|(id, password)| format_record(id, password))
            .collect();

        let staging = staging_path(&self.path);
        let write_error = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        fs::write(&staging, contents).await.map_err(write_error)?;
        if let Err(source) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(write_error(source));
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    /// Returns true when `id` exists and its password matches exactly.
    pub fn verify(&self, id: &str, password: &str) -> bool {
        self.users.get(id).is_some_and(|stored| stored == password)
    }

    /// Adds a user. Returns false, leaving the store untouched, if the id is
    /// already taken.
    pub fn insert(&mut self, id: String, password: String) -> bool {
        if self.users.contains_key(&id) {
            return false;
        }
        self.users.insert(id, password);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        self.users.remove(id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &BTreeMap<String, String> {
        &self.users
    }
}

fn parse_record(line: &str) -> Option<(&str, &str)> {
    let inner = line.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (id, password) = inner.split_once(", ")?;
    let well_formed = |field: &str| !field.is_empty() && !field.contains(char::is_whitespace);
    (well_formed(id) && well_formed(password)).then_some((id, password))
}

fn format_record(id: &str, password: &str) -> String {
    format!("({id}, {password})\n")
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
