use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;

/// A directory of log files, matched by extension.
pub struct FolderSource {
    pub path: PathBuf,
    pub extension: String,
}

impl FolderSource {
    pub fn new(path: impl AsRef<Path>, extension: impl Into<String>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(SourceError::MissingDirectory(path.to_path_buf()));
        }
        let path = std::fs::canonicalize(path)?;
        let extension = extension.into().trim_start_matches('.').to_string();
        Ok(Self { path, extension })
    }

    /// File names in the directory that carry our extension, sorted so runs are repeatable.
    /// Subdirectories are not descended into.
    pub fn keys(&self) -> Result<Vec<String>, SourceError> {
        let suffix = format!(".{}", self.extension);
        let mut keys = vec![];
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(&suffix) {
                keys.push(name);
            }
        }
        keys.sort();
        debug!("found {} log files in {:?}", keys.len(), self.path);
        Ok(keys)
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, SourceError> {
        self.assert_valid_path(key)?;
        Ok(self.path.join(key))
    }

    pub fn assert_valid_path(&self, key: &str) -> Result<(), SourceError> {
        if !self.keys()?.into_iter().any(|k| k == key) {
            return Err(SourceError::UnknownKey(key.to_string()));
        }
        Ok(())
    }
}
