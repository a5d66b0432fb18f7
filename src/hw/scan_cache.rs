use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use super::model::MacAddress;
use crate::error::ScanCacheError;

const CACHE_FILE_NAME: &str = "scan-cache.tsv";
const SWITCHBOT_FLAG: &str = "switchbot";
const OTHER_FLAG: &str = "other";

/// Persistent MAC to is-Switchbot classifications produced by scans.
#[derive(Debug, Default)]
pub struct ScanCache {
    path: PathBuf,
    entries: HashMap<MacAddress, bool>,
}

impl ScanCache {
    /// Loads the cache from `path`, or from the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ScanCacheError> {
        let path = path.map_or_else(default_cache_path, Path::to_path_buf);
        Self::load_from_path(path)
    }

    /// Loads the cache from an explicit path. A missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ScanCacheError> {
        let entries = if path.exists() {
            parse_entries(&fs::read_to_string(&path)?)?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "loaded scan cache");
        Ok(Self { path, entries })
    }

    /// Returns the cached classifications.
    #[must_use]
    pub fn known(&self) -> &HashMap<MacAddress, bool> {
        &self.entries
    }

    /// Records classifications, replacing earlier ones for the same address.
    pub fn extend(&mut self, classifications: impl IntoIterator<Item = (MacAddress, bool)>) {
        self.entries.extend(classifications);
    }

    /// Writes the cache back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be written.
    pub fn save(&self) -> Result<(), ScanCacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut rows = self.entries.iter().collect::<Vec<_>>();
        rows.sort_by_key(|(mac, _)| **mac);
        let serialised = rows
            .into_iter()
            .map(|(mac, is_switchbot)| {
                let flag = if *is_switchbot { SWITCHBOT_FLAG } else { OTHER_FLAG };
                format!("{mac}\t{flag}\n")
            })
            .collect::<String>();

        fs::write(&self.path, serialised)?;
        Ok(())
    }
}

fn parse_entries(contents: &str) -> Result<HashMap<MacAddress, bool>, ScanCacheError> {
    let mut entries = HashMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = || ScanCacheError::InvalidRecord {
            record: line.to_string(),
        };
        let mut fields = line.split('\t');
        let (Some(mac), Some(flag), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(invalid());
        };
        let mac = MacAddress::parse(mac).map_err(|_error| invalid())?;
        let is_switchbot = match flag {
            SWITCHBOT_FLAG => true,
            OTHER_FLAG => false,
            _ => return Err(invalid()),
        };

        entries.insert(mac, is_switchbot);
    }

    Ok(entries)
}

fn default_cache_path() -> PathBuf {
    let Some(project_dirs) = ProjectDirs::from("", "", "switchbot") else {
        return std::env::temp_dir().join("switchbot").join(CACHE_FILE_NAME);
    };
    project_dirs.data_local_dir().join(CACHE_FILE_NAME)
}
