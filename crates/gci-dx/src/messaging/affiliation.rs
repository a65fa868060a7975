use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::path::is_truthy;

#[derive(Debug, Clone, Deserialize)]
struct AffiliationRecord {
    affiliation_id: String,
    affiliation_fullname: String,
}

/// Affiliation id to full-name lookup loaded from the curation UI's side file.
#[derive(Debug, Clone, Default)]
pub struct AffiliationRegistry {
    names: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AffiliationError {
    #[error("failed to read affiliation registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid affiliation registry: {0}")]
    Format(#[from] serde_json::Error),
}

impl AffiliationRegistry {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AffiliationError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AffiliationError> {
        let records: Vec<AffiliationRecord> = serde_json::from_reader(reader)?;
        Ok(records
            .into_iter()
            .map(|record| (record.affiliation_id, record.affiliation_fullname))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Full name for an affiliation id taken from a document. Falsy or
    /// unregistered ids yield `None`.
    pub fn name_for(&self, affiliation_id: &Value) -> Option<&str> {
        if !is_truthy(affiliation_id) {
            return None;
        }
        let id = affiliation_id.as_str()?;
        self.names.get(id).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for AffiliationRegistry {
    /// Later duplicates never replace the first registered name.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut names = HashMap::new();
        for (id, name) in iter {
            names.entry(id).or_insert(name);
        }
        Self { names }
    }
}
