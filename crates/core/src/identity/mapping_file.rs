//! TOML author mapping file: author ids to display names.
//!
//! The mapping file format:
//!
//! ```toml
//! [authors]
//! 1 = { name = "admin" }
//! 7 = { name = "jdoe" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::IdentityError;
use crate::models::AuthorId;

/// A single author entry in the mapping file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthorEntry {
    /// Name shown in fork titles.
    pub name: String,
}

/// Wrapper around the TOML mapping file structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MappingFileData {
    /// The `[authors]` table mapping author id -> AuthorEntry.
    #[serde(default)]
    pub authors: HashMap<String, AuthorEntry>,
}

/// Loader for the author mapping file.
pub struct MappingFile;

impl MappingFile {
    /// Load the mapping file from disk and return the author map.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<AuthorId, AuthorEntry>, IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading author mapping file");

        if !path.exists() {
            return Err(IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let data: MappingFileData =
            toml::from_str(&contents).map_err(|e| IdentityError::ParseError(e.to_string()))?;

        let mut authors = HashMap::with_capacity(data.authors.len());
        for (key, entry) in data.authors {
            let id: i64 = key.trim().parse().map_err(|_| IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: format!("author key '{}' is not a numeric id", key),
            })?;
            authors.insert(AuthorId(id), entry);
        }

        debug!(count = authors.len(), "loaded author mappings");
        Ok(authors)
    }
}
