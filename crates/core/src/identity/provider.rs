//! [`IdentityProvider`] contract and the mapping-file implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info, warn};

use super::mapping_file::{AuthorEntry, MappingFile};
use crate::config::IdentityConfig;
use crate::errors::IdentityError;
use crate::models::AuthorId;

/// Resolves the acting author and author display names.
pub trait IdentityProvider: Send + Sync {
    /// The author on whose behalf the current request acts.
    fn current_author(&self) -> Option<AuthorId>;

    /// Display name of an author, if known.
    fn display_name(&self, author: AuthorId) -> Option<String>;
}

/// Identity provider backed by an in-memory author map, optionally loaded
/// from a TOML mapping file.
///
/// Thread-safe: both the author map and the acting author sit behind
/// `RwLock`s so a host can switch actors between requests.
pub struct MappedIdentity {
    authors: RwLock<HashMap<AuthorId, AuthorEntry>>,
    current: RwLock<Option<AuthorId>>,
}

impl MappedIdentity {
    /// Build from explicit entries.
    pub fn new(authors: HashMap<AuthorId, AuthorEntry>, current: Option<AuthorId>) -> Self {
        Self {
            authors: RwLock::new(authors),
            current: RwLock::new(current),
        }
    }

    /// Build from an [`IdentityConfig`], loading the mapping file if one is
    /// configured and present.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        info!("initializing identity provider");

        let authors = match &config.mapping_file {
            Some(path) if path.exists() => MappingFile::load(path)?,
            Some(path) => {
                warn!(path = %path.display(), "mapping file not found, starting with empty map");
                HashMap::new()
            }
            None => {
                debug!("no mapping file configured");
                HashMap::new()
            }
        };

        Ok(Self::new(authors, config.current_author.map(AuthorId)))
    }

    /// Switch the acting author.
    pub fn set_current_author(&self, author: Option<AuthorId>) {
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        debug!(author = ?author.map(|a| a.0), "switching acting author");
        *current = author;
    }

    /// Add or replace an author entry.
    pub fn insert(&self, author: AuthorId, entry: AuthorEntry) {
        self.authors
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(author, entry);
    }
}

impl IdentityProvider for MappedIdentity {
    fn current_author(&self) -> Option<AuthorId> {
        *self.current.read().unwrap_or_else(|p| p.into_inner())
    }

    fn display_name(&self, author: AuthorId) -> Option<String> {
        self.authors
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&author)
            .map(|entry| entry.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> AuthorEntry {
        AuthorEntry { name: name.into() }
    }

    #[test]
    fn test_display_name_lookup() {
        let mut authors = HashMap::new();
        authors.insert(AuthorId(1), entry("admin"));
        let identity = MappedIdentity::new(authors, None);

        assert_eq!(identity.display_name(AuthorId(1)).as_deref(), Some("admin"));
        assert_eq!(identity.display_name(AuthorId(2)), None);

        identity.insert(AuthorId(2), entry("jdoe"));
        assert_eq!(identity.display_name(AuthorId(2)).as_deref(), Some("jdoe"));
    }

    #[test]
    fn test_current_author_switching() {
        let identity = MappedIdentity::new(HashMap::new(), Some(AuthorId(4)));
        assert_eq!(identity.current_author(), Some(AuthorId(4)));

        identity.set_current_author(Some(AuthorId(9)));
        assert_eq!(identity.current_author(), Some(AuthorId(9)));

        identity.set_current_author(None);
        assert_eq!(identity.current_author(), None);
    }

    #[test]
    fn test_from_config_without_file() {
        let config = IdentityConfig {
            mapping_file: Some("/nonexistent/authors.toml".into()),
            current_author: Some(5),
        };
        let identity = MappedIdentity::from_config(&config).unwrap();
        assert_eq!(identity.current_author(), Some(AuthorId(5)));
        assert_eq!(identity.display_name(AuthorId(5)), None);
    }

    #[test]
    fn test_from_config_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.toml");
        std::fs::write(&path, "[authors]\n2 = { name = \"editor\" }\n").unwrap();

        let config = IdentityConfig {
            mapping_file: Some(path),
            current_author: None,
        };
        let identity = MappedIdentity::from_config(&config).unwrap();
        assert_eq!(identity.display_name(AuthorId(2)).as_deref(), Some("editor"));
    }
}
