//! Identity provider: who is acting, and what their name is.
//!
//! The fork manager resolves the acting author through [`IdentityProvider`]
//! and uses display names to build fork titles. [`MappedIdentity`] is the
//! bundled implementation, backed by a TOML author mapping file.

pub mod mapping_file;
pub mod provider;

pub use mapping_file::{AuthorEntry, MappingFile};
pub use provider::{IdentityProvider, MappedIdentity};
