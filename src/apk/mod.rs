//! Installed-package index handling for apk-based build roots.
//!
//! - [`index`] - parser for the stanza format shared by `APKINDEX` and the
//!   installed database
//! - [`repository`] - read-only repository views and package URL
//!   arithmetic

pub mod index;
pub mod repository;

pub use index::{read_installed, ApkIndex, Package};
pub use repository::{Repository, RepositoryPackage, RepositoryWithIndex};

/// Location of the installed-package database inside a build root.
pub const INSTALLED_DB: &str = "lib/apk/db/installed";
