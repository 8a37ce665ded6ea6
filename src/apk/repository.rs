//! Read-only repository views over a parsed package index.
//!
//! The index is constructed once by the caller and only borrowed here; the
//! views never mutate it. A [`RepositoryPackage`]'s back-reference to its
//! repository is likewise borrowed, so package lifetimes can never outlive
//! the index they came from.

use super::{ApkIndex, Package};
use serde::{Deserialize, Serialize};

/// Fixed filename of a repository's package index.
pub const INDEX_FILENAME: &str = "APKINDEX.tar.gz";

/// A named package source identified by a single base URI.
///
/// The URI never carries a trailing slash; `new` enforces that at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub uri: String,
}

impl Repository {
    pub fn new(uri: &str) -> Repository {
        Repository {
            uri: uri.trim_end_matches('/').to_string(),
        }
    }

    /// Join base/release/repo/arch into a repository URI.
    ///
    /// Segments are joined verbatim; callers are responsible for
    /// well-formed inputs.
    pub fn from_components(base: &str, release: &str, repo: &str, arch: &str) -> Repository {
        Repository::new(&format!("{}/{}/{}/{}", base, release, repo, arch))
    }

    /// URI of the package index for this repository.
    pub fn index_uri(&self) -> String {
        format!("{}/{}", self.uri, INDEX_FILENAME)
    }

    /// Whether the repository must be fetched over the network rather
    /// than read from local disk.
    pub fn is_remote(&self) -> bool {
        !self.uri.starts_with('/')
    }

    /// Bind a parsed index to this repository.
    pub fn with_index<'a>(&'a self, index: &'a ApkIndex) -> RepositoryWithIndex<'a> {
        RepositoryWithIndex {
            repository: self,
            index,
        }
    }
}

/// A repository together with its parsed package index.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryWithIndex<'a> {
    repository: &'a Repository,
    index: &'a ApkIndex,
}

impl<'a> RepositoryWithIndex<'a> {
    pub fn repository(&self) -> &'a Repository {
        self.repository
    }

    /// The packages in this repository, in index order.
    pub fn packages(&self) -> Vec<RepositoryPackage<'a>> {
        self.index
            .packages
            .iter()
            .map(|package| RepositoryPackage {
                package,
                repository: *self,
            })
            .collect()
    }

    /// Number of packages available in this repository.
    pub fn count(&self) -> usize {
        self.index.packages.len()
    }

    /// Short display name: the last two URI segments (`repo/arch`).
    pub fn repo_abbr(&self) -> String {
        let parts: Vec<&str> = self.repository.uri.split('/').collect();
        parts[parts.len().saturating_sub(2)..].join("/")
    }
}

/// A package decorated with the repository it came from.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryPackage<'a> {
    package: &'a Package,
    repository: RepositoryWithIndex<'a>,
}

impl<'a> RepositoryPackage<'a> {
    pub fn new(package: &'a Package, repository: RepositoryWithIndex<'a>) -> Self {
        RepositoryPackage {
            package,
            repository,
        }
    }

    pub fn package(&self) -> &'a Package {
        self.package
    }

    pub fn repository(&self) -> RepositoryWithIndex<'a> {
        self.repository
    }

    /// Download URL for this package within its repository.
    pub fn url(&self) -> String {
        format!("{}/{}", self.repository.repository.uri, self.package.filename())
    }
}
