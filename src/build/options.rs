//! Per-build configuration shared by the three build stages.

use crate::arch::Arch;
use crate::sbom::SbomFormat;
use std::path::{Path, PathBuf};

/// Configuration for one build invocation.
///
/// Constructed once by the caller and passed by reference through the
/// stages. Only [`build_layer`](crate::build::build_layer) mutates it: the
/// resolved archive path is written back once the layer exists, so the
/// provenance stage sees the final location whether the path was
/// caller-supplied or generated.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Prepared build root to archive.
    pub work_dir: PathBuf,
    /// Output archive path. Empty means "allocate a temp path".
    pub tarball_path: PathBuf,
    /// Target architecture of the image.
    pub arch: Arch,
    /// Route execution through proot (and qemu for foreign
    /// architectures).
    pub use_proot: bool,
    /// Fixed timestamp applied to every archive entry and to SBOM
    /// creation times.
    pub source_date_epoch: u64,
    /// Tags requested for the final image. Only the first contributes to
    /// SBOM identity.
    pub tags: Vec<String>,
    /// SBOM formats to emit. Empty skips SBOM generation entirely.
    pub sbom_formats: Vec<SbomFormat>,
    /// Directory receiving generated SBOM documents. Must be set when
    /// `sbom_formats` is non-empty.
    pub sbom_dir: PathBuf,
}

impl BuildOptions {
    /// Minimal options for a build root and target architecture.
    pub fn new(work_dir: &Path, arch: Arch) -> BuildOptions {
        BuildOptions {
            work_dir: work_dir.to_path_buf(),
            tarball_path: PathBuf::new(),
            arch,
            use_proot: false,
            source_date_epoch: 0,
            tags: Vec::new(),
            sbom_formats: Vec::new(),
            sbom_dir: PathBuf::new(),
        }
    }
}
