//! SBOM generation for layer archives.
//!
//! Correlates the layer's content digest, the optional image tag, the
//! target architecture, and the installed packages into one document per
//! requested output format. Generation is all-or-nothing: the first
//! failing renderer aborts the run and no partial set is reported as
//! success.

pub mod cyclonedx;
pub mod spdx;

use crate::apk::{self, Package};
use crate::arch::Arch;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

/// Supported SBOM output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomFormat {
    Spdx,
    CycloneDx,
}

impl SbomFormat {
    /// File extension for documents in this format.
    pub fn extension(self) -> &'static str {
        match self {
            SbomFormat::Spdx => "spdx.json",
            SbomFormat::CycloneDx => "cdx.json",
        }
    }
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbomFormat::Spdx => f.write_str("spdx"),
            SbomFormat::CycloneDx => f.write_str("cyclonedx"),
        }
    }
}

impl FromStr for SbomFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spdx" => Ok(SbomFormat::Spdx),
            "cyclonedx" => Ok(SbomFormat::CycloneDx),
            other => bail!("unknown SBOM format: {}", other),
        }
    }
}

/// Identity of the image a SBOM describes.
///
/// `tag` and `name` are set only when the build supplied at least one
/// tag; `arch` and `digest` are always set before generation.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub arch: Arch,
    pub digest: String,
}

/// Everything a generation run needs, assembled by the caller.
#[derive(Debug, Clone)]
pub struct SbomOptions {
    pub image_info: ImageInfo,
    pub output_dir: PathBuf,
    pub formats: Vec<SbomFormat>,
    pub packages: Vec<Package>,
    /// Timestamp recorded as the document creation time, so identical
    /// inputs produce identical documents.
    pub source_date_epoch: u64,
}

/// SBOM generator scoped to one build root.
pub struct Sbom {
    pub options: SbomOptions,
    work_dir: PathBuf,
}

impl Sbom {
    /// Create a generator for a build root and target architecture.
    pub fn with_work_dir(work_dir: &Path, arch: Arch) -> Sbom {
        Sbom {
            options: SbomOptions {
                image_info: ImageInfo {
                    tag: None,
                    name: None,
                    arch,
                    digest: String::new(),
                },
                output_dir: work_dir.to_path_buf(),
                formats: Vec::new(),
                packages: Vec::new(),
                source_date_epoch: 0,
            },
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Read the ordered package list from the build root's installed
    /// database.
    pub fn read_package_index(&self) -> Result<Vec<Package>> {
        apk::read_installed(&self.work_dir)
    }

    /// Write one document per requested format into the output directory.
    ///
    /// Returns the written paths.
    pub fn generate(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!(
                "creating SBOM output directory {}",
                self.options.output_dir.display()
            )
        })?;

        let mut written = Vec::with_capacity(self.options.formats.len());
        for format in &self.options.formats {
            let path = self.options.output_dir.join(format!(
                "sbom-{}.{}",
                self.options.image_info.arch,
                format.extension()
            ));

            let bytes = match format {
                SbomFormat::Spdx => spdx::render(&self.options)?,
                SbomFormat::CycloneDx => cyclonedx::render(&self.options)?,
            };

            fs::write(&path, bytes)
                .with_context(|| format!("writing SBOM {}", path.display()))?;
            info!("wrote {} SBOM to {}", format, path.display());
            written.push(path);
        }

        Ok(written)
    }
}

/// RFC3339 creation timestamp derived from the reproducibility epoch.
pub(crate) fn created_at(epoch: u64) -> Result<String> {
    let epoch = i64::try_from(epoch).context("source date epoch out of range")?;
    OffsetDateTime::from_unix_timestamp(epoch)
        .context("source date epoch out of range")?
        .format(&Rfc3339)
        .context("formatting SBOM creation timestamp")
}
