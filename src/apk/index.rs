//! Parser for the apk stanza format.
//!
//! `APKINDEX` and the installed database share the same shape: one
//! `K:value` line per field, a blank line between records. Record order is
//! preserved; SBOM package listings depend on it.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::INSTALLED_DB;

/// A single package record from an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub description: String,
    pub license: String,
    pub origin: String,
    pub url: String,
    pub checksum: String,
    pub size: u64,
}

impl Package {
    /// Archive filename for this package.
    pub fn filename(&self) -> String {
        format!("{}-{}.apk", self.name, self.version)
    }
}

/// A parsed package index.
#[derive(Debug, Default)]
pub struct ApkIndex {
    pub packages: Vec<Package>,
}

impl ApkIndex {
    /// Parse stanza-format index content.
    ///
    /// Unknown field keys are ignored. A record without both a name (`P:`)
    /// and a version (`V:`) is a format error.
    pub fn parse<R: BufRead>(reader: R) -> Result<ApkIndex> {
        let mut packages = Vec::new();
        let mut current: Option<Package> = None;
        let mut lineno = 0usize;

        for line in reader.lines() {
            lineno += 1;
            let line = line.context("reading package index")?;
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                if let Some(pkg) = current.take() {
                    packages.push(finish_record(pkg, lineno)?);
                }
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                bail!("malformed index line {}: {:?}", lineno, line);
            };

            let pkg = current.get_or_insert_with(Package::default);
            match key {
                "P" => pkg.name = value.to_string(),
                "V" => pkg.version = value.to_string(),
                "A" => pkg.arch = value.to_string(),
                "T" => pkg.description = value.to_string(),
                "L" => pkg.license = value.to_string(),
                "o" => pkg.origin = value.to_string(),
                "U" => pkg.url = value.to_string(),
                "C" => pkg.checksum = value.to_string(),
                "S" => {
                    pkg.size = value
                        .parse()
                        .with_context(|| format!("invalid package size on line {}", lineno))?;
                }
                _ => {}
            }
        }

        if let Some(pkg) = current.take() {
            packages.push(finish_record(pkg, lineno)?);
        }

        Ok(ApkIndex { packages })
    }
}

fn finish_record(pkg: Package, line: usize) -> Result<Package> {
    if pkg.name.is_empty() || pkg.version.is_empty() {
        bail!(
            "package record ending near line {} is missing P: or V:",
            line
        );
    }
    Ok(pkg)
}

/// Read the installed-package database from a build root.
///
/// Returns the package records in database order.
pub fn read_installed(work_dir: &Path) -> Result<Vec<Package>> {
    let db = work_dir.join(INSTALLED_DB);
    let file =
        File::open(&db).with_context(|| format!("opening package database {}", db.display()))?;
    let index = ApkIndex::parse(BufReader::new(file))
        .with_context(|| format!("parsing package database {}", db.display()))?;
    Ok(index.packages)
}
