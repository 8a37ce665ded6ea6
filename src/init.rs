//! Init-system layout for the build root.
//!
//! Images produced by this crate use an s6-style supervision tree: each
//! service is a directory under `sv/` holding an executable `run` script.
//! The context only lays files out; it never starts anything.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Init-system layout context bound to one build root.
#[derive(Debug)]
pub struct InitContext {
    work_dir: PathBuf,
}

impl InitContext {
    pub fn new(work_dir: &Path) -> InitContext {
        InitContext {
            work_dir: work_dir.to_path_buf(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Directory holding service definitions inside the build root.
    pub fn services_dir(&self) -> PathBuf {
        self.work_dir.join("sv")
    }

    /// Write an executable run script for a supervised service.
    ///
    /// Creates `sv/<name>/run` wrapping `command` in an exec line.
    pub fn write_service(&self, name: &str, command: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            bail!("invalid service name: {:?}", name);
        }

        let dir = self.services_dir().join(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating service directory {}", dir.display()))?;

        let run = dir.join("run");
        fs::write(&run, format!("#!/bin/sh\nexec {}\n", command))
            .with_context(|| format!("writing service script {}", run.display()))?;
        make_executable(&run)?;

        Ok(run)
    }
}

fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
        .with_context(|| format!("marking {} executable", path.display()))?;
    Ok(())
}
