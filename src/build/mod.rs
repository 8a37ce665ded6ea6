//! The three-stage layer build pipeline.
//!
//! Stages run in strict sequence, each a blocking call:
//!
//! 1. [`prepare`] - resolve the execution environment, deciding once
//!    whether the target architecture needs qemu emulation
//! 2. [`build_layer`] - serialize the build root into a reproducible
//!    tar.gz layer archive
//! 3. [`generate_sbom`] - record provenance for the produced layer
//!
//! [`BuildOptions`] is shared by reference across the stages; only
//! `build_layer` writes to it (the resolved archive path). Callers that
//! ever parallelize stages must keep that single-writer rule.

pub mod options;

pub use options::BuildOptions;

use crate::arch::Arch;
use crate::archive::ArchiveContext;
use crate::digest::layer_digest;
use crate::exec::{ExecStrategy, Executor};
use crate::image::Reference;
use crate::init::InitContext;
use crate::sbom::Sbom;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Filename prefix for ephemeral layer archives in the system temp dir.
/// Also how [`prepare`] recognizes a stale path from a previous build.
const EPHEMERAL_PREFIX: &str = "layer-builder-";

fn is_ephemeral(path: &Path) -> bool {
    path.starts_with(std::env::temp_dir())
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(EPHEMERAL_PREFIX))
            .unwrap_or(false)
}

/// Resolve the execution environment for the build root.
///
/// Returns the init-system context and the executor, both bound to the
/// working directory. A tarball path left over from a previous ephemeral
/// build is cleared so a fresh temp path gets allocated later.
pub fn prepare(options: &mut BuildOptions) -> Result<(InitContext, Executor)> {
    if is_ephemeral(&options.tarball_path) {
        options.tarball_path = PathBuf::new();
    }

    let host = Arch::host();
    let strategy = resolve_strategy(options.arch, host, options.use_proot);
    if let ExecStrategy::ProotQemu(emulator) = &strategy {
        warn!(
            "{} requires {} (not compatible with host {})",
            options.arch, emulator, host
        );
    }

    let executor =
        Executor::new(&options.work_dir, strategy).context("constructing build root executor")?;

    Ok((InitContext::new(&options.work_dir), executor))
}

/// The one place the native/proot/emulation decision is made.
fn resolve_strategy(target: Arch, host: Arch, use_proot: bool) -> ExecStrategy {
    if !use_proot {
        ExecStrategy::Native
    } else if target.compatible_with(host) {
        ExecStrategy::Proot
    } else {
        ExecStrategy::ProotQemu(target.emulator().to_string())
    }
}

/// Serialize the build root into a single reproducible layer archive.
///
/// An empty `tarball_path` allocates a uniquely-named temp file with the
/// recognizable prefix; a non-empty path is created or truncated. The
/// destination is exclusively locked while being written and released on
/// every exit path. The resolved path is written back into the options
/// before returning.
pub fn build_layer(options: &mut BuildOptions) -> Result<PathBuf> {
    let (outfile, path) = if options.tarball_path.as_os_str().is_empty() {
        let tmp = tempfile::Builder::new()
            .prefix(EPHEMERAL_PREFIX)
            .suffix(".tar.gz")
            .tempfile()
            .context("allocating ephemeral layer archive")?;
        tmp.keep().context("persisting ephemeral layer archive")?
    } else {
        let path = options.tarball_path.clone();
        let file = File::create(&path)
            .with_context(|| format!("creating layer archive {}", path.display()))?;
        (file, path)
    };

    outfile
        .try_lock_exclusive()
        .with_context(|| format!("locking layer archive {}", path.display()))?;

    ArchiveContext::new(options.source_date_epoch)
        .write_archive(&outfile, &options.work_dir)
        .with_context(|| format!("archiving build root {}", options.work_dir.display()))?;

    options.tarball_path = path.clone();
    info!("built image layer tarball as {}", path.display());
    Ok(path)
}

/// Record provenance for the produced layer as SBOM documents.
///
/// A no-op when no formats are requested. When several tags were
/// supplied, only the first contributes to SBOM image identity.
pub fn generate_sbom(options: &BuildOptions) -> Result<()> {
    if options.sbom_formats.is_empty() {
        info!("skipping SBOM generation");
        return Ok(());
    }
    info!("generating SBOM");

    let mut sbom = Sbom::with_work_dir(&options.work_dir, options.arch);

    let digest = layer_digest(&options.tarball_path).with_context(|| {
        format!(
            "computing digest of layer {}",
            options.tarball_path.display()
        )
    })?;

    if let Some(tag) = options.tags.first() {
        let reference =
            Reference::parse(tag).with_context(|| format!("parsing tag {}", tag))?;
        sbom.options.image_info.tag = Some(reference.tag_str().to_string());
        sbom.options.image_info.name = Some(reference.to_string());
    }

    let packages = sbom
        .read_package_index()
        .context("reading installed packages from build root")?;

    sbom.options.image_info.digest = digest;
    sbom.options.output_dir = options.sbom_dir.clone();
    sbom.options.packages = packages;
    sbom.options.formats = options.sbom_formats.clone();
    sbom.options.source_date_epoch = options.source_date_epoch;

    sbom.generate().context("generating SBOMs")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbom::SbomFormat;
    use std::fs;
    use tempfile::TempDir;

    fn build_root(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/os-release"), "ID=test\n").unwrap();
        root
    }

    fn installed_db(root: &Path, stanzas: &str) {
        let db_dir = root.join("lib/apk/db");
        fs::create_dir_all(&db_dir).unwrap();
        fs::write(db_dir.join("installed"), stanzas).unwrap();
    }

    #[test]
    fn test_prepare_clears_stale_ephemeral_path() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);

        let mut options = BuildOptions::new(&root, Arch::host());
        options.tarball_path = std::env::temp_dir().join("layer-builder-stale123.tar.gz");

        prepare(&mut options).unwrap();
        assert_eq!(options.tarball_path, PathBuf::new());
    }

    #[test]
    fn test_prepare_keeps_explicit_path() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);

        let mut options = BuildOptions::new(&root, Arch::host());
        options.tarball_path = PathBuf::from("/builds/layer.tar.gz");

        prepare(&mut options).unwrap();
        assert_eq!(options.tarball_path, PathBuf::from("/builds/layer.tar.gz"));
    }

    #[test]
    fn test_resolve_strategy_native_without_proot() {
        let strategy = resolve_strategy(Arch::Aarch64, Arch::X86_64, false);
        assert_eq!(strategy, ExecStrategy::Native);
    }

    #[test]
    fn test_resolve_strategy_same_arch_never_emulates() {
        let strategy = resolve_strategy(Arch::Aarch64, Arch::Aarch64, true);
        assert_eq!(strategy, ExecStrategy::Proot);
    }

    #[test]
    fn test_resolve_strategy_foreign_arch_emulates() {
        let strategy = resolve_strategy(Arch::S390x, Arch::X86_64, true);
        assert_eq!(
            strategy,
            ExecStrategy::ProotQemu("qemu-s390x".to_string())
        );
    }

    #[test]
    fn test_build_layer_allocates_ephemeral_path() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        let path = build_layer(&mut options).unwrap();

        assert_eq!(options.tarball_path, path);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(EPHEMERAL_PREFIX));
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_build_layer_uses_explicit_path_verbatim() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);
        let dest = temp.path().join("layer.tar.gz");

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.tarball_path = dest.clone();

        let path = build_layer(&mut options).unwrap();
        assert_eq!(path, dest);
        assert_eq!(options.tarball_path, dest);
    }

    #[test]
    fn test_build_layer_is_reproducible() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.source_date_epoch = 1700000000;

        options.tarball_path = temp.path().join("a.tar.gz");
        build_layer(&mut options).unwrap();
        options.tarball_path = temp.path().join("b.tar.gz");
        build_layer(&mut options).unwrap();

        let a = fs::read(temp.path().join("a.tar.gz")).unwrap();
        let b = fs::read(temp.path().join("b.tar.gz")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_layer_missing_work_dir() {
        let temp = TempDir::new().unwrap();
        let mut options = BuildOptions::new(&temp.path().join("does-not-exist"), Arch::X86_64);
        options.tarball_path = temp.path().join("layer.tar.gz");
        assert!(build_layer(&mut options).is_err());
    }

    #[test]
    fn test_generate_sbom_no_formats_is_noop() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);

        // No tarball, no installed db: must still succeed untouched.
        let options = BuildOptions::new(&root, Arch::X86_64);
        generate_sbom(&options).unwrap();
    }

    #[test]
    fn test_generate_sbom_end_to_end_without_tags() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);
        installed_db(
            &root,
            "P:musl\nV:1.2.4-r2\nA:x86_64\nL:MIT\n\nP:busybox\nV:1.36.1-r5\nA:x86_64\n",
        );

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.tarball_path = temp.path().join("layer.tar.gz");
        options.sbom_formats = vec![SbomFormat::CycloneDx];
        options.sbom_dir = temp.path().join("sboms");

        build_layer(&mut options).unwrap();
        generate_sbom(&options).unwrap();

        let entries: Vec<_> = fs::read_dir(&options.sbom_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);

        let raw = fs::read(&entries[0]).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        let components = doc["components"].as_array().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0]["name"], "musl");
        assert_eq!(components[1]["name"], "busybox");
        // No tag was supplied, so no tag-derived identity appears.
        assert!(!String::from_utf8(raw).unwrap().contains("tag"));
        assert_eq!(doc["metadata"]["component"]["name"], "sbom-x86_64");
    }

    #[test]
    fn test_generate_sbom_with_tag() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);
        installed_db(&root, "P:musl\nV:1.2.4-r2\n");

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.tarball_path = temp.path().join("layer.tar.gz");
        options.tags = vec!["alpine:3.18".to_string(), "alpine:edge".to_string()];
        options.sbom_formats = vec![SbomFormat::Spdx];
        options.sbom_dir = temp.path().join("sboms");

        build_layer(&mut options).unwrap();
        generate_sbom(&options).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(
            &fs::read(options.sbom_dir.join("sbom-x86_64.spdx.json")).unwrap(),
        )
        .unwrap();
        // Only the first tag names the image.
        assert_eq!(doc["name"], "alpine:3.18");
    }

    #[test]
    fn test_generate_sbom_bad_tag_is_error() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);
        installed_db(&root, "P:musl\nV:1.2.4-r2\n");

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.tarball_path = temp.path().join("layer.tar.gz");
        options.tags = vec!["Not A Tag".to_string()];
        options.sbom_formats = vec![SbomFormat::Spdx];
        options.sbom_dir = temp.path().join("sboms");

        build_layer(&mut options).unwrap();
        assert!(generate_sbom(&options).is_err());
    }

    #[test]
    fn test_generate_sbom_requires_built_layer() {
        let temp = TempDir::new().unwrap();
        let root = build_root(&temp);
        installed_db(&root, "P:musl\nV:1.2.4-r2\n");

        let mut options = BuildOptions::new(&root, Arch::X86_64);
        options.tarball_path = temp.path().join("never-built.tar.gz");
        options.sbom_formats = vec![SbomFormat::Spdx];
        options.sbom_dir = temp.path().join("sboms");

        assert!(generate_sbom(&options).is_err());
    }
}
