//! Deterministic tar.gz serialization of a build root.
//!
//! Two invocations over byte-identical trees with the same timestamp must
//! produce byte-identical archives. Three things make that hold:
//!
//! - entries are written in sorted relative-path order, never in
//!   directory-iteration order
//! - every header carries the configured source date epoch instead of the
//!   on-disk mtime, with uid/gid zeroed
//! - the gzip stream uses a fixed compression level and a zero header
//!   timestamp

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Serializer configuration for layer archives.
#[derive(Debug, Clone)]
pub struct ArchiveContext {
    source_date_epoch: u64,
}

impl ArchiveContext {
    /// Create a serializer stamping every entry with `source_date_epoch`.
    pub fn new(source_date_epoch: u64) -> Self {
        Self { source_date_epoch }
    }

    /// Serialize the whole `src_dir` tree into `out` as a
    /// gzip-compressed tar stream.
    ///
    /// Handles regular files, directories, and symlinks. Anything else
    /// (sockets, fifos, devices) is an error: those cannot appear in an
    /// image layer.
    pub fn write_archive<W: Write>(&self, out: W, src_dir: &Path) -> Result<()> {
        if !src_dir.is_dir() {
            bail!("build root is not a directory: {}", src_dir.display());
        }

        let encoder = GzEncoder::new(out, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for path in sorted_entries(src_dir)? {
            let rel = path
                .strip_prefix(src_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();

            self.append_entry(&mut builder, &path, &rel)
                .with_context(|| format!("archiving {}", path.display()))?;
        }

        let encoder = builder
            .into_inner()
            .context("finalizing tar stream")?;
        encoder.finish().context("finalizing gzip stream")?;
        Ok(())
    }

    fn append_entry<W: Write>(
        &self,
        builder: &mut tar::Builder<W>,
        path: &Path,
        rel: &str,
    ) -> Result<()> {
        let md = fs::symlink_metadata(path)?;
        let mut header = tar::Header::new_gnu();
        header.set_mtime(self.source_date_epoch);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(unix_mode(&md));

        let file_type = md.file_type();
        if file_type.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            builder.append_data(&mut header, rel, std::io::empty())?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_link_name(&target)?;
            header.set_cksum();
            builder.append_data(&mut header, rel, std::io::empty())?;
        } else if file_type.is_file() {
            let mut f = File::open(path)?;
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(md.len());
            header.set_cksum();
            builder.append_data(&mut header, rel, &mut f)?;
        } else {
            bail!("unsupported file type in build root: {}", path.display());
        }

        Ok(())
    }
}

/// Everything under `root` (excluding the root itself), sorted by
/// relative path so archive entry order is stable.
fn sorted_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.path() == root {
            continue;
        }
        entries.push(entry.into_path());
    }

    entries.sort_by(|a, b| {
        let ra = a.strip_prefix(root).unwrap_or(a);
        let rb = b.strip_prefix(root).unwrap_or(b);
        ra.cmp(rb)
    });
    Ok(entries)
}

#[cfg(unix)]
fn unix_mode(md: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(md: &fs::Metadata) -> u32 {
    if md.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("etc/apk")).unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("etc/hostname"), "layer-test\n").unwrap();
        fs::write(root.join("usr/bin/sh"), "#!/bin/sh\n").unwrap();
        std::os::unix::fs::symlink("sh", root.join("usr/bin/ash")).unwrap();
    }

    fn archive_bytes(root: &Path, epoch: u64) -> Vec<u8> {
        let mut out = Vec::new();
        ArchiveContext::new(epoch)
            .write_archive(&mut out, root)
            .unwrap();
        out
    }

    #[test]
    fn test_archive_is_reproducible() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        let first = archive_bytes(temp.path(), 1700000000);
        let second = archive_bytes(temp.path(), 1700000000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_epoch_changes_output() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        let a = archive_bytes(temp.path(), 0);
        let b = archive_bytes(temp.path(), 1700000000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_entries_carry_epoch_not_mtime() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        let bytes = archive_bytes(temp.path(), 1234567890);
        let mut archive = tar::Archive::new(GzDecoder::new(&bytes[..]));
        let mut seen = 0;
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().mtime().unwrap(), 1234567890);
            assert_eq!(entry.header().uid().unwrap(), 0);
            assert_eq!(entry.header().gid().unwrap(), 0);
            seen += 1;
        }
        // etc, etc/apk, etc/hostname, usr, usr/bin, usr/bin/ash, usr/bin/sh
        assert_eq!(seen, 7);
    }

    #[test]
    fn test_symlink_preserved() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        let bytes = archive_bytes(temp.path(), 0);
        let mut archive = tar::Archive::new(GzDecoder::new(&bytes[..]));
        let link = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| e.path().unwrap().to_string_lossy() == "usr/bin/ash")
            .expect("symlink entry present");
        assert_eq!(link.header().entry_type(), tar::EntryType::Symlink);
        assert_eq!(
            link.link_name().unwrap().unwrap().to_string_lossy(),
            "sh"
        );
    }

    #[test]
    fn test_missing_source_dir() {
        let mut out = Vec::new();
        let result =
            ArchiveContext::new(0).write_archive(&mut out, Path::new("/nonexistent_root_91287"));
        assert!(result.is_err());
    }
}
