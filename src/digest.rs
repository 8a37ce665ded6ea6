//! Content digest computation for layer archives.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Streaming sha256 of a file. Returns the hex digest and the byte count.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

/// Content digest of a compressed layer archive, in the OCI
/// `sha256:<hex>` form.
///
/// The digest covers the compressed bytes, so it matches the layer digest
/// a registry would record for the uploaded blob. Rejects files that are
/// not gzip streams.
pub fn layer_digest(path: &Path) -> Result<String> {
    let mut magic = [0u8; 2];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .with_context(|| format!("reading layer archive {}", path.display()))?;
    if magic != [0x1f, 0x8b] {
        bail!("{} is not a gzip-compressed archive", path.display());
    }

    let (sha, _size) = sha256_file(path)?;
    Ok(format!("sha256:{}", sha))
}
