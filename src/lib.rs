//! Reproducible filesystem layer tarballs and SBOMs for apk-based
//! container images.
//!
//! This crate is the build core of an image-assembly pipeline. Given a
//! build root prepared by an external package-installation stage, it:
//!
//! - **Resolves the execution environment** - decides once whether the
//!   target architecture needs qemu user-mode emulation and hands back
//!   executor and init-system contexts bound to the build root
//! - **Builds the layer** - serializes the build root into a
//!   byte-for-byte reproducible tar.gz archive stamped with a fixed
//!   source date epoch
//! - **Records provenance** - emits SBOM documents keyed to the layer's
//!   content digest, the image tag, and the installed package set
//!
//! Wrapping the layer into an OCI manifest, pushing to a registry, and
//! installing packages into the root are all the caller's concern.
//!
//! # Example
//!
//! ```rust,ignore
//! use layer_builder::arch::Arch;
//! use layer_builder::build::{self, BuildOptions};
//! use layer_builder::sbom::SbomFormat;
//! use std::path::Path;
//!
//! let mut options = BuildOptions::new(Path::new("/work/build-root"), Arch::X86_64);
//! options.source_date_epoch = 1700000000;
//! options.tags = vec!["registry.example.com/app:v1".to_string()];
//! options.sbom_formats = vec![SbomFormat::Spdx];
//! options.sbom_dir = "/work/sboms".into();
//!
//! let (_init, _executor) = build::prepare(&mut options)?;
//! let layer = build::build_layer(&mut options)?;
//! build::generate_sbom(&options)?;
//! ```

pub mod apk;
pub mod arch;
pub mod archive;
pub mod build;
pub mod digest;
pub mod exec;
pub mod image;
pub mod init;
pub mod sbom;

pub use arch::Arch;
pub use build::{build_layer, generate_sbom, prepare, BuildOptions};
pub use exec::{ExecStrategy, Executor};
pub use init::InitContext;
