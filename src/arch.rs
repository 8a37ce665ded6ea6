//! Target architecture handling.
//!
//! Architectures are normalized to the apk naming convention (`x86_64`,
//! `aarch64`, `armhf`, ...) no matter which alias was used on input. The
//! normalized value decides two things during environment preparation:
//! whether the target can execute natively on the host, and which qemu
//! user-mode binary emulates it when it cannot.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CPU architecture, normalized to the apk name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86,
    X86_64,
    Aarch64,
    Armhf,
    Ppc64le,
    S390x,
    Riscv64,
}

impl Arch {
    /// Parse an architecture name, accepting common aliases
    /// (`amd64` for x86_64, `arm64` for aarch64, and so on).
    pub fn parse(s: &str) -> Result<Arch> {
        let arch = match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Arch::X86_64,
            "x86" | "i386" | "386" | "i686" => Arch::X86,
            "aarch64" | "arm64" => Arch::Aarch64,
            "armhf" | "arm" | "armv7" | "armv7l" => Arch::Armhf,
            "ppc64le" => Arch::Ppc64le,
            "s390x" => Arch::S390x,
            "riscv64" => Arch::Riscv64,
            other => bail!("unknown architecture: {}", other),
        };
        Ok(arch)
    }

    /// The architecture of the running host.
    ///
    /// Hosts outside the supported set are treated as x86_64.
    pub fn host() -> Arch {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "aarch64" => Arch::Aarch64,
            "arm" => Arch::Armhf,
            "powerpc64" => Arch::Ppc64le,
            "s390x" => Arch::S390x,
            "riscv64" => Arch::Riscv64,
            _ => Arch::X86_64,
        }
    }

    /// The canonical apk name.
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Armhf => "armhf",
            Arch::Ppc64le => "ppc64le",
            Arch::S390x => "s390x",
            Arch::Riscv64 => "riscv64",
        }
    }

    /// Whether binaries for this architecture execute natively on `host`.
    ///
    /// Exact match, plus the one recognized equivalence: an x86_64 host
    /// runs x86 binaries without emulation.
    pub fn compatible_with(self, host: Arch) -> bool {
        self == host || (self == Arch::X86 && host == Arch::X86_64)
    }

    /// The qemu user-mode binary that emulates this architecture.
    pub fn emulator(self) -> &'static str {
        match self {
            Arch::X86 => "qemu-i386",
            Arch::X86_64 => "qemu-x86_64",
            Arch::Aarch64 => "qemu-aarch64",
            Arch::Armhf => "qemu-arm",
            Arch::Ppc64le => "qemu-ppc64le",
            Arch::S390x => "qemu-s390x",
            Arch::Riscv64 => "qemu-riscv64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Arch::parse(s)
    }
}
