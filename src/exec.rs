//! Process execution inside a prepared build root.
//!
//! The execution strategy is chosen once during environment preparation
//! and stays fixed for the life of the executor: run natively, under
//! proot, or under proot with qemu user-mode emulation for a foreign
//! architecture. Keeping the decision in one tagged variant keeps it
//! auditable instead of re-deriving it at every call site.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// How commands reach the build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStrategy {
    /// Run directly with the build root as the working directory.
    Native,
    /// Wrap in `proot -r <workdir>`.
    Proot,
    /// Wrap in `proot -r <workdir> -q <emulator>`; the string is the qemu
    /// user-mode binary name.
    ProotQemu(String),
}

/// Executor bound to one build root.
#[derive(Debug)]
pub struct Executor {
    work_dir: PathBuf,
    strategy: ExecStrategy,
}

impl Executor {
    /// Create an executor for `work_dir` with the given strategy.
    ///
    /// Validates the working directory and, for proot-based strategies,
    /// that the required host binaries can be located in PATH.
    pub fn new(work_dir: &Path, strategy: ExecStrategy) -> Result<Executor> {
        if !work_dir.is_dir() {
            bail!("working directory does not exist: {}", work_dir.display());
        }

        match &strategy {
            ExecStrategy::Native => {}
            ExecStrategy::Proot => {
                which::which("proot").context("proot not found in PATH")?;
            }
            ExecStrategy::ProotQemu(emulator) => {
                which::which("proot").context("proot not found in PATH")?;
                which::which(emulator)
                    .with_context(|| format!("emulator {} not found in PATH", emulator))?;
            }
        }

        Ok(Executor {
            work_dir: work_dir.to_path_buf(),
            strategy,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn strategy(&self) -> &ExecStrategy {
        &self.strategy
    }

    /// Build a command routed through the configured strategy.
    pub fn command(&self, program: &str, args: &[&str]) -> Command {
        compose(&self.strategy, &self.work_dir, program, args)
    }

    /// Run a command to completion, failing on a nonzero exit status.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        debug!("running {} {:?} in {}", program, args, self.work_dir.display());
        let status = self
            .command(program, args)
            .status()
            .with_context(|| format!("spawning {}", program))?;
        if !status.success() {
            bail!("{} exited with {}", program, status);
        }
        Ok(())
    }
}

fn compose(strategy: &ExecStrategy, work_dir: &Path, program: &str, args: &[&str]) -> Command {
    match strategy {
        ExecStrategy::Native => {
            let mut cmd = Command::new(program);
            cmd.args(args).current_dir(work_dir);
            cmd
        }
        ExecStrategy::Proot => {
            let mut cmd = Command::new("proot");
            cmd.arg("-r").arg(work_dir).arg(program).args(args);
            cmd
        }
        ExecStrategy::ProotQemu(emulator) => {
            let mut cmd = Command::new("proot");
            cmd.arg("-q")
                .arg(emulator)
                .arg("-r")
                .arg(work_dir)
                .arg(program)
                .args(args);
            cmd
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    fn argv(cmd: &Command) -> Vec<String> {
        std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|s: &OsStr| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_native_composition() {
        let cmd = compose(&ExecStrategy::Native, Path::new("/root/fs"), "apk", &["info"]);
        assert_eq!(argv(&cmd), ["apk", "info"]);
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/root/fs")));
    }

    #[test]
    fn test_proot_composition() {
        let cmd = compose(&ExecStrategy::Proot, Path::new("/root/fs"), "apk", &["info"]);
        assert_eq!(argv(&cmd), ["proot", "-r", "/root/fs", "apk", "info"]);
    }

    #[test]
    fn test_proot_qemu_composition() {
        let strategy = ExecStrategy::ProotQemu("qemu-aarch64".to_string());
        let cmd = compose(&strategy, Path::new("/root/fs"), "apk", &["add", "musl"]);
        assert_eq!(
            argv(&cmd),
            ["proot", "-q", "qemu-aarch64", "-r", "/root/fs", "apk", "add", "musl"]
        );
    }

    #[test]
    fn test_new_rejects_missing_work_dir() {
        let result = Executor::new(Path::new("/nonexistent_workdir_5501"), ExecStrategy::Native);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("working directory"));
    }

    #[test]
    fn test_new_native_succeeds() {
        let temp = TempDir::new().unwrap();
        let executor = Executor::new(temp.path(), ExecStrategy::Native).unwrap();
        assert_eq!(executor.strategy(), &ExecStrategy::Native);
        assert_eq!(executor.work_dir(), temp.path());
    }

    #[test]
    fn test_new_qemu_requires_host_binaries() {
        let temp = TempDir::new().unwrap();
        // Either proot or the (fake) emulator is missing from PATH.
        let strategy = ExecStrategy::ProotQemu("qemu-definitely-missing-xyz".to_string());
        assert!(Executor::new(temp.path(), strategy).is_err());
    }
}
