//! Adapters for the external tools doing the actual work.
//!
//! [`OpenPgp`] covers key import and listing, [`Vcs`] covers commit
//! signature annotation. [`Gpg`] and [`Git`] spawn the real programs.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::parse::{ImportStatus, parse_commit_signatures, parse_import_status, parse_keys};
use crate::types::{CommitSignature, Key};

const DEFAULT_GPG: &str = "gpg";
const DEFAULT_GIT: &str = "git";

/// An OpenPGP implementation operating on a given home directory.
#[async_trait]
pub trait OpenPgp: Send + Sync {
    /// Imports armored or binary public key material into `homedir`.
    ///
    /// Input without any OpenPGP data is not an error; it is reported as
    /// [`ImportStatus::no_data`] with no fingerprints.
    async fn import(&self, homedir: &Path, data: &[u8]) -> Result<ImportStatus>;

    /// Lists the public keys in `homedir`.
    async fn list_keys(&self, homedir: &Path) -> Result<Vec<Key>>;

    /// Human-readable listing of the public keys in `homedir`, long key IDs
    /// and fingerprints included.
    async fn key_listing(&self, homedir: &Path) -> Result<String>;
}

/// A version control system that can report commit signature status.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Every commit reachable from the current history with its signature
    /// status, verified against the keys in `gnupghome`.
    async fn commit_signatures(
        &self,
        repo: &Path,
        gnupghome: &Path,
    ) -> Result<Vec<CommitSignature>>;

    /// Author, date and message of `commit`, for error reports. Any
    /// signature lookup uses `gnupghome`.
    async fn show_commit(&self, repo: &Path, gnupghome: &Path, commit: &str) -> Result<String>;
}

/// Runs the `gpg` executable.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: String,
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpg {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_GPG)
    }

    /// Uses another executable, e.g. `gpg2`.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, homedir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("LC_ALL", "C")
            .arg("--homedir")
            .arg(homedir)
            .args(["--batch", "--no-tty"]);
        cmd
    }

    async fn run(&self, homedir: &Path, args: &[&str]) -> Result<String> {
        let output = self.command(homedir).args(args).output().await?;

        if !output.status.success() {
            return Err(tool_error("gpg", output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OpenPgp for Gpg {
    async fn import(&self, homedir: &Path, data: &[u8]) -> Result<ImportStatus> {
        let mut child = self
            .command(homedir)
            .args(["--status-fd", "1", "--import"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // gpg may stop reading early on garbage input.
            if let Err(e) = stdin.write_all(data).await
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        let output = child.wait_with_output().await?;
        let status = parse_import_status(&String::from_utf8_lossy(&output.stdout));
        debug!(
            imported = status.fingerprints.len(),
            no_data = status.no_data,
            "gpg import finished"
        );

        if !output.status.success() && !(status.no_data && status.fingerprints.is_empty()) {
            return Err(tool_error("gpg", output.status, &output.stderr));
        }

        Ok(status)
    }

    async fn list_keys(&self, homedir: &Path) -> Result<Vec<Key>> {
        let stdout = self
            .run(homedir, &["--list-keys", "--with-colons"])
            .await?;
        parse_keys(&stdout)
    }

    async fn key_listing(&self, homedir: &Path) -> Result<String> {
        self.run(
            homedir,
            &[
                "--keyid-format",
                "0xlong",
                "--with-fingerprint",
                "--list-options",
                "show-uid-validity",
                "--verify-options",
                "show-uid-validity",
                "--list-public-keys",
            ],
        )
        .await
    }
}

/// Runs the `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

impl Git {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_GIT)
    }

    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `git -C <repo> log` with signature verification scoped to
    /// `gnupghome`. `log.showSignature` would mix gpg output into stdout.
    fn log(&self, repo: &Path, gnupghome: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("LC_ALL", "C")
            .env("GNUPGHOME", gnupghome)
            .arg("-C")
            .arg(repo)
            .args(["log", "--no-show-signature"]);
        cmd
    }
}

#[async_trait]
impl Vcs for Git {
    async fn commit_signatures(
        &self,
        repo: &Path,
        gnupghome: &Path,
    ) -> Result<Vec<CommitSignature>> {
        // %G? is G (good), U (good, unknown validity), B (bad), X/Y/R
        // (expired signature, expired key, revoked key), E (missing key)
        // or N (no signature).
        let output = self
            .log(repo, gnupghome)
            .arg("--format=%H %G?")
            .output()
            .await?;

        if !output.status.success() {
            return Err(tool_error("git", output.status, &output.stderr));
        }

        parse_commit_signatures(&String::from_utf8_lossy(&output.stdout))
    }

    async fn show_commit(&self, repo: &Path, gnupghome: &Path, commit: &str) -> Result<String> {
        let output = self
            .log(repo, gnupghome)
            .args(["-1", commit])
            .output()
            .await?;

        if !output.status.success() {
            return Err(tool_error("git", output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn tool_error(program: &'static str, status: ExitStatus, stderr: &[u8]) -> Error {
    Error::Tool {
        program,
        status: status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(stderr).trim_end().to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_keeps_stderr() {
        let status = std::process::Command::new("false").status().unwrap();
        let err = tool_error("gpg", status, b"gpg: no valid OpenPGP data found.\n");
        match err {
            Error::Tool {
                program,
                status,
                stderr,
            } => {
                assert_eq!(program, "gpg");
                assert_eq!(status, 1);
                assert_eq!(stderr, "gpg: no valid OpenPGP data found.");
            }
            _ => panic!("expected Tool error"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_command_error() {
        let gpg = Gpg::with_program("keyring-audit-no-such-gpg");
        let result = gpg.list_keys(Path::new("/nonexistent")).await;
        assert!(matches!(result, Err(Error::Command(_))));

        let git = Git::with_program("keyring-audit-no-such-git");
        let result = git.show_commit(Path::new("."), Path::new("/nonexistent"), "HEAD").await;
        assert!(matches!(result, Err(Error::Command(_))));
    }
}
