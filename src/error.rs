use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::types::{Role, SignatureStatus, display_roles};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("command execution failed: {0}")]
    Command(#[from] io::Error),

    #[error("{program} exited with status {status}: {stderr}")]
    Tool {
        program: &'static str,
        status: i32,
        stderr: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create ephemeral GnuPG home: {0}")]
    EphemeralHome(#[source] io::Error),

    #[error("invalid key ID '{keyid}': {reason}")]
    InvalidKeyId { keyid: String, reason: String },

    #[error("{}:{line_number}: expected `{expected}`, got {line:?}", path.display())]
    MalformedLine {
        path: PathBuf,
        line_number: usize,
        line: String,
        expected: &'static str,
    },

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("handle {0} is already present in the entity directory")]
    DuplicateHandle(String),

    #[error("{}: handle {handle} is listed with different names: {first:?} and {second:?}", path.display())]
    ConflictingName {
        path: PathBuf,
        handle: String,
        first: String,
        second: String,
    },

    #[error("{}: key ID {keyid} is listed more than once for handle {handle}", path.display())]
    DuplicateKeyId {
        path: PathBuf,
        handle: String,
        keyid: String,
    },

    #[error("handle {0} is not present in the keyid file")]
    UnknownHandle(String),

    #[error(
        "name mismatch for {handle} in {} compared to the keyid file\nexpected: {expected}\nactual: {actual}",
        path.display()
    )]
    NameMismatch {
        path: PathBuf,
        handle: String,
        expected: String,
        actual: String,
    },

    #[error(
        "entity {handle} is member of {count} mutually exclusive roles, expected exactly one (exclusive roles held: {})",
        display_roles(.roles)
    )]
    EntityConsistency {
        handle: String,
        count: usize,
        roles: Vec<Role>,
    },

    #[error("{} contains {count} OpenPGP keys, expected exactly one", path.display())]
    MalformedKeyFile { path: PathBuf, count: usize },

    #[error(
        "{} contains a different key than its name suggests\nkey ID from file name: {expected}\nkey ID from public key: {actual}",
        path.display()
    )]
    KeyIdMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("{} contains an expired OpenPGP key\ncurrent time: {now}\nexpires: {expires}", path.display())]
    ExpiredKey {
        path: PathBuf,
        now: DateTime<Utc>,
        expires: DateTime<Utc>,
    },

    #[error(
        "{} contains a weak OpenPGP key\nkey length in bits: {bits}\nexpected at least: {minimum}",
        path.display()
    )]
    WeakKey {
        path: PathBuf,
        bits: u32,
        minimum: u32,
    },

    #[error("unexpected git log line: {0:?}")]
    MalformedGitLog(String),

    #[error("OpenPGP signature of commit {commit} could not be verified ({status})\naffected commit:\n{details}")]
    UnverifiedCommit {
        commit: String,
        status: SignatureStatus,
        details: String,
    },

    #[error("template rendering failed: {0}")]
    TemplateRender(#[from] minijinja::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
