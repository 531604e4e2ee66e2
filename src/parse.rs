use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{CommitSignature, Key, KeyType, SignatureStatus};

/// A line of the keyid file: `<keyid> <Display Name> <handle>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyidLine<'a> {
    pub keyid: &'a str,
    pub name: &'a str,
    pub handle: &'a str,
}

/// A line of a role file: `<Display Name> <handle>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLine<'a> {
    pub name: &'a str,
    pub handle: &'a str,
}

pub fn parse_keyid_line(line: &str) -> Option<KeyidLine<'_>> {
    let (keyid, rest) = line.split_once(' ')?;
    if keyid.is_empty() {
        return None;
    }
    let RoleLine { name, handle } = parse_role_line(rest)?;
    Some(KeyidLine {
        keyid,
        name,
        handle,
    })
}

/// The display name is kept verbatim, surrounding whitespace included, so
/// strict name checks see exactly what the file says.
pub fn parse_role_line(line: &str) -> Option<RoleLine<'_>> {
    let inner = line.strip_suffix('>')?;
    let open = inner.find('<')?;
    let name = inner[..open].strip_suffix(' ')?;
    let handle = &inner[open + 1..];
    if name.trim().is_empty() || handle.is_empty() {
        return None;
    }
    Some(RoleLine { name, handle })
}

/// Outcome of `gpg --status-fd 1 --import`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStatus {
    /// Fingerprints of the imported keys, in order, without repeats.
    pub fingerprints: Vec<String>,
    /// gpg found no OpenPGP data at all.
    pub no_data: bool,
}

pub fn parse_import_status(output: &str) -> ImportStatus {
    let mut status = ImportStatus::default();

    for line in output.lines() {
        let Some(rest) = line.strip_prefix("[GNUPG:] ") else {
            continue;
        };
        let mut words = rest.split_whitespace();
        match words.next() {
            Some("IMPORT_OK") => {
                if let Some(fpr) = words.nth(1)
                    && !status.fingerprints.iter().any(|f| f == fpr)
                {
                    status.fingerprints.push(fpr.to_string());
                }
            }
            Some("NODATA") => status.no_data = true,
            Some(keyword) => {
                debug!(keyword, "skipping gpg status line");
            }
            None => {}
        }
    }

    status
}

/// Parses `gpg --list-keys --with-colons` into primary keys.
///
/// A key needs a `pub` record carrying its size and the first `fpr` record
/// after it. `fpr` records following a `sub` or `ssb` record belong to that
/// subkey and are ignored.
pub fn parse_keys(output: &str) -> Result<Vec<Key>> {
    let mut keys = Vec::new();
    let mut pending: Option<PendingKey> = None;

    for line in output.lines() {
        let record: Vec<&str> = line.split(':').collect();
        let kind = record[0];

        if kind == "pub" {
            keys.extend(pending.take().and_then(PendingKey::finish));
            pending = Some(PendingKey::from_pub(&record));
            continue;
        }

        match (kind, pending.as_mut()) {
            ("fpr", Some(key)) if !key.in_subkey && key.fingerprint.is_none() => {
                key.fingerprint = field(&record, 9).map(str::to_string);
            }
            ("uid", Some(key)) if key.uid.is_none() => {
                key.uid = field(&record, 9).map(str::to_string);
            }
            ("sub" | "ssb", Some(key)) => key.in_subkey = true,
            ("", _) => {}
            (kind, _) => debug!(record_type = kind, "skipping gpg record"),
        }
    }
    keys.extend(pending.and_then(PendingKey::finish));

    Ok(keys)
}

/// Parses `git log --format='%H %G?'`.
pub fn parse_commit_signatures(output: &str) -> Result<Vec<CommitSignature>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let malformed = || Error::MalformedGitLog(line.to_string());
            let (commit, code) = line.trim_end().split_once(' ').ok_or_else(malformed)?;
            if commit.is_empty() || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(malformed());
            }
            let mut chars = code.chars();
            let status = match (chars.next(), chars.next()) {
                (Some(c), None) => SignatureStatus::from_code(c).ok_or_else(malformed)?,
                _ => return Err(malformed()),
            };
            Ok(CommitSignature {
                commit: commit.to_string(),
                status,
            })
        })
        .collect()
}

/// Drops the keybox header and subkey lines from a human-readable
/// `gpg --list-public-keys` listing.
///
/// Subkeys are rotated more often than the documentation is regenerated.
pub fn truncate_key_listing(output: &str) -> String {
    let mut kept = Vec::new();
    let mut in_header = true;

    for line in output.split('\n') {
        if !in_header && !is_subkey_line(line) {
            kept.push(line);
        }
        if line.starts_with("---------") {
            in_header = false;
        }
    }

    kept.join("\n")
}

fn is_subkey_line(line: &str) -> bool {
    line.strip_prefix("sub")
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_whitespace)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<i64>()
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
}

/// OpenPGP public key algorithm IDs (RFC 4880 section 9.1).
fn algorithm_name(id: &str) -> String {
    let name = match id {
        "1" | "2" | "3" => "RSA",
        "16" | "20" => "Elgamal",
        "17" => "DSA",
        "18" => "ECDH",
        "19" => "ECDSA",
        "22" => "EdDSA",
        other => return format!("alg{other}"),
    };
    name.to_string()
}

/// Non-empty colon-separated field `n`.
fn field<'a>(record: &[&'a str], n: usize) -> Option<&'a str> {
    record.get(n).copied().filter(|value| !value.is_empty())
}

/// A primary key whose records are still being read.
#[derive(Default)]
struct PendingKey {
    fingerprint: Option<String>,
    uid: Option<String>,
    created: Option<DateTime<Utc>>,
    expires: Option<DateTime<Utc>>,
    key_type: Option<KeyType>,
    in_subkey: bool,
}

impl PendingKey {
    fn from_pub(record: &[&str]) -> Self {
        let key_type = field(record, 2)
            .and_then(|bits| bits.parse().ok())
            .map(|bits| KeyType {
                algorithm: field(record, 3).map(algorithm_name).unwrap_or_default(),
                bits,
            });

        Self {
            key_type,
            created: field(record, 5).and_then(parse_timestamp),
            expires: field(record, 6).and_then(parse_timestamp),
            ..Self::default()
        }
    }

    fn finish(self) -> Option<Key> {
        let (Some(fingerprint), Some(key_type)) = (self.fingerprint, self.key_type) else {
            debug!("skipping key without fingerprint or size");
            return None;
        };
        Some(Key {
            fingerprint,
            uid: self.uid.unwrap_or_default(),
            created: self.created,
            expires: self.expires,
            key_type,
        })
    }
}
