use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;

/// A role an entity can hold in the community.
///
/// `Developer`, `Contributor` and `Bot` are exclusive: every entity holds
/// exactly one of them. `Leader` and `Admin` are held in addition.
///
/// The declaration order is the order roles are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Contributor,
    Bot,
    Leader,
    Admin,
}

impl Role {
    pub const EXCLUSIVE: [Role; 3] = [Role::Developer, Role::Contributor, Role::Bot];

    pub fn is_exclusive(self) -> bool {
        Self::EXCLUSIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Contributor => "contributor",
            Self::Bot => "bot",
            Self::Leader => "leader",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(Self::Developer),
            "contributor" => Ok(Self::Contributor),
            "bot" => Ok(Self::Bot),
            "leader" => Ok(Self::Leader),
            "admin" => Ok(Self::Admin),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

pub(crate) fn display_roles(roles: &[Role]) -> String {
    if roles.is_empty() {
        return "none".to_string();
    }
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A person or automated actor with one or more OpenPGP keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub handle: String,
    pub name: String,
    /// Long key IDs in keyid-file order, as written there.
    pub keyids: Vec<String>,
    pub roles: BTreeSet<Role>,
    /// Human-readable gpg listing per key ID, filled in by
    /// [`Keyring::read_key_listings`](crate::Keyring::read_key_listings).
    pub key_listings: BTreeMap<String, String>,
}

impl Entity {
    pub fn new(handle: impl Into<String>, name: impl Into<String>, keyids: Vec<String>) -> Self {
        Self {
            handle: handle.into(),
            name: name.into(),
            keyids,
            roles: BTreeSet::new(),
            key_listings: BTreeMap::new(),
        }
    }

    pub fn exclusive_roles(&self) -> Vec<Role> {
        self.roles.iter().copied().filter(|r| r.is_exclusive()).collect()
    }

    /// The single exclusive role, if the entity is consistent.
    pub fn primary_role(&self) -> Option<Role> {
        match self.exclusive_roles().as_slice() {
            [role] => Some(*role),
            _ => None,
        }
    }
}

/// A public key as listed by `gpg --with-colons`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub fingerprint: String,
    pub uid: String,
    pub created: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub key_type: KeyType,
}

impl Key {
    /// Lowercase trailing 16 hex characters of the fingerprint.
    pub fn long_key_id(&self) -> String {
        long_key_id(&self.fingerprint)
    }
}

pub(crate) fn long_key_id(fingerprint: &str) -> String {
    let start = fingerprint.len().saturating_sub(16);
    fingerprint
        .get(start..)
        .unwrap_or(fingerprint)
        .to_lowercase()
}

/// The cryptographic algorithm and key size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyType {
    pub algorithm: String,
    pub bits: u32,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.algorithm.to_lowercase(), self.bits)
    }
}

/// Signature check result git reports per commit (`%G?`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureStatus {
    Good,
    GoodUntrusted,
    Bad,
    ExpiredSignature,
    ExpiredKey,
    RevokedKey,
    CannotCheck,
    None,
}

impl SignatureStatus {
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'G' => Self::Good,
            'U' => Self::GoodUntrusted,
            'B' => Self::Bad,
            'X' => Self::ExpiredSignature,
            'Y' => Self::ExpiredKey,
            'R' => Self::RevokedKey,
            'E' => Self::CannotCheck,
            'N' => Self::None,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Self::Good => 'G',
            Self::GoodUntrusted => 'U',
            Self::Bad => 'B',
            Self::ExpiredSignature => 'X',
            Self::ExpiredKey => 'Y',
            Self::RevokedKey => 'R',
            Self::CannotCheck => 'E',
            Self::None => 'N',
        }
    }

    /// Only good signatures, trusted or not, are accepted.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Good | Self::GoodUntrusted)
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Good => "good signature",
            Self::GoodUntrusted => "good signature with unknown validity",
            Self::Bad => "bad signature",
            Self::ExpiredSignature => "good signature that has expired",
            Self::ExpiredKey => "good signature made by an expired key",
            Self::RevokedKey => "good signature made by a revoked key",
            Self::CannotCheck => "signature cannot be checked",
            Self::None => "no signature",
        };
        write!(f, "{}: {}", self.code(), text)
    }
}

/// One line of `git log --format='%H %G?'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
    pub commit: String,
    pub status: SignatureStatus,
}
