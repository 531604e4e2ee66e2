use std::path::{Path, PathBuf};

use crate::types::Role;

/// Minimum key length in bits, following common keyring guidelines.
pub const DEFAULT_MIN_KEY_BITS: u32 = 2048;

pub const DEFAULT_KEYRING_DIR: &str = "keyring-gpg";
const KEYIDS_FILE: &str = "keyids";

/// Checks relaxed or enforced for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Enforces key expiry, minimum key length and exact display names in
    /// role files. Structural checks apply either way.
    pub strict: bool,
    pub min_key_bits: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            strict: true,
            min_key_bits: DEFAULT_MIN_KEY_BITS,
        }
    }
}

/// Where the keyring's input files live.
///
/// ```text
/// <base>/keyids        <keyid> <Display Name> <handle>
/// <base>/leader        <Display Name> <handle>
/// <base>/admins
/// <base>/developers
/// <base>/contributors
/// <base>/bots
/// <base>/keyring-gpg/  one public key file per long key ID
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base_dir: PathBuf,
    keyring_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Layout {
    /// Order the role files are read in.
    pub const ROLE_FILE_ORDER: [Role; 5] = [
        Role::Leader,
        Role::Admin,
        Role::Developer,
        Role::Contributor,
        Role::Bot,
    ];

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let keyring_dir = base_dir.join(DEFAULT_KEYRING_DIR);
        Self {
            base_dir,
            keyring_dir,
        }
    }

    /// Overrides the keyring directory. Relative paths are resolved against
    /// the base directory.
    #[must_use]
    pub fn with_keyring_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.keyring_dir = self.base_dir.join(dir);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn keyring_dir(&self) -> &Path {
        &self.keyring_dir
    }

    pub fn keyids_file(&self) -> PathBuf {
        self.base_dir.join(KEYIDS_FILE)
    }

    pub fn role_file(&self, role: Role) -> PathBuf {
        let name = match role {
            Role::Leader => "leader",
            Role::Admin => "admins",
            Role::Developer => "developers",
            Role::Contributor => "contributors",
            Role::Bot => "bots",
        };
        self.base_dir.join(name)
    }
}
