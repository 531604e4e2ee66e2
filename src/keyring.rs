use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::directory::EntityDirectory;
use crate::engine::{Git, Gpg, OpenPgp, Vcs};
use crate::error::{Error, Result};
use crate::homedir::EphemeralHome;
use crate::parse::truncate_key_listing;
use crate::types::{Key, long_key_id};
use crate::validation::normalize_long_key_id;

/// Checks a keyring directory and the commits signed with its keys.
///
/// Every check imports keys into its own [`EphemeralHome`], so neither the
/// caller's GnuPG home nor other checks are affected.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> keyring_audit::Result<()> {
/// use keyring_audit::Keyring;
///
/// let keyring = Keyring::new("keyring-gpg");
/// keyring.check_keyring_dir().await?;
/// keyring.check_commits(".".as_ref()).await?;
/// # Ok(())
/// # }
/// ```
pub struct Keyring<P = Gpg, V = Git> {
    keyring_dir: PathBuf,
    policy: Policy,
    openpgp: P,
    vcs: V,
}

impl Keyring {
    /// Uses the `gpg` and `git` executables from `PATH` and the default
    /// strict [`Policy`].
    #[must_use]
    pub fn new(keyring_dir: impl Into<PathBuf>) -> Self {
        Self::with_engines(keyring_dir, Gpg::new(), Git::new())
    }
}

impl<P: OpenPgp, V: Vcs> Keyring<P, V> {
    #[must_use]
    pub fn with_engines(keyring_dir: impl Into<PathBuf>, openpgp: P, vcs: V) -> Self {
        Self {
            keyring_dir: keyring_dir.into(),
            policy: Policy::default(),
            openpgp,
            vcs,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn keyring_dir(&self) -> &Path {
        &self.keyring_dir
    }

    pub fn openpgp(&self) -> &P {
        &self.openpgp
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Checks a single public key file against the key ID it claims to hold.
    ///
    /// The file must contain exactly one key whose long key ID matches
    /// `asserted_id` (case-insensitive, optional "0x"). In strict mode the
    /// key must also be unexpired and at least
    /// [`Policy::min_key_bits`] long.
    pub async fn check_pubkey_file(&self, path: &Path, asserted_id: &str) -> Result<()> {
        self.check_pubkey_file_at(path, asserted_id, Utc::now())
            .await
    }

    /// Like [`check_pubkey_file`](Self::check_pubkey_file), judging expiry
    /// at `now`.
    pub async fn check_pubkey_file_at(
        &self,
        path: &Path,
        asserted_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let data = read_key_file(path).await?;
        let home = EphemeralHome::new()?;

        let imported = self.openpgp.import(home.path(), &data).await?;
        let [fingerprint] = imported.fingerprints.as_slice() else {
            return Err(Error::MalformedKeyFile {
                path: path.to_path_buf(),
                count: imported.fingerprints.len(),
            });
        };

        let actual = long_key_id(fingerprint);
        let expected = normalize_long_key_id(asserted_id);
        if actual != expected {
            return Err(Error::KeyIdMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }

        let key = self
            .openpgp
            .list_keys(home.path())
            .await?
            .into_iter()
            .find(|k| k.fingerprint.eq_ignore_ascii_case(fingerprint))
            .ok_or_else(|| Error::KeyNotFound(fingerprint.clone()))?;
        self.check_key_policy(path, &key, now)?;

        home.close()?;
        debug!(path = %path.display(), key_type = %key.key_type, "key file passed");
        Ok(())
    }

    fn check_key_policy(&self, path: &Path, key: &Key, now: DateTime<Utc>) -> Result<()> {
        if let Some(expires) = key.expires
            && expires < now
        {
            if self.policy.strict {
                return Err(Error::ExpiredKey {
                    path: path.to_path_buf(),
                    now,
                    expires,
                });
            }
            warn!(path = %path.display(), %expires, "key has expired");
        }

        if key.key_type.bits < self.policy.min_key_bits {
            if self.policy.strict {
                return Err(Error::WeakKey {
                    path: path.to_path_buf(),
                    bits: key.key_type.bits,
                    minimum: self.policy.min_key_bits,
                });
            }
            warn!(
                path = %path.display(),
                bits = key.key_type.bits,
                minimum = self.policy.min_key_bits,
                "key is shorter than the minimum length"
            );
        }

        Ok(())
    }

    /// Checks every key file in the keyring directory, using each file name
    /// as the asserted long key ID. Stops at the first failure.
    pub async fn check_keyring_dir(&self) -> Result<()> {
        self.check_keyring_dir_at(Utc::now()).await
    }

    pub async fn check_keyring_dir_at(&self, now: DateTime<Utc>) -> Result<()> {
        let files = self.key_files().await?;
        info!(
            keys = files.len(),
            dir = %self.keyring_dir.display(),
            "checking keyring directory"
        );
        for (path, name) in files {
            self.check_pubkey_file_at(&path, &name, now).await?;
        }
        Ok(())
    }

    /// Verifies that every commit reachable in `repo` carries a good
    /// signature by a key from the keyring directory.
    ///
    /// All keys share one ephemeral home that git uses as `GNUPGHOME`. The
    /// first commit without a good signature fails the check.
    pub async fn check_commits(&self, repo: &Path) -> Result<()> {
        let home = EphemeralHome::new()?;

        for (path, _) in self.key_files().await? {
            let data = read_key_file(&path).await?;
            let imported = self.openpgp.import(home.path(), &data).await?;
            debug!(
                path = %path.display(),
                keys = imported.fingerprints.len(),
                "imported key for commit verification"
            );
        }

        let signatures = self.vcs.commit_signatures(repo, home.path()).await?;
        info!(
            commits = signatures.len(),
            repo = %repo.display(),
            "checking commit signatures"
        );

        for signature in signatures {
            if !signature.status.is_acceptable() {
                let details = self
                    .vcs
                    .show_commit(repo, home.path(), &signature.commit)
                    .await?;
                return Err(Error::UnverifiedCommit {
                    commit: signature.commit,
                    status: signature.status,
                    details,
                });
            }
        }

        home.close()
    }

    /// Human-readable listing of the key in `path` without header and
    /// subkey lines.
    pub async fn key_listing(&self, path: &Path) -> Result<String> {
        let data = read_key_file(path).await?;
        let home = EphemeralHome::new()?;
        self.openpgp.import(home.path(), &data).await?;
        let listing = self.openpgp.key_listing(home.path()).await?;
        home.close()?;
        Ok(truncate_key_listing(&listing))
    }

    /// Attaches the listing of every key of every entity, read from
    /// `<keyring dir>/<keyid>`.
    pub async fn read_key_listings(&self, directory: &mut EntityDirectory) -> Result<()> {
        for entity in directory.iter_mut() {
            for keyid in &entity.keyids {
                let listing = self.key_listing(&self.keyring_dir.join(keyid)).await?;
                entity.key_listings.insert(keyid.clone(), listing);
            }
        }
        Ok(())
    }

    /// Regular, non-hidden files in the keyring directory, by name.
    async fn key_files(&self) -> Result<Vec<(PathBuf, String)>> {
        let read_error = |source| Error::Read {
            path: self.keyring_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.keyring_dir)
            .await
            .map_err(read_error)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                debug!(%name, "skipping hidden file in keyring directory");
                continue;
            }
            if !entry.file_type().await.map_err(read_error)?.is_file() {
                debug!(%name, "skipping non-file in keyring directory");
                continue;
            }
            files.push((entry.path(), name));
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

async fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
