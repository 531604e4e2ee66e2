use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const HOMEDIR_PREFIX: &str = "keyring-gnupg-";

/// A temporary GnuPG home directory owned by a single check.
///
/// The directory has mode 0700 and is removed when the value is
/// dropped, whether the check returned normally or bailed out with `?`.
/// Use [`EphemeralHome::close`] to observe removal errors.
#[derive(Debug)]
pub struct EphemeralHome {
    dir: TempDir,
}

impl EphemeralHome {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(HOMEDIR_PREFIX)
            .tempdir()
            .map_err(Error::EphemeralHome)?;

        // gpg warns about homedirs readable by others.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700))
                .map_err(Error::EphemeralHome)?;
        }

        debug!(path = %dir.path().display(), "created ephemeral GnuPG home");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory now, reporting failures instead of ignoring
    /// them.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| {
            warn!(path = %path.display(), "failed to remove ephemeral GnuPG home");
            Error::Write { path, source }
        })
    }
}
