//! Consistency checks and documentation for a community OpenPGP keyring.
//!
//! A keyring is a directory of public key files named by long key ID, a
//! `keyids` file mapping key IDs to members, and one file per role listing
//! the members holding it. This crate checks that
//!
//! - every member holds exactly one of the roles developer, contributor
//!   and bot,
//! - every key file holds exactly one key matching its file name, not
//!   expired and long enough (strict mode),
//! - every commit of a repository is signed by a key from the keyring,
//!
//! and renders a documentation page of the members by role. Key handling is
//! done by `gpg` and commit verification by `git`.
//!
//! # Example
//!
//! ```no_run
//! use keyring_audit::{EntityDirectory, Keyring, Layout, Policy, Renderer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> keyring_audit::Result<()> {
//!     let layout = Layout::new(".");
//!     let policy = Policy::default();
//!
//!     let mut directory = EntityDirectory::load(&layout, policy.strict)?;
//!     directory.check_consistency()?;
//!
//!     let keyring = Keyring::new(layout.keyring_dir()).with_policy(policy);
//!     keyring.check_keyring_dir().await?;
//!     keyring.read_key_listings(&mut directory).await?;
//!
//!     println!("{}", Renderer::new().render(&directory)?);
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - `gpg` (GnuPG 2.x) and `git` on `PATH`
//! - No access to the user's GnuPG home is needed; every check uses a
//!   temporary one.

mod config;
mod directory;
mod engine;
mod error;
mod homedir;
mod keyring;
mod parse;
mod render;
mod types;
mod validation;

pub use config::{DEFAULT_KEYRING_DIR, DEFAULT_MIN_KEY_BITS, Layout, Policy};
pub use directory::EntityDirectory;
pub use engine::{Git, Gpg, OpenPgp, Vcs};
pub use error::{Error, Result};
pub use homedir::EphemeralHome;
pub use keyring::Keyring;
pub use parse::ImportStatus;
pub use render::{DEFAULT_TEMPLATE_NAME, RoleBuckets, Renderer};
pub use types::{CommitSignature, Entity, Key, KeyType, Role, SignatureStatus};
pub use validation::{normalize_long_key_id, validate_keyid};
