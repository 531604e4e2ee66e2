//! Command-line entry point of keyring-audit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use keyring_audit::{
    DEFAULT_KEYRING_DIR, DEFAULT_MIN_KEY_BITS, EntityDirectory, Keyring, Layout, Policy, Renderer,
    RoleBuckets,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "keyring-audit", version)]
#[command(about = "Check a community OpenPGP keyring and render its member documentation")]
struct Cli {
    /// Print lots of debugging statements
    #[arg(short, long, overrides_with = "verbose")]
    debug: bool,

    /// Be verbose
    #[arg(short, long, overrides_with = "debug")]
    verbose: bool,

    /// Only report expired and weak keys and display name mismatches
    /// instead of failing
    #[arg(short = 'n', long)]
    no_strict: bool,

    /// Jinja2 template used to render the output file
    #[arg(short = 't', long, value_name = "FILE")]
    entity_template_file: Option<PathBuf>,

    /// Where to write the rendered template to
    #[arg(short, long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Write the rendered template to stdout for quick checking
    #[arg(short, long)]
    show_output: bool,

    /// Perform a full consistency check
    #[arg(short = 'c', long, overrides_with = "no_consistency_check")]
    consistency_check: bool,

    /// Do not run any consistency check
    #[arg(long, overrides_with = "consistency_check")]
    no_consistency_check: bool,

    /// Do not run the role and key file checks
    #[arg(long)]
    no_consistency_check_keyring: bool,

    /// Do not run the commit signature check
    #[arg(long)]
    no_consistency_check_git: bool,

    /// Directory holding the keyids and role files
    #[arg(long, env = "KEYRING_AUDIT_BASE_DIR", default_value = ".", value_name = "DIR")]
    base_dir: PathBuf,

    /// Directory holding one public key file per long key ID, relative to
    /// the base directory
    #[arg(long, env = "KEYRING_AUDIT_KEYRING_DIR", default_value = DEFAULT_KEYRING_DIR, value_name = "DIR")]
    keyring_dir: PathBuf,

    /// Repository whose commits must be signed (default: the base directory)
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// Minimum key length in bits enforced in strict mode
    #[arg(long, env = "KEYRING_AUDIT_MIN_KEY_SIZE", default_value_t = DEFAULT_MIN_KEY_BITS, value_name = "BITS")]
    min_key_size: u32,
}

impl Cli {
    /// `None` when neither `--consistency-check` nor
    /// `--no-consistency-check` was given.
    fn consistency_check(&self) -> Option<bool> {
        if self.consistency_check {
            Some(true)
        } else if self.no_consistency_check {
            Some(false)
        } else {
            None
        }
    }

    fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else if self.verbose {
            LevelFilter::INFO
        } else {
            LevelFilter::WARN
        }
    }

    fn renders(&self) -> bool {
        self.show_output || self.output_file.is_some()
    }
}

fn init_tracing(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.renders() && cli.consistency_check().is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "at least one of the following arguments is required: --output-file, --show-output, --consistency-check",
            )
            .exit();
    }

    init_tracing(cli.log_level());

    let layout = Layout::new(&cli.base_dir).with_keyring_dir(&cli.keyring_dir);
    let policy = Policy {
        strict: !cli.no_strict,
        min_key_bits: cli.min_key_size,
    };
    let repo = cli.repo.clone().unwrap_or_else(|| cli.base_dir.clone());

    let mut directory = EntityDirectory::load(&layout, policy.strict)
        .context("failed to read the keyids and role files")?;
    let keyring = Keyring::new(layout.keyring_dir()).with_policy(policy);

    if cli.consistency_check().unwrap_or(true) {
        if !cli.no_consistency_check_keyring {
            directory
                .check_consistency()
                .context("entity consistency check failed")?;
            keyring
                .check_keyring_dir()
                .await
                .context("keyring consistency check failed")?;
            info!("keyring is consistent");
        }
        if !cli.no_consistency_check_git {
            keyring
                .check_commits(&repo)
                .await
                .context("commit signature check failed")?;
            info!("all commits carry good signatures");
        }
    }

    if cli.renders() {
        // Every entity needs its page section before any key is listed.
        RoleBuckets::from_directory(&directory).context("cannot group entities by role")?;
        keyring
            .read_key_listings(&mut directory)
            .await
            .context("failed to list the keyring's keys")?;
        debug!(?directory, "entity directory");

        let renderer = match &cli.entity_template_file {
            Some(path) => Renderer::with_template_file(path),
            None => Renderer::new(),
        };

        if cli.show_output {
            println!("{}", renderer.render(&directory)?);
        }
        if let Some(output) = &cli.output_file {
            renderer.write(&directory, output)?;
        }
    }

    Ok(())
}
