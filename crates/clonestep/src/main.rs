#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Command-line entry point for the clone build step built on libclonestep.

use std::{
    env,
    io::{self, IsTerminal},
    path::PathBuf,
    process,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use libclonestep::{
    BRANCH, CLONE_INTO_DIR, COMMIT, CloneError, Cloner, Credentials, Envman, ExportSink, Inputs,
    Output, PULL_REQUEST_ID, Quiet, REPOSITORY_URL, RawInputs, SSH_PRIVATE_KEY, SystemGit, TAG,
    Terminal, TomlFile,
};

/// Environment override for the helper script directory.
const HELPER_DIR_ENV: &str = "CLONESTEP_HELPER_DIR";

/// Environment override for the TOML export file.
const EXPORT_FILE_ENV: &str = "CLONESTEP_EXPORT_FILE";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("color_mode")
        .args(["color", "no_color"])
))]
/// CLI options. Every input falls back to its environment variable.
struct Cli {
    /// Repository to clone [env: repository_url]
    #[arg(long, value_name = "URL")]
    repository_url: Option<String>,

    /// Destination directory, relative paths are resolved [env: clone_into_dir]
    #[arg(long, value_name = "DIR")]
    clone_into_dir: Option<String>,

    /// Pull request whose merge ref is checked out [env: pull_request_id]
    #[arg(long, value_name = "ID")]
    pull_request_id: Option<String>,

    /// Commit hash to check out [env: commit]
    #[arg(long, value_name = "HASH")]
    commit: Option<String>,

    /// Tag to check out [env: tag]
    #[arg(long)]
    tag: Option<String>,

    /// Branch to check out [env: branch]
    #[arg(long)]
    branch: Option<String>,

    /// Private key for ssh transport, implies --auth [env: auth_ssh_private_key]
    #[arg(long, value_name = "KEY")]
    ssh_key: Option<String>,

    /// Route git transport through the ssh helper scripts
    #[arg(long)]
    auth: bool,

    /// Directory holding the ssh helper scripts, bundled ones are installed
    /// into ~/.ssh otherwise [env: CLONESTEP_HELPER_DIR]
    #[arg(long, value_name = "DIR")]
    helper_dir: Option<PathBuf>,

    /// Write commit metadata to a TOML file instead of envman [env: CLONESTEP_EXPORT_FILE]
    #[arg(long, value_name = "FILE")]
    export_file: Option<PathBuf>,

    /// Enable colored output
    #[arg(long)]
    color: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    no_color: bool,

    /// Suppress all output except git's own
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    /// Flag value for the input named `name`.
    fn flag(&self, name: &str) -> Option<String> {
        match name {
            REPOSITORY_URL => self.repository_url.clone(),
            CLONE_INTO_DIR => self.clone_into_dir.clone(),
            PULL_REQUEST_ID => self.pull_request_id.clone(),
            COMMIT => self.commit.clone(),
            TAG => self.tag.clone(),
            BRANCH => self.branch.clone(),
            SSH_PRIVATE_KEY => self.ssh_key.clone(),
            _ => None,
        }
    }

    /// Input named `name`: flag first, then environment.
    fn lookup(&self, name: &str) -> Option<String> {
        self.flag(name).or_else(|| env::var(name).ok())
    }

    /// Whether the authenticated variant is selected.
    fn authenticated(&self) -> bool {
        self.auth || self.ssh_key.is_some() || env::var_os(SSH_PRIVATE_KEY).is_some()
    }

    /// Sink for commit metadata.
    fn sink(&self) -> Box<dyn ExportSink> {
        let path = self
            .export_file
            .clone()
            .or_else(|| env::var_os(EXPORT_FILE_ENV).map(PathBuf::from));
        match path {
            Some(path) => Box::new(TomlFile::new(path)),
            None => Box::new(Envman::new()),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    let output: Arc<dyn Output> = if cli.quiet {
        Arc::new(Quiet)
    } else {
        Arc::new(Terminal::new(color))
    };

    if let Err(e) = run(&cli, output.as_ref()) {
        let exit_code = e
            .downcast_ref::<CloneError>()
            .map_or(1, CloneError::exit_code);

        if let Err(display_err) = output.fail(&format!("{e:#}")) {
            eprintln!("Failed to report error via output handler: {display_err:#}");
        }
        if let Err(finish_err) = output.finish() {
            eprintln!("Failed to flush output handler: {finish_err:#}");
        }

        process::exit(exit_code);
    }
}

/// Resolve inputs, prepare credentials if requested, and run the clone.
fn run(cli: &Cli, output: &dyn Output) -> Result<()> {
    let raw = RawInputs::from_lookup(|name| cli.lookup(name));
    let inputs = Inputs::resolve(raw, output).context("Input validation failed")?;

    let section = output.section(&format!(
        "Cloning {} into {}",
        inputs.repository_url,
        inputs.clone_into_dir.display()
    ));

    let git = SystemGit::new();
    let sink = cli.sink();
    let mut cloner = Cloner::new(&git, sink.as_ref(), section.as_ref());

    if cli.authenticated() {
        let ssh_key = cli.lookup(SSH_PRIVATE_KEY);
        let helper_dir = cli
            .helper_dir
            .clone()
            .or_else(|| env::var_os(HELPER_DIR_ENV).map(PathBuf::from));
        let credentials = Credentials::prepare_for_user(ssh_key.as_deref(), helper_dir)
            .context("Failed to prepare ssh credentials")?;
        if let Some(key_path) = credentials.key_path() {
            let _ = section.message(&format!("Wrote ssh key to {}", key_path.display()));
        }
        let _ = section.message(&format!(
            "Using ssh helper {}",
            credentials.helper_path().display()
        ));
        cloner = cloner.with_credentials(&credentials);
    }

    let outcome = cloner
        .clone_repository(
            &inputs.clone_into_dir,
            inputs.target.as_ref(),
            inputs.repository_url.as_str(),
        )
        .context("git clone failed")?;

    if let Some(report) = &outcome.report {
        let exported = report.outcomes.iter().filter(|o| o.is_ok()).count();
        let _ = section.message(&format!(
            "Exported {exported} of {} commit metadata keys",
            report.outcomes.len()
        ));
    }

    let _ = output.finish();
    Ok(())
}
