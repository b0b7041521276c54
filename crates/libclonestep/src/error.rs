use std::{fmt, io, path::PathBuf, result::Result as StdResult};
use thiserror::Error;

/// Custom Result type for clone step operations.
pub type Result<T> = StdResult<T, CloneError>;

/// A failure while invoking the external `git` binary.
#[derive(Error, Debug)]
pub enum GitError {
    /// The process could not be started at all.
    #[error("Failed to execute git command: {command}: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying spawn error.
        source: io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("Git command failed: {command} (exit status: {}){}", fmt_code(.code), fmt_stderr(.stderr))]
    Exit {
        /// Rendered command line.
        command: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Trimmed stderr for captured invocations, empty when inherited.
        stderr: String,
    },
}

/// Render an optional exit code.
pub fn fmt_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Render captured stderr as a trailing detail, if any.
fn fmt_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nError: {stderr}")
    }
}

/// One step of the clone sequence, used to label failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `git init`
    Init,
    /// `git remote add origin <url>`
    AddRemote,
    /// `git fetch [...]`
    Fetch,
    /// `git checkout <ref>`
    Checkout(String),
    /// `git submodule update --init --recursive`
    SubmoduleUpdate,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::AddRemote => write!(f, "add-remote"),
            Self::Fetch => write!(f, "fetch"),
            Self::Checkout(reference) => write!(f, "checkout ({reference})"),
            Self::SubmoduleUpdate => write!(f, "submodule-update"),
        }
    }
}

/// Fatal errors of a clone step run.
#[derive(Error, Debug)]
pub enum CloneError {
    /// A required input was absent or empty.
    #[error("Missing required input: {name}")]
    MissingInput {
        /// Environment name of the input.
        name: &'static str,
    },

    /// The repository URL did not parse.
    #[error("Failed to parse repo url ({url}): {source}")]
    InvalidUrl {
        /// The URL as supplied.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// A scheme-less location whose first segment holds a colon, such as
    /// scp-style `git@host:org/repo.git`.
    #[error("Failed to parse repo url ({url}): first path segment in URL cannot contain colon")]
    ColonInFirstSegment {
        /// The URL as supplied.
        url: String,
    },

    /// The destination path could not be made absolute.
    #[error("Failed to expand path ({path}): {source}")]
    InvalidPath {
        /// The path as supplied.
        path: String,
        /// Underlying error.
        source: io::Error,
    },

    /// The destination already holds a repository.
    #[error(".git folder already exists in the destination dir ({})", .path.display())]
    AlreadyCloned {
        /// The `.git` entry that was found.
        path: PathBuf,
    },

    /// The destination directory could not be created or inspected.
    #[error("Failed to create the clone destination dir at {}: {source}", .path.display())]
    CreateDir {
        /// Destination directory.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The invoking user's home directory is unknown.
    #[error("Failed to determine the home directory")]
    HomeDir,

    /// The private key could not be persisted.
    #[error("Failed to write ssh key to {}: {source}", .path.display())]
    WriteKey {
        /// Key file location.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// An explicitly configured helper directory lacks the selected script.
    #[error("ssh helper not found at {}", .path.display())]
    MissingHelper {
        /// Expected script location.
        path: PathBuf,
    },

    /// The embedded helper script could not be installed.
    #[error("Failed to install ssh helper to {}: {source}", .path.display())]
    InstallHelper {
        /// Script location.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// A step of the git sequence failed.
    #[error("Could not {step}: {source}")]
    Step {
        /// The step that failed.
        step: Step,
        /// The git failure.
        source: GitError,
    },
}

impl CloneError {
    /// Return the recommended process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingInput { .. }
            | Self::InvalidUrl { .. }
            | Self::ColonInFirstSegment { .. }
            | Self::InvalidPath { .. }
            | Self::MissingHelper { .. } => 2,
            Self::AlreadyCloned { .. } => 3,
            Self::Step { .. } => 4,
            _ => 1,
        }
    }
}
