#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Core library for the clone build step.
//!
//! A run resolves the checkout hints into one target, sequences the external
//! `git` binary through init, remote add, fetch, checkout and submodule
//! update, and publishes seven pieces of commit metadata to a key/value
//! sink. The CLI binary in `crates/clonestep` wires the environment to it.

/// Clone orchestration.
mod clone;
/// Credential preparation for the authenticated variant.
mod credentials;
/// Error types.
mod error;
/// Key/value sinks for commit metadata.
mod export;
/// Invocation seam for the `git` binary.
mod git;
/// Input validation and checkout target resolution.
mod inputs;
/// Commit metadata extraction.
mod metadata;
/// Output channel abstractions and implementations.
mod output;

pub use clone::{CloneOutcome, Cloner, REMOTE};
pub use credentials::{
    Credentials, KEY_FILE, SSH_DIR, SSH_HELPER, SSH_HELPER_WITH_KEY, SSH_PRIVATE_KEY,
};
pub use error::{CloneError, GitError, Result, Step};
pub use export::{Envman, ExportError, ExportSink, TomlFile};
pub use git::{Git, SystemGit};
pub use inputs::{
    BRANCH, CLONE_INTO_DIR, COMMIT, CheckoutHints, CheckoutTarget, Inputs, PULL_REQUEST_ID,
    REPOSITORY_URL, RawInputs, TAG, TargetKind,
};
pub use metadata::{CommitMetadata, ExportReport, KeyOutcome, MetadataField, extract};
pub use output::{Output, OutputError, Quiet, Terminal};
