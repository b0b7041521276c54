#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;
use std::{fs::DirBuilder, path::Path};

use crate::{
    credentials::Credentials,
    error::{CloneError, Result, Step},
    export::ExportSink,
    git::Git,
    inputs::CheckoutTarget,
    metadata::{self, ExportReport},
    output::Output,
};

/// Name the repository URL is registered under.
pub const REMOTE: &str = "origin";

/// Result of a successful clone run.
#[derive(Debug)]
pub struct CloneOutcome {
    /// Metadata publishing report, present only after a checkout.
    pub report: Option<ExportReport>,
}

/// Sequences `init`, `remote add`, `fetch`, `checkout` and submodule update
/// against a destination directory, then publishes commit metadata.
pub struct Cloner<'a> {
    /// Version-control tool.
    git: &'a dyn Git,
    /// Metadata sink.
    sink: &'a dyn ExportSink,
    /// Progress and diagnostics.
    output: &'a dyn Output,
    /// Overlay applied to `remote add` and every later invocation.
    transport_env: Vec<(String, String)>,
    /// Create missing parent directories of the destination.
    create_parents: bool,
}

impl<'a> Cloner<'a> {
    /// Orchestrator for the unauthenticated variant.
    pub fn new(git: &'a dyn Git, sink: &'a dyn ExportSink, output: &'a dyn Output) -> Self {
        Self {
            git,
            sink,
            output,
            transport_env: Vec::new(),
            create_parents: false,
        }
    }

    /// Switch to the authenticated variant: git transport goes through the
    /// helper script selected by `credentials`.
    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.transport_env = credentials.transport_env();
        self.create_parents = true;
        self
    }

    /// Clone `repository_url` into `destination` and check out `target`.
    ///
    /// A pull-request target switches the fetch to the special
    /// `origin pull/<id>/merge:<ref>` form. Without a target the run ends
    /// after fetch. Any failing step aborts the sequence. Metadata and
    /// output failures never do.
    pub fn clone_repository(
        &self,
        destination: &Path,
        target: Option<&CheckoutTarget>,
        repository_url: &str,
    ) -> Result<CloneOutcome> {
        self.prepare_destination(destination)?;

        self.step(destination, Step::Init, &["init"], &[])?;
        self.step(
            destination,
            Step::AddRemote,
            &["remote", "add", REMOTE, repository_url],
            &self.transport_env,
        )?;

        let refspec = target.and_then(CheckoutTarget::fetch_refspec);
        let mut fetch = vec!["fetch"];
        if let Some(refspec) = &refspec {
            fetch.extend([REMOTE, refspec.as_str()]);
        }
        self.step(destination, Step::Fetch, &fetch, &self.transport_env)?;

        let Some(target) = target else {
            let _ = self.output.message(
                "No checkout parameter (branch, tag, commit hash or pull-request ID) provided!",
            );
            return Ok(CloneOutcome { report: None });
        };

        let reference = target.reference();
        self.step(
            destination,
            Step::Checkout(reference.clone()),
            &["checkout", &reference],
            &self.transport_env,
        )?;
        self.step(
            destination,
            Step::SubmoduleUpdate,
            &["submodule", "update", "--init", "--recursive"],
            &self.transport_env,
        )?;

        let report = metadata::extract(
            self.git,
            destination,
            &self.transport_env,
            self.sink,
            self.output,
        );
        if report.is_degraded() {
            let _ = self
                .output
                .warn("Checked out, but some commit metadata could not be exported");
        } else {
            let _ = self.output.success(&format!("Checked out {reference}"));
        }

        Ok(CloneOutcome {
            report: Some(report),
        })
    }

    /// Refuse a destination that already holds `.git`, then create it if absent.
    fn prepare_destination(&self, destination: &Path) -> Result<()> {
        let git_dir = destination.join(".git");
        let create_err = |source| CloneError::CreateDir {
            path: destination.to_path_buf(),
            source,
        };

        if git_dir.try_exists().map_err(create_err)? {
            return Err(CloneError::AlreadyCloned { path: git_dir });
        }
        if destination.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(self.create_parents);
        #[cfg(unix)]
        builder.mode(0o777);
        builder.create(destination).map_err(create_err)
    }

    /// Run one step, labelling a failure with `step`.
    fn step(
        &self,
        dir: &Path,
        step: Step,
        args: &[&str],
        env: &[(String, String)],
    ) -> Result<()> {
        let _ = self.output.message(&format!("$ git {}", args.join(" ")));
        self.git
            .run(dir, args, env)
            .map_err(|source| CloneError::Step { step, source })
    }
}
