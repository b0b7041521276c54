use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Stdio},
};

use crate::error::GitError;

/// Invocation seam for the external version-control tool.
///
/// Every call names the working directory, a fixed argument vector and an
/// environment overlay applied to that child process only. The process
/// environment of the caller is never modified.
pub trait Git {
    /// Run `git <args>` with stdout and stderr inherited from the caller.
    /// Only the exit status is observed.
    fn run(&self, dir: &Path, args: &[&str], env: &[(String, String)]) -> Result<(), GitError>;

    /// Run `git <args>` and return its captured stdout.
    fn capture(
        &self,
        dir: &Path,
        args: &[&str],
        env: &[(String, String)],
    ) -> Result<String, GitError>;
}

/// [`Git`] implementation that spawns the real binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    /// Program to execute, `git` unless overridden.
    program: OsString,
}

impl SystemGit {
    /// Use `git` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use an explicit program in place of `git`.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build a command for `args` in `dir` with the overlay applied.
    fn command(&self, dir: &Path, args: &[&str], env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        cmd
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the command line used in error messages.
fn render(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

impl Git for SystemGit {
    fn run(&self, dir: &Path, args: &[&str], env: &[(String, String)]) -> Result<(), GitError> {
        let status = self
            .command(dir, args, env)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| GitError::Spawn {
                command: render(args),
                source,
            })?;

        if !status.success() {
            return Err(GitError::Exit {
                command: render(args),
                code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn capture(
        &self,
        dir: &Path,
        args: &[&str],
        env: &[(String, String)],
    ) -> Result<String, GitError> {
        let output = self
            .command(dir, args, env)
            .output()
            .map_err(|source| GitError::Spawn {
                command: render(args),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Exit {
                command: render(args),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
