use std::{
    collections::BTreeMap,
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use thiserror::Error;

use crate::error::fmt_code;

/// A failed publish of one key.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The export tool could not be run or fed its value.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying error.
        source: io::Error,
    },

    /// The export tool exited unsuccessfully.
    #[error("{program} exited with status: {}", fmt_code(.code))]
    Exit {
        /// Program that was invoked.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
    },

    /// The export file could not be read or written.
    #[error("Failed to update export file {}: {source}", .path.display())]
    File {
        /// Export file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The existing export file is not a flat TOML string table.
    #[error("Failed to parse export file {}: {source}", .path.display())]
    Parse {
        /// Export file.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },

    /// The table could not be encoded.
    #[error("Failed to encode export file {}: {source}", .path.display())]
    Encode {
        /// Export file.
        path: PathBuf,
        /// Encoder error.
        source: toml::ser::Error,
    },
}

/// External key/value sink that commit metadata is published to.
pub trait ExportSink {
    /// Publish `value` under `key`.
    fn export(&self, key: &str, value: &str) -> Result<(), ExportError>;
}

/// Sink backed by `envman add --key <KEY>`, value fed on stdin.
#[derive(Debug, Clone)]
pub struct Envman {
    /// Program to run.
    program: String,
}

impl Envman {
    /// Use `envman` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("envman")
    }

    /// Use an explicit program in place of `envman`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Envman {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportSink for Envman {
    fn export(&self, key: &str, value: &str) -> Result<(), ExportError> {
        let spawn_err = |source| ExportError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(["add", "--key", key])
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        // A tool that exits without reading stdin is reported by its status.
        if let Some(mut stdin) = child.stdin.take()
            && let Err(source) = stdin.write_all(value.as_bytes())
            && source.kind() != io::ErrorKind::BrokenPipe
        {
            let _ = child.wait();
            return Err(spawn_err(source));
        }

        let status = child.wait().map_err(spawn_err)?;
        if !status.success() {
            return Err(ExportError::Exit {
                program: self.program.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Sink that keeps a flat TOML table of string values in a file.
///
/// Every export re-reads the file so that each key is published
/// independently.
#[derive(Debug, Clone)]
pub struct TomlFile {
    /// Table location.
    path: PathBuf,
}

impl TomlFile {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Table location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current table, empty when the file does not exist yet.
    pub fn read(&self) -> Result<BTreeMap<String, String>, ExportError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| ExportError::File {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ExportError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl ExportSink for TomlFile {
    fn export(&self, key: &str, value: &str) -> Result<(), ExportError> {
        let mut table = self.read()?;
        table.insert(key.to_string(), value.to_string());

        let encoded = toml::to_string(&table).map_err(|source| ExportError::Encode {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, encoded).map_err(|source| ExportError::File {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_toml_file_accumulates_keys() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let sink = TomlFile::new(temp_dir.path().join("exports.toml"));

        sink.export("GIT_CLONE_COMMIT_HASH", "abc123")?;
        sink.export("GIT_CLONE_COMMIT_MESSAGE_BODY", "line one\nline two")?;
        sink.export("GIT_CLONE_COMMIT_AUTHOR_NAME", "")?;

        let table = sink.read()?;
        assert_eq!(table.len(), 3);
        assert_eq!(table["GIT_CLONE_COMMIT_HASH"], "abc123");
        assert_eq!(table["GIT_CLONE_COMMIT_MESSAGE_BODY"], "line one\nline two");
        assert_eq!(table["GIT_CLONE_COMMIT_AUTHOR_NAME"], "");
        Ok(())
    }

    #[test]
    fn test_toml_file_overwrites_existing_key() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let sink = TomlFile::new(temp_dir.path().join("exports.toml"));

        sink.export("KEY", "first")?;
        sink.export("KEY", "second")?;
        assert_eq!(sink.read()?["KEY"], "second");
        Ok(())
    }

    #[test]
    fn test_toml_file_rejects_garbage() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("exports.toml");
        fs::write(&path, "this is = = not toml")?;

        let err = TomlFile::new(&path).export("KEY", "value").unwrap_err();
        assert!(matches!(err, ExportError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn test_toml_file_in_missing_directory_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let sink = TomlFile::new(temp_dir.path().join("missing").join("exports.toml"));
        let err = sink.export("KEY", "value").unwrap_err();
        assert!(matches!(err, ExportError::File { .. }));
        Ok(())
    }

    #[test]
    fn test_envman_missing_program_is_spawn_error() {
        let err = Envman::with_program("definitely-not-envman")
            .export("KEY", "value")
            .unwrap_err();
        assert!(matches!(err, ExportError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_envman_nonzero_exit_is_reported() {
        let err = Envman::with_program("false")
            .export("KEY", "value")
            .unwrap_err();
        assert!(matches!(err, ExportError::Exit { code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_envman_that_ignores_stdin_is_reaped_by_status() {
        // Larger than a pipe buffer, so the write fails once `true` exits.
        let value = "x".repeat(1 << 20);
        assert!(Envman::with_program("true").export("KEY", &value).is_ok());

        let err = Envman::with_program("false")
            .export("KEY", &value)
            .unwrap_err();
        assert!(matches!(err, ExportError::Exit { code: Some(1), .. }));
    }
}
