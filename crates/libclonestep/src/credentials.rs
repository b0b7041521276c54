#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{CloneError, Result};

/// Environment name of the private key secret.
pub const SSH_PRIVATE_KEY: &str = "auth_ssh_private_key";

/// Directory, relative to home, holding the key and installed helpers.
pub const SSH_DIR: &str = ".ssh";

/// Location of the persisted key, relative to the home directory.
pub const KEY_FILE: &str = ".ssh/clonestep_ssh_key";

/// SSH wrapper used when no key is supplied.
pub const SSH_HELPER: &str = "ssh_no_prompt.sh";

/// SSH wrapper used when a key was persisted to [`KEY_FILE`].
pub const SSH_HELPER_WITH_KEY: &str = "ssh_no_prompt_with_id.sh";

const SSH_HELPER_SCRIPT: &str = include_str!("../scripts/ssh_no_prompt.sh");
const SSH_HELPER_WITH_KEY_SCRIPT: &str = include_str!("../scripts/ssh_no_prompt_with_id.sh");

/// Transport authentication for the authenticated variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Helper script name git should use as its SSH command.
    helper: &'static str,
    /// Full path of the helper script.
    helper_path: PathBuf,
    /// Where the key was written, if one was supplied.
    key_path: Option<PathBuf>,
}

impl Credentials {
    /// Persist `ssh_key` (if non-empty) under `home` and select the helper
    /// script.
    ///
    /// With `helper_dir` the script must already exist there. Without it the
    /// bundled script is installed into `~/.ssh`. `home` is only required
    /// when a key is written or a helper is installed.
    pub fn prepare(
        ssh_key: Option<&str>,
        home: Option<PathBuf>,
        helper_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let key = ssh_key.filter(|k| !k.is_empty());
        let helper = if key.is_some() {
            SSH_HELPER_WITH_KEY
        } else {
            SSH_HELPER
        };

        let key_path = match key {
            Some(key) => {
                let path = home.as_deref().ok_or(CloneError::HomeDir)?.join(KEY_FILE);
                write_key(&path, key)?;
                Some(path)
            }
            None => None,
        };

        let helper_path = match helper_dir {
            Some(dir) => {
                let path = dir.join(helper);
                if !path.is_file() {
                    return Err(CloneError::MissingHelper { path });
                }
                path
            }
            None => {
                let path = home
                    .as_deref()
                    .ok_or(CloneError::HomeDir)?
                    .join(SSH_DIR)
                    .join(helper);
                install_helper(&path, helper)?;
                path
            }
        };

        Ok(Self {
            helper,
            helper_path,
            key_path,
        })
    }

    /// [`Self::prepare`] against the invoking user's home directory.
    pub fn prepare_for_user(ssh_key: Option<&str>, helper_dir: Option<PathBuf>) -> Result<Self> {
        Self::prepare(ssh_key, dirs::home_dir(), helper_dir)
    }

    /// Name of the selected helper script.
    pub fn helper(&self) -> &'static str {
        self.helper
    }

    /// Full path of the selected helper script.
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// Path of the persisted key, if any.
    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }

    /// Environment overlay for git invocations that may hit the network.
    pub fn transport_env(&self) -> Vec<(String, String)> {
        vec![
            ("GIT_ASKPASS".to_string(), "echo".to_string()),
            (
                "GIT_SSH".to_string(),
                self.helper_path.to_string_lossy().into_owned(),
            ),
        ]
    }
}

/// Write the key with default permissions, creating the parent directory.
fn write_key(path: &Path, key: &str) -> Result<()> {
    let to_err = |source| CloneError::WriteKey {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    fs::write(path, key).map_err(to_err)
}

/// Write the bundled script for `helper` to `path` and mark it executable.
fn install_helper(path: &Path, helper: &str) -> Result<()> {
    let script = if helper == SSH_HELPER_WITH_KEY {
        SSH_HELPER_WITH_KEY_SCRIPT
    } else {
        SSH_HELPER_SCRIPT
    };
    let to_err = |source| CloneError::InstallHelper {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    fs::write(path, script).map_err(to_err)?;
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(to_err)?;
    Ok(())
}
