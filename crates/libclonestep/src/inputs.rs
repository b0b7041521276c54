use std::path::{self, PathBuf};

use url::{ParseError, Url};

use crate::{
    error::{CloneError, Result},
    output::Output,
};

/// Environment name of the repository URL.
pub const REPOSITORY_URL: &str = "repository_url";
/// Environment name of the destination directory.
pub const CLONE_INTO_DIR: &str = "clone_into_dir";
/// Environment name of the pull-request id.
pub const PULL_REQUEST_ID: &str = "pull_request_id";
/// Environment name of the commit hash.
pub const COMMIT: &str = "commit";
/// Environment name of the tag.
pub const TAG: &str = "tag";
/// Environment name of the branch.
pub const BRANCH: &str = "branch";

/// Which hint a [`CheckoutTarget`] was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Server-side merge ref of a pull request.
    PullRequest,
    /// A commit hash. Checks out detached.
    Commit,
    /// A tag name. Checks out detached.
    Tag,
    /// A branch name.
    Branch,
}

/// The single ref the working tree is switched to after fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutTarget {
    /// Hint the target came from.
    kind: TargetKind,
    /// The hint value as supplied.
    hint: String,
}

impl CheckoutTarget {
    /// Build a target of `kind` from a hint value.
    pub fn new(kind: TargetKind, hint: impl Into<String>) -> Self {
        Self {
            kind,
            hint: hint.into(),
        }
    }

    /// Hint the target came from.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// The hint value as supplied.
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Ref passed to `git checkout`. For pull requests this is the local
    /// ref the merge ref is fetched into.
    pub fn reference(&self) -> String {
        match self.kind {
            TargetKind::PullRequest => format!("pull/{}", self.hint),
            _ => self.hint.clone(),
        }
    }

    /// Refspec for the special pull-request fetch, `None` for every other kind.
    pub fn fetch_refspec(&self) -> Option<String> {
        match self.kind {
            TargetKind::PullRequest => Some(format!(
                "pull/{}/merge:{}",
                self.hint,
                self.reference()
            )),
            _ => None,
        }
    }
}

/// The four optional, mutually exclusive checkout hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutHints {
    /// Pull-request id.
    pub pull_request_id: Option<String>,
    /// Commit hash.
    pub commit: Option<String>,
    /// Tag name.
    pub tag: Option<String>,
    /// Branch name.
    pub branch: Option<String>,
}

impl CheckoutHints {
    /// Hints in priority order, highest first.
    fn prioritized(&self) -> [(Option<&str>, TargetKind); 4] {
        [
            (self.pull_request_id.as_deref(), TargetKind::PullRequest),
            (self.commit.as_deref(), TargetKind::Commit),
            (self.tag.as_deref(), TargetKind::Tag),
            (self.branch.as_deref(), TargetKind::Branch),
        ]
    }

    /// Select the first non-empty hint in priority order.
    pub fn resolve(&self) -> Option<CheckoutTarget> {
        self.prioritized()
            .into_iter()
            .find_map(|(hint, kind)| match hint {
                Some(value) if !value.is_empty() => Some(CheckoutTarget::new(kind, value)),
                _ => None,
            })
    }
}

/// Input values as read from the calling environment, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    /// Repository URL.
    pub repository_url: Option<String>,
    /// Destination directory, possibly relative.
    pub clone_into_dir: Option<String>,
    /// Checkout hints.
    pub hints: CheckoutHints,
}

impl RawInputs {
    /// Read every input through `lookup`. Empty values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Self {
            repository_url: get(REPOSITORY_URL),
            clone_into_dir: get(CLONE_INTO_DIR),
            hints: CheckoutHints {
                pull_request_id: get(PULL_REQUEST_ID),
                commit: get(COMMIT),
                tag: get(TAG),
                branch: get(BRANCH),
            },
        }
    }
}

/// Validated inputs for a clone run.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Validated repository location, passed to `git remote add` as given.
    pub repository_url: String,
    /// Absolute destination directory.
    pub clone_into_dir: PathBuf,
    /// Effective checkout target, if any hint was given.
    pub target: Option<CheckoutTarget>,
}

impl Inputs {
    /// Validate required inputs, normalize the destination and resolve the
    /// checkout target. A missing target is only a warning.
    pub fn resolve(raw: RawInputs, output: &dyn Output) -> Result<Self> {
        let repository_url = require(raw.repository_url, REPOSITORY_URL)?;
        let clone_into_dir = require(raw.clone_into_dir, CLONE_INTO_DIR)?;

        let absolute =
            path::absolute(&clone_into_dir).map_err(|source| CloneError::InvalidPath {
                path: clone_into_dir.clone(),
                source,
            })?;

        validate_url(&repository_url)?;

        let target = raw.hints.resolve();
        if target.is_none() {
            let _ = output.warn("No checkout parameter found");
        }

        Ok(Self {
            repository_url,
            clone_into_dir: absolute,
            target,
        })
    }
}

/// Accept absolute URLs and scheme-less references such as local paths or
/// `host/org/repo.git`. A reference whose first segment holds a colon is
/// rejected, which covers scp-style `user@host:path`.
fn validate_url(url: &str) -> Result<()> {
    match Url::parse(url) {
        Ok(_) => Ok(()),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let first_segment = url.split('/').next().unwrap_or_default();
            if first_segment.contains(':') {
                return Err(CloneError::ColonInFirstSegment {
                    url: url.to_string(),
                });
            }
            Ok(())
        }
        Err(source) => Err(CloneError::InvalidUrl {
            url: url.to_string(),
            source,
        }),
    }
}

/// Fail with [`CloneError::MissingInput`] unless `value` is present and non-empty.
fn require(value: Option<String>, name: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(CloneError::MissingInput { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ClosedStream, Quiet};
    use anyhow::Result;
    use std::{collections::HashMap, env};

    fn hints(pr: &str, commit: &str, tag: &str, branch: &str) -> CheckoutHints {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        CheckoutHints {
            pull_request_id: opt(pr),
            commit: opt(commit),
            tag: opt(tag),
            branch: opt(branch),
        }
    }

    fn raw(vars: &[(&str, &str)]) -> RawInputs {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawInputs::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_highest_priority_hint_wins_for_every_combination() {
        for mask in 0u8..16 {
            let pick = |bit: u8, value: &'static str| if mask & bit != 0 { value } else { "" };
            let h = hints(pick(8, "42"), pick(4, "abc123"), pick(2, "v1.0"), pick(1, "main"));

            let expected = if mask & 8 != 0 {
                Some(CheckoutTarget::new(TargetKind::PullRequest, "42"))
            } else if mask & 4 != 0 {
                Some(CheckoutTarget::new(TargetKind::Commit, "abc123"))
            } else if mask & 2 != 0 {
                Some(CheckoutTarget::new(TargetKind::Tag, "v1.0"))
            } else if mask & 1 != 0 {
                Some(CheckoutTarget::new(TargetKind::Branch, "main"))
            } else {
                None
            };
            assert_eq!(h.resolve(), expected, "mask {mask:04b}");
        }
    }

    #[test]
    fn test_pull_request_beats_branch() {
        let target = hints("42", "", "", "main").resolve().unwrap();
        assert_eq!(target.kind(), TargetKind::PullRequest);
        assert_eq!(target.reference(), "pull/42");
        assert_eq!(target.fetch_refspec().as_deref(), Some("pull/42/merge:pull/42"));
    }

    #[test]
    fn test_non_pull_request_targets_have_no_refspec() {
        for target in [
            CheckoutTarget::new(TargetKind::Commit, "abc123"),
            CheckoutTarget::new(TargetKind::Tag, "v1.0"),
            CheckoutTarget::new(TargetKind::Branch, "main"),
        ] {
            assert_eq!(target.fetch_refspec(), None);
            assert_eq!(target.reference(), target.hint());
        }
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let r = raw(&[
            (REPOSITORY_URL, "https://example.com/r.git"),
            (CLONE_INTO_DIR, "/tmp/out"),
            (PULL_REQUEST_ID, ""),
            (BRANCH, "main"),
        ]);
        assert_eq!(r.hints.pull_request_id, None);
        assert_eq!(
            r.hints.resolve(),
            Some(CheckoutTarget::new(TargetKind::Branch, "main"))
        );
    }

    #[test]
    fn test_missing_required_inputs() {
        let err = Inputs::resolve(raw(&[(CLONE_INTO_DIR, "/tmp/out")]), &Quiet).unwrap_err();
        assert!(matches!(err, CloneError::MissingInput { name } if name == REPOSITORY_URL));

        let err = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "https://example.com/r.git"),
                (CLONE_INTO_DIR, ""),
            ]),
            &Quiet,
        )
        .unwrap_err();
        assert!(matches!(err, CloneError::MissingInput { name } if name == CLONE_INTO_DIR));
        assert_eq!(err.to_string(), "Missing required input: clone_into_dir");
    }

    #[test]
    fn test_relative_destination_becomes_absolute() -> Result<()> {
        let inputs = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "https://example.com/r.git"),
                (CLONE_INTO_DIR, "out/src"),
            ]),
            &Quiet,
        )?;
        assert!(inputs.clone_into_dir.is_absolute());
        assert_eq!(inputs.clone_into_dir, env::current_dir()?.join("out/src"));
        assert_eq!(inputs.target, None);
        Ok(())
    }

    #[test]
    fn test_malformed_url_is_fatal() {
        let err = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "git@github.com:org/repo.git"),
                (CLONE_INTO_DIR, "/tmp/out"),
            ]),
            &Quiet,
        )
        .unwrap_err();
        assert!(matches!(err, CloneError::ColonInFirstSegment { .. }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "Failed to parse repo url (git@github.com:org/repo.git): \
             first path segment in URL cannot contain colon"
        );

        let err = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "https://exa mple.com/r.git"),
                (CLONE_INTO_DIR, "/tmp/out"),
            ]),
            &Quiet,
        )
        .unwrap_err();
        assert!(matches!(err, CloneError::InvalidUrl { .. }));
    }

    #[test]
    fn test_url_is_passed_through_as_given() -> Result<()> {
        for input in [
            "https://example.com/r.git",
            "https://Example.COM",
            "ssh://git@github.com/org/repo.git",
            "file:///srv/git/project.git",
            "https://user@example.com:8443/a/b/c.git",
            "/srv/git/project.git",
            "../source",
            "github.com/org/repo.git",
        ] {
            let inputs = Inputs::resolve(
                raw(&[(REPOSITORY_URL, input), (CLONE_INTO_DIR, "/tmp/out")]),
                &Quiet,
            )?;
            assert_eq!(inputs.repository_url, input);
        }
        Ok(())
    }

    #[test]
    fn test_unwritable_warning_does_not_fail_resolution() -> Result<()> {
        let inputs = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "https://example.com/r.git"),
                (CLONE_INTO_DIR, "/tmp/out"),
            ]),
            &ClosedStream,
        )?;
        assert_eq!(inputs.target, None);
        Ok(())
    }

    #[test]
    fn test_end_to_end_branch_inputs() -> Result<()> {
        let inputs = Inputs::resolve(
            raw(&[
                (REPOSITORY_URL, "https://example.com/r.git"),
                (CLONE_INTO_DIR, "/tmp/out"),
                (BRANCH, "main"),
            ]),
            &Quiet,
        )?;
        assert_eq!(inputs.repository_url, "https://example.com/r.git");
        assert_eq!(inputs.clone_into_dir, PathBuf::from("/tmp/out"));
        assert_eq!(inputs.target.map(|t| t.reference()).as_deref(), Some("main"));
        Ok(())
    }
}
