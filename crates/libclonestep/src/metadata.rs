use std::path::Path;

use crate::{
    error::GitError,
    export::{ExportError, ExportSink},
    git::Git,
    output::Output,
};

/// One of the seven commit attributes published after checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    /// Full commit hash.
    Hash,
    /// First line of the commit message.
    Subject,
    /// Commit message after the subject.
    Body,
    /// Author name.
    AuthorName,
    /// Author email.
    AuthorEmail,
    /// Committer name.
    CommitterName,
    /// Committer email.
    CommitterEmail,
}

impl MetadataField {
    /// Every field, in publishing order.
    pub const ALL: [Self; 7] = [
        Self::Hash,
        Self::Subject,
        Self::Body,
        Self::AuthorName,
        Self::AuthorEmail,
        Self::CommitterName,
        Self::CommitterEmail,
    ];

    /// Exported key name.
    pub fn key(self) -> &'static str {
        match self {
            Self::Hash => "GIT_CLONE_COMMIT_HASH",
            Self::Subject => "GIT_CLONE_COMMIT_MESSAGE_SUBJECT",
            Self::Body => "GIT_CLONE_COMMIT_MESSAGE_BODY",
            Self::AuthorName => "GIT_CLONE_COMMIT_AUTHOR_NAME",
            Self::AuthorEmail => "GIT_CLONE_COMMIT_AUTHOR_EMAIL",
            Self::CommitterName => "GIT_CLONE_COMMIT_COMMITTER_NAME",
            Self::CommitterEmail => "GIT_CLONE_COMMIT_COMMITTER_EMAIL",
        }
    }

    /// `git log --format` placeholder for this field.
    pub fn format(self) -> &'static str {
        match self {
            Self::Hash => "%H",
            Self::Subject => "%s",
            Self::Body => "%b",
            Self::AuthorName => "%an",
            Self::AuthorEmail => "%ae",
            Self::CommitterName => "%cn",
            Self::CommitterEmail => "%ce",
        }
    }
}

/// Attributes of the checked-out `HEAD` commit. `None` marks a failed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMetadata {
    /// Full commit hash.
    pub hash: Option<String>,
    /// Message subject.
    pub subject: Option<String>,
    /// Message body.
    pub body: Option<String>,
    /// Author name.
    pub author_name: Option<String>,
    /// Author email.
    pub author_email: Option<String>,
    /// Committer name.
    pub committer_name: Option<String>,
    /// Committer email.
    pub committer_email: Option<String>,
}

impl CommitMetadata {
    /// Value of `field`, if its query succeeded.
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Hash => self.hash.as_deref(),
            MetadataField::Subject => self.subject.as_deref(),
            MetadataField::Body => self.body.as_deref(),
            MetadataField::AuthorName => self.author_name.as_deref(),
            MetadataField::AuthorEmail => self.author_email.as_deref(),
            MetadataField::CommitterName => self.committer_name.as_deref(),
            MetadataField::CommitterEmail => self.committer_email.as_deref(),
        }
    }

    /// Mutable slot for `field`.
    fn slot(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::Hash => &mut self.hash,
            MetadataField::Subject => &mut self.subject,
            MetadataField::Body => &mut self.body,
            MetadataField::AuthorName => &mut self.author_name,
            MetadataField::AuthorEmail => &mut self.author_email,
            MetadataField::CommitterName => &mut self.committer_name,
            MetadataField::CommitterEmail => &mut self.committer_email,
        }
    }

    /// Query every field of `HEAD` in `dir`. Failed queries are left `None`
    /// and returned alongside.
    pub fn query(
        git: &dyn Git,
        dir: &Path,
        env: &[(String, String)],
    ) -> (Self, Vec<(MetadataField, GitError)>) {
        let mut metadata = Self::default();
        let mut failures = Vec::new();
        for field in MetadataField::ALL {
            match git.capture(dir, &["log", "-1", "--format", field.format()], env) {
                Ok(out) => {
                    *metadata.slot(field) = Some(out.trim_end_matches(['\n', '\r']).to_string());
                }
                Err(err) => failures.push((field, err)),
            }
        }
        (metadata, failures)
    }
}

/// What happened to one metadata key.
#[derive(Debug)]
pub struct KeyOutcome {
    /// The field.
    pub field: MetadataField,
    /// Value that was published, empty when the query failed.
    pub value: String,
    /// Why the query failed, if it did.
    pub query_error: Option<GitError>,
    /// Why the publish failed, if it did.
    pub export_error: Option<ExportError>,
}

impl KeyOutcome {
    /// Both the query and the publish succeeded.
    pub fn is_ok(&self) -> bool {
        self.query_error.is_none() && self.export_error.is_none()
    }
}

/// Result of a metadata run. Always produced, even when every key failed.
#[derive(Debug)]
pub struct ExportReport {
    /// Queried values.
    pub metadata: CommitMetadata,
    /// One entry per field, in [`MetadataField::ALL`] order.
    pub outcomes: Vec<KeyOutcome>,
}

impl ExportReport {
    /// Whether any key failed to query or publish.
    pub fn is_degraded(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_ok())
    }
}

/// Query the seven attributes of `HEAD` and publish each to `sink`.
///
/// Failures are reported as warnings and recorded in the returned report;
/// they never abort the remaining keys.
pub fn extract(
    git: &dyn Git,
    dir: &Path,
    env: &[(String, String)],
    sink: &dyn ExportSink,
    output: &dyn Output,
) -> ExportReport {
    let (metadata, mut failures) = CommitMetadata::query(git, dir, env);

    let mut outcomes = Vec::with_capacity(MetadataField::ALL.len());
    for field in MetadataField::ALL {
        let query_error = failures
            .iter()
            .position(|(f, _)| *f == field)
            .map(|idx| failures.swap_remove(idx).1);
        if let Some(err) = &query_error {
            let _ = output.warn(&format!("Failed to query {}: {err}", field.key()));
        }

        let value = metadata.get(field).unwrap_or_default().to_string();
        let export_error = sink.export(field.key(), &value).err();
        if let Some(err) = &export_error {
            let _ = output.warn(&format!("Failed to export output ({}): {err}", field.key()));
        }

        outcomes.push(KeyOutcome {
            field,
            value,
            query_error,
            export_error,
        });
    }

    ExportReport { metadata, outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Quiet;
    use std::{cell::RefCell, collections::HashMap};

    /// Answers `git log` queries from a table; formats absent from it fail.
    struct TableGit {
        answers: HashMap<&'static str, &'static str>,
    }

    impl Git for TableGit {
        fn run(
            &self,
            _dir: &Path,
            _args: &[&str],
            _env: &[(String, String)],
        ) -> Result<(), GitError> {
            Ok(())
        }

        fn capture(
            &self,
            _dir: &Path,
            args: &[&str],
            _env: &[(String, String)],
        ) -> Result<String, GitError> {
            let format = args.last().copied().unwrap_or_default();
            self.answers
                .get(format)
                .map(|v| v.to_string())
                .ok_or_else(|| GitError::Exit {
                    command: format!("git {}", args.join(" ")),
                    code: Some(128),
                    stderr: "fatal: simulated".to_string(),
                })
        }
    }

    /// Records exports, failing for one key.
    #[derive(Default)]
    struct RecordingSink {
        published: RefCell<Vec<(String, String)>>,
        reject: Option<&'static str>,
    }

    impl ExportSink for RecordingSink {
        fn export(&self, key: &str, value: &str) -> Result<(), ExportError> {
            self.published
                .borrow_mut()
                .push((key.to_string(), value.to_string()));
            if self.reject == Some(key) {
                return Err(ExportError::Exit {
                    program: "envman".to_string(),
                    code: Some(1),
                });
            }
            Ok(())
        }
    }

    fn full_answers() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("%H", "0123456789abcdef0123456789abcdef01234567\n"),
            ("%s", "Add feature\n"),
            ("%b", "Longer body\n\nwith paragraphs\n\n"),
            ("%an", "Ada Author\n"),
            ("%ae", "ada@example.com\n"),
            ("%cn", "Carl Committer\n"),
            ("%ce", "carl@example.com\n"),
        ])
    }

    #[test]
    fn test_keys_and_formats_are_distinct() {
        let mut keys: Vec<_> = MetadataField::ALL.iter().map(|f| f.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 7);

        let mut formats: Vec<_> = MetadataField::ALL.iter().map(|f| f.format()).collect();
        formats.sort_unstable();
        formats.dedup();
        assert_eq!(formats.len(), 7);
    }

    #[test]
    fn test_all_keys_published_with_trimmed_values() {
        let git = TableGit {
            answers: full_answers(),
        };
        let sink = RecordingSink::default();
        let report = extract(&git, Path::new("/repo"), &[], &sink, &Quiet);

        assert!(!report.is_degraded());
        let published = sink.published.borrow();
        assert_eq!(published.len(), 7);
        assert!(published.contains(&(
            "GIT_CLONE_COMMIT_MESSAGE_SUBJECT".to_string(),
            "Add feature".to_string()
        )));
        assert!(published.contains(&(
            "GIT_CLONE_COMMIT_MESSAGE_BODY".to_string(),
            "Longer body\n\nwith paragraphs".to_string()
        )));
        assert_eq!(
            report.metadata.get(MetadataField::CommitterEmail),
            Some("carl@example.com")
        );
    }

    #[test]
    fn test_failed_query_publishes_empty_string() {
        let mut answers = full_answers();
        answers.remove("%ae");
        let git = TableGit { answers };
        let sink = RecordingSink::default();
        let report = extract(&git, Path::new("/repo"), &[], &sink, &Quiet);

        assert!(report.is_degraded());
        let published = sink.published.borrow();
        assert_eq!(published.len(), 7);
        assert!(published.contains(&("GIT_CLONE_COMMIT_AUTHOR_EMAIL".to_string(), String::new())));

        let outcome = report
            .outcomes
            .iter()
            .find(|o| o.field == MetadataField::AuthorEmail)
            .unwrap();
        assert!(outcome.query_error.is_some());
        assert!(outcome.export_error.is_none());
        assert_eq!(report.metadata.author_email, None);
        assert_eq!(report.metadata.author_name.as_deref(), Some("Ada Author"));
    }

    #[test]
    fn test_every_query_failing_still_attempts_every_key() {
        let git = TableGit {
            answers: HashMap::new(),
        };
        let sink = RecordingSink::default();
        let report = extract(&git, Path::new("/repo"), &[], &sink, &Quiet);

        assert_eq!(report.outcomes.len(), 7);
        assert!(report.outcomes.iter().all(|o| o.query_error.is_some()));
        assert!(sink.published.borrow().iter().all(|(_, v)| v.is_empty()));
        assert_eq!(report.metadata, CommitMetadata::default());
    }

    #[test]
    fn test_publish_failure_does_not_block_remaining_keys() {
        let git = TableGit {
            answers: full_answers(),
        };
        let sink = RecordingSink {
            reject: Some("GIT_CLONE_COMMIT_HASH"),
            ..RecordingSink::default()
        };
        let report = extract(&git, Path::new("/repo"), &[], &sink, &Quiet);

        assert_eq!(sink.published.borrow().len(), 7);
        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.field)
            .collect();
        assert_eq!(failed, vec![MetadataField::Hash]);
    }
}
