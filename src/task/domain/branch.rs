//! Branch-name value object and deterministic naming for task branches.

use super::{IssueNumber, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a validated branch name.
const MAX_BRANCH_NAME_LENGTH: usize = 200;

/// Maximum length of the title slug embedded in generated branch names.
const MAX_SLUG_LENGTH: usize = 40;

/// Prefix shared by every branch created for a task workspace.
const TASK_BRANCH_PREFIX: &str = "task";

/// Validated Git branch name.
///
/// Branch names must be non-empty after trimming and must not contain
/// whitespace, colons, `..` sequences or exceed `MAX_BRANCH_NAME_LENGTH`
/// characters. Those are the `git check-ref-format` rules that also keep the
/// value safe to splice into workspace commands.
///
/// # Examples
///
///     use gropius::task::domain::BranchName;
///
///     let name = BranchName::new("task/12-fix-login").expect("valid");
///     assert_eq!(name.as_str(), "task/12-fix-login");
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidBranchName`] when the value breaks
    /// any of the naming rules.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        if Self::is_invalid_branch_name(normalized) {
            return Err(TaskDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Derives the workspace branch for an issue-backed task.
    ///
    /// The result has the form `task/<issue>-<slug>` where the slug keeps the
    /// lowercase ASCII alphanumerics of the title joined by single dashes.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidBranchName`] if the derived value is
    /// invalid, which cannot happen for positive issue numbers.
    pub fn for_issue(issue_number: IssueNumber, title: &str) -> Result<Self, TaskDomainError> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Self::new(format!("{TASK_BRANCH_PREFIX}/{issue_number}"));
        }
        Self::new(format!("{TASK_BRANCH_PREFIX}/{issue_number}-{slug}"))
    }

    fn is_invalid_branch_name(name: &str) -> bool {
        let is_empty = name.is_empty();
        let contains_forbidden_char = name
            .chars()
            .any(|ch| ch == ':' || ch.is_whitespace() || ch.is_control());
        let contains_parent_sequence = name.contains("..");
        let exceeds_length_limit = name.len() > MAX_BRANCH_NAME_LENGTH;

        is_empty || contains_forbidden_char || contains_parent_sequence || exceeds_length_limit
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(MAX_SLUG_LENGTH);
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
            if slug.len() >= MAX_SLUG_LENGTH {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_LENGTH);
    slug.trim_end_matches('-').to_owned()
}
