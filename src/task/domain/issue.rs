//! Issue value objects exchanged with the external issue tracker.

use super::{IssueNumber, Priority, Task};
use serde::{Deserialize, Serialize};

/// Reference to an issue that exists upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    number: IssueNumber,
    url: String,
}

impl IssueRef {
    /// Creates an issue reference.
    #[must_use]
    pub fn new(number: IssueNumber, url: impl Into<String>) -> Self {
        Self {
            number,
            url: url.into(),
        }
    }

    /// Returns the issue number.
    #[must_use]
    pub const fn number(&self) -> IssueNumber {
        self.number
    }

    /// Returns the browser URL of the issue.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Payload for creating an issue from a formatted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    /// Issue title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Labels to apply.
    pub labels: Vec<String>,
}

impl IssueDraft {
    /// Builds the issue payload for a task.
    ///
    /// The task group and priority become labels so the tracker view mirrors
    /// the local classification.
    #[must_use]
    pub fn for_task(task: &Task) -> Self {
        let mut labels = Vec::with_capacity(2);
        let group = task.group().trim();
        if !group.is_empty() {
            labels.push(group.to_owned());
        }
        labels.push(priority_label(task.priority()));

        Self {
            title: task.title().to_owned(),
            body: task.description().to_owned(),
            labels,
        }
    }
}

fn priority_label(priority: Priority) -> String {
    format!("priority:{}", priority.as_str())
}

/// Open issue as listed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIssue {
    /// Issue reference.
    pub issue: IssueRef,
    /// Issue title.
    pub title: String,
    /// Issue body, empty when none was provided.
    pub body: String,
    /// Labels currently applied.
    pub labels: Vec<String>,
}
