//! Classified task input produced by intake.

use super::Priority;
use serde::{Deserialize, Serialize};

/// A classified task record ready to become a [`super::Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Free-text group label.
    #[serde(default)]
    pub group: String,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
}

impl TaskDraft {
    /// Creates a draft with default group and priority.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            group: String::new(),
            priority: Priority::default(),
        }
    }

    /// Sets the group label.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
