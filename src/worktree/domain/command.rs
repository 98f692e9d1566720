//! Typed git workspace commands.

use crate::shell::quote;
use crate::task::domain::BranchName;

/// A git workspace operation rendered into one shell command line.
///
/// Every interpolated value goes through [`crate::shell::quote`], so the
/// rendered string is safe to hand to the bridge verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeCommand {
    /// Check out `branch` in a fresh worktree, creating it from `base` when
    /// no local branch of that name exists yet.
    Create {
        /// Repository root.
        repo_root: String,
        /// Workspace path.
        path: String,
        /// Branch to check out or create.
        branch: BranchName,
        /// Branch a new branch starts from.
        base: String,
    },
    /// Fetch an existing branch and check out its remote head in a fresh
    /// worktree, resetting the local branch to match.
    Reopen {
        /// Repository root.
        repo_root: String,
        /// Workspace path.
        path: String,
        /// Existing branch.
        branch: BranchName,
    },
    /// Forcefully remove a worktree and prune stale registrations.
    Remove {
        /// Repository root.
        repo_root: String,
        /// Workspace path.
        path: String,
    },
    /// Stage everything, commit when there are staged changes, and push.
    Push {
        /// Workspace path.
        path: String,
        /// Branch to push.
        branch: BranchName,
        /// Commit message for staged changes.
        message: String,
        /// Push with `--force-with-lease`.
        force_with_lease: bool,
    },
}

impl WorktreeCommand {
    /// Renders the command line.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Create {
                repo_root,
                path,
                branch,
                base,
            } => {
                let git = git_in(repo_root);
                let quoted_branch = quote(branch.as_str());
                let path = quote(path);
                format!(
                    "if {git} show-ref --verify --quiet {local_ref}; \
                     then {git} worktree add {path} {quoted_branch}; \
                     else {git} worktree add -b {quoted_branch} {path} {base}; fi",
                    local_ref = quote(&format!("refs/heads/{}", branch.as_str())),
                    base = quote(base),
                )
            }
            Self::Reopen {
                repo_root,
                path,
                branch,
            } => {
                let git = git_in(repo_root);
                let quoted_branch = quote(branch.as_str());
                format!(
                    "{git} fetch origin {quoted_branch} && {git} worktree add -B {quoted_branch} {path} {remote}",
                    path = quote(path),
                    remote = quote(&format!("origin/{}", branch.as_str())),
                )
            }
            Self::Remove { repo_root, path } => {
                let git = git_in(repo_root);
                format!(
                    "{git} worktree remove --force {path} && {git} worktree prune",
                    path = quote(path),
                )
            }
            Self::Push {
                path,
                branch,
                message,
                force_with_lease,
            } => {
                let git = git_in(path);
                let lease = if *force_with_lease {
                    " --force-with-lease"
                } else {
                    ""
                };
                format!(
                    "{git} add -A && ({git} diff --cached --quiet || {git} commit -m {message}) && {git} push{lease} -u origin {branch}",
                    message = quote(message),
                    branch = quote(branch.as_str()),
                )
            }
        }
    }

    /// Returns the directory the command should run in.
    #[must_use]
    pub fn working_directory(&self) -> &str {
        match self {
            Self::Create { repo_root, .. }
            | Self::Reopen { repo_root, .. }
            | Self::Remove { repo_root, .. } => repo_root,
            Self::Push { path, .. } => path,
        }
    }
}

fn git_in(directory: &str) -> String {
    format!("git -C {}", quote(directory))
}
