//! Deterministic slot path derivation.

use super::SlotId;

/// Derives the workspace path of `slot` from the repository root.
///
/// The slot directory is a sibling of the root named `<root>-wt-<id>`.
/// Separator style follows the root: a root containing a backslash or a
/// drive prefix yields a Windows-style path with `/` normalised to `\`,
/// anything else stays POSIX.
///
/// # Examples
///
///     use gropius::worktree::domain::{SlotId, derive_slot_path};
///
///     let slot = SlotId::new(2).expect("valid slot");
///     assert_eq!(derive_slot_path("/repo/", slot), "/repo-wt-2");
///     assert_eq!(derive_slot_path(r"C:\src\repo", slot), r"C:\src\repo-wt-2");
#[must_use]
pub fn derive_slot_path(root: &str, slot: SlotId) -> String {
    let trimmed_root = root.trim();
    let base = if is_windows_style(trimmed_root) {
        trimmed_root.replace('/', "\\")
    } else {
        trimmed_root.to_owned()
    };
    let stem = base.trim_end_matches(['/', '\\']);
    format!("{stem}-wt-{slot}")
}

fn is_windows_style(root: &str) -> bool {
    if root.contains('\\') {
        return true;
    }
    let mut chars = root.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}
