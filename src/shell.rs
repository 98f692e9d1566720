//! POSIX shell quoting shared by workspace and agent command builders.
//!
//! Every command sent to the automation bridge is a single shell string, so
//! all interpolated values (paths, branch names, prompts) pass through
//! [`quote`] before they are spliced in.

use std::borrow::Cow;

/// Quotes a value for safe inclusion in a POSIX shell command.
///
/// Values made only of characters the shell never interprets are returned
/// unchanged; everything else is wrapped in single quotes with embedded
/// quotes rewritten as `'\''`.
#[must_use]
pub fn quote(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    Cow::Owned(quoted)
}

/// Quotes each argument and joins them with single spaces.
#[must_use]
pub fn join<'a>(args: impl IntoIterator<Item = &'a str>) -> String {
    args.into_iter()
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

const fn is_shell_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ',' | '+')
}
