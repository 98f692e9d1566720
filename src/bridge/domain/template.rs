//! Typed agent command template.

use super::BridgeError;
use crate::shell;
use minijinja::{Environment, UndefinedBehavior};
use std::collections::BTreeMap;

/// Placeholder names a command template may reference.
pub const PLACEHOLDERS: [&str; 8] = [
    "worktree_path",
    "branch",
    "title",
    "description",
    "feedback",
    "issue_number",
    "task_id",
    "prompt",
];

/// Agent command line with named placeholders.
///
/// Templates use `minijinja` syntax with strict undefined handling, so a
/// placeholder the lookup cannot resolve fails rendering instead of
/// collapsing to an empty string. The `shell_quote` filter quotes a value
/// for POSIX shells.
///
/// # Examples
///
///     use gropius::bridge::domain::CommandTemplate;
///
///     let template = CommandTemplate::new("agent --cd {{ worktree_path | shell_quote }}")
///         .expect("template compiles");
///     let rendered = template
///         .render(|name| (name == "worktree_path").then(|| "/repo wt".to_owned()))
///         .expect("placeholders resolve");
///     assert_eq!(rendered, "agent --cd '/repo wt'");
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
}

impl CommandTemplate {
    /// Compiles a template.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Template`] for blank or syntactically invalid
    /// templates.
    pub fn new(source: impl Into<String>) -> Result<Self, BridgeError> {
        let text = source.into();
        if text.trim().is_empty() {
            return Err(BridgeError::Template("template is empty".to_owned()));
        }
        environment()
            .template_from_str(&text)
            .map_err(|err| BridgeError::Template(err.to_string()))?;
        Ok(Self { source: text })
    }

    /// Returns the template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template, resolving each placeholder through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Template`] when the template references a
    /// placeholder `lookup` does not resolve.
    pub fn render<F>(&self, lookup: F) -> Result<String, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let context: BTreeMap<&str, String> = PLACEHOLDERS
            .iter()
            .filter_map(|name| lookup(name).map(|value| (*name, value)))
            .collect();
        let rendered = environment()
            .render_str(&self.source, context)
            .map_err(|err| BridgeError::Template(err.to_string()))?;
        Ok(rendered.trim().to_owned())
    }
}

fn environment() -> Environment<'static> {
    let mut environment = Environment::new();
    environment.set_undefined_behavior(UndefinedBehavior::Strict);
    environment.add_filter("shell_quote", shell_quote);
    environment
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "minijinja passes filter arguments by value"
)]
fn shell_quote(value: String) -> String {
    shell::quote(&value).into_owned()
}
