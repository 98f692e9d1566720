//! When steps for worktree lifecycle scenarios.

use super::world::{LifecycleWorld, run_async};
use eyre::WrapErr;
use gropius::task::services::MergeOutcome;
use rstest_bdd_macros::when;

#[when(r#"the issue and worktree are created for "{title}""#)]
fn issue_and_worktree(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.create_issue(&title).wrap_err("create issue")?;
    world.create_worktree(&title).wrap_err("create worktree")
}

#[when(r#"the agent implements "{title}""#)]
fn agent_implements(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.implement(&title)
}

#[when(r#""{title}" is pushed with a pull request"#)]
fn pushed_with_pull_request(
    world: &mut LifecycleWorld,
    title: String,
) -> Result<(), eyre::Report> {
    world.open_pull_request(&title)
}

#[when(r#"the pull request for "{title}" is merged"#)]
fn pull_request_merged(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&title)?;
    let outcome = run_async(world.services()?.lifecycle.merge(&task_id)).wrap_err("merge")?;
    if let MergeOutcome::Conflicted { recovery, .. } = outcome {
        world.last_recovery = Some(recovery);
    }
    Ok(())
}

#[when(r#"a worktree is requested for "{title}""#)]
fn worktree_requested(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&title)?;
    let result = run_async(world.services()?.lifecycle.create_worktree(&task_id));
    world.last_error = result.err();
    Ok(())
}
