//! Given steps for worktree lifecycle scenarios.

use super::world::{LifecycleWorld, Services};
use eyre::WrapErr;
use gropius::task::adapters::memory::TrackerOperation;
use gropius::task::ports::IssueTrackerError;
use rstest_bdd_macros::given;

#[given(r#"a slot pool of {count:u64} slots at "{root}""#)]
fn slot_pool(world: &mut LifecycleWorld, count: u64, root: String) -> Result<(), eyre::Report> {
    let slot_count = usize::try_from(count).wrap_err("slot count does not fit usize")?;
    world.services = Some(Services::new(slot_count, &root).wrap_err("wire services")?);
    Ok(())
}

#[given(r#"a formatted task "{title}""#)]
fn formatted_task(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.store_task(&title)?;
    Ok(())
}

#[given(r#"a task "{title}" with an issue"#)]
fn task_with_issue(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.store_task(&title)?;
    world.create_issue(&title).wrap_err("create issue")
}

#[given(r#"an active task "{title}""#)]
fn active_task(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.store_task(&title)?;
    world.create_issue(&title).wrap_err("create issue")?;
    world.create_worktree(&title).wrap_err("create worktree")
}

#[given(r#"a task "{title}" with an open pull request"#)]
fn task_with_pull_request(world: &mut LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    world.store_task(&title)?;
    world.create_issue(&title).wrap_err("create issue")?;
    world.create_worktree(&title).wrap_err("create worktree")?;
    world.implement(&title).wrap_err("run agent")?;
    world.open_pull_request(&title).wrap_err("open pull request")
}

#[given("the tracker refuses the next merge as not mergeable")]
fn tracker_refuses_merge(world: &mut LifecycleWorld) -> Result<(), eyre::Report> {
    world.services()?.tracker.fail_next(
        TrackerOperation::MergePullRequest,
        IssueTrackerError::MergeNotAllowed("Pull Request is not mergeable".to_owned()),
    );
    Ok(())
}
