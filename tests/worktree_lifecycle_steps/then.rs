//! Then steps for worktree lifecycle scenarios.

use super::world::LifecycleWorld;
use gropius::task::domain::RecoveryAction;
use rstest_bdd_macros::then;

#[then(r#"task "{title}" has status "{status}""#)]
fn task_has_status(world: &LifecycleWorld, title: String, status: String) -> Result<(), eyre::Report> {
    let task = world.stored_task(&title)?;
    if task.status().as_str() != status {
        return Err(eyre::eyre!(
            "expected {title:?} to be {status}, found {}",
            task.status()
        ));
    }
    Ok(())
}

#[then("{count:u64} slots are free")]
fn slots_free(world: &LifecycleWorld, count: u64) -> Result<(), eyre::Report> {
    let free = world.services()?.slots.find_free()?;
    if u64::try_from(free.len())? != count {
        return Err(eyre::eyre!("expected {count} free slots, found {}", free.len()));
    }
    Ok(())
}

#[then(r#"the request fails with a "{kind}" error"#)]
fn request_fails(world: &LifecycleWorld, kind: String) -> Result<(), eyre::Report> {
    let err = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("expected the request to fail"))?;
    if err.kind().to_string() != kind {
        return Err(eyre::eyre!("expected a {kind} error, found {} ({err})", err.kind()));
    }
    Ok(())
}

#[then(r#"task "{title}" is flagged with a merge conflict"#)]
fn flagged_with_conflict(world: &LifecycleWorld, title: String) -> Result<(), eyre::Report> {
    if !world.stored_task(&title)?.has_merge_conflict() {
        return Err(eyre::eyre!("expected {title:?} to carry the conflict flag"));
    }
    Ok(())
}

#[then(r#"the offered recovery reopens branch "{branch}""#)]
fn recovery_reopens_branch(world: &LifecycleWorld, branch: String) -> Result<(), eyre::Report> {
    match world.last_recovery.as_ref() {
        Some(RecoveryAction::ResolveConflictInWorktree {
            branch: offered, ..
        }) if offered.as_str() == branch => Ok(()),
        other => Err(eyre::eyre!("expected a reopen of {branch}, found {other:?}")),
    }
}
