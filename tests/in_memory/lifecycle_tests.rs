//! Intake through merge over the in-memory adapters.

use super::helpers::{AGENT_COMMAND, Orchestrator, orchestrator};
use eyre::{bail, ensure};
use gropius::bridge::domain::CommandResponse;
use gropius::error::ErrorKind;
use gropius::task::adapters::memory::TrackerOperation;
use gropius::task::domain::{RecoveryAction, TaskStatus};
use gropius::task::ports::IssueTrackerError;
use gropius::task::services::MergeOutcome;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn drafted_task_is_delivered_and_frees_its_slot(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let drafted = o.drafted().await;
    ensure!(drafted.status() == TaskStatus::Formatted, "draft not formatted");
    ensure!(o.intake.list_tasks().await?.len() == 2, "drafts not stored");

    let active = o.open_workspace(&drafted).await;
    ensure!(active.status() == TaskStatus::WorktreeActive, "status {}", active.status());
    let bound = o
        .slots
        .slot_for_task(drafted.id())?
        .ok_or_else(|| eyre::eyre!("no slot bound"))?;
    ensure!(bound.path() == "/srv/widgets-wt-1", "slot path {}", bound.path());
    ensure!(
        o.transport
            .executed_commands()
            .iter()
            .any(|command| command.contains("worktree add -b task/1-fix-login-redirect")),
        "workspace not created from a fresh branch: {:?}",
        o.transport.executed_commands()
    );

    let with_pr = o.deliver_to_pull_request(&drafted).await;
    ensure!(with_pr.status() == TaskStatus::PrCreated, "status {}", with_pr.status());
    ensure!(o.slots.slot_for_task(drafted.id())?.is_none(), "slot kept after PR");
    ensure!(o.slots.find_free()?.len() == 2, "slot not returned to the pool");

    let merged = match o.lifecycle.merge(drafted.id()).await? {
        MergeOutcome::Merged(task) => task,
        other @ MergeOutcome::Conflicted { .. } => bail!("unexpected conflict {other:?}"),
    };
    ensure!(merged.status() == TaskStatus::PrMerged, "status {}", merged.status());
    ensure!(merged.status().is_terminal(), "merged is not terminal");
    ensure!(o.tracker.merged_pull_requests().len() == 1, "tracker not merged");
    ensure!(o.reload(&drafted).await == merged, "merge not persisted");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agent_prompt_reaches_the_bridge_quoted(orchestrator: Orchestrator) -> eyre::Result<()> {
    let o = orchestrator;
    let task = o.drafted().await;
    o.open_workspace(&task).await;
    o.transport
        .respond_to(AGENT_COMMAND, CommandResponse::succeeded("done"));

    o.lifecycle.run_agent(task.id(), |_| {}).await?;

    let agent_command = o
        .transport
        .executed_commands()
        .into_iter()
        .find(|command| command.contains(AGENT_COMMAND))
        .ok_or_else(|| eyre::eyre!("agent never ran"))?;
    ensure!(
        agent_command.starts_with("codex exec --cd /srv/widgets-wt-1 '"),
        "unexpected agent command {agent_command}"
    );
    ensure!(
        agent_command.contains("Fix login redirect"),
        "prompt missing title: {agent_command}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn saturated_pool_refuses_then_accepts_after_cleanup(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let first = o.stored("First").await;
    let second = o.stored("Second").await;
    let third = o.stored("Third").await;
    o.open_workspace(&first).await;
    o.open_workspace(&second).await;
    o.lifecycle.create_issue(third.id()).await?;

    let err = match o.lifecycle.create_worktree(third.id()).await {
        Ok(task) => bail!("expected a full pool, got {task:?}"),
        Err(err) => err,
    };
    ensure!(err.kind() == ErrorKind::Conflict, "unexpected kind {}", err.kind());
    ensure!(
        o.reload(&third).await.status() == TaskStatus::IssueCreated,
        "refused task changed status"
    );

    o.lifecycle.cleanup_worktree(first.id()).await?;
    let reopened = o.lifecycle.create_worktree(third.id()).await?;

    ensure!(reopened.status() == TaskStatus::WorktreeActive, "status {}", reopened.status());
    let bound = o
        .slots
        .slot_for_task(third.id())?
        .ok_or_else(|| eyre::eyre!("no slot bound"))?;
    ensure!(bound.id().value() == 1, "expected the lowest free slot, got {}", bound.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_workspace_setup_rolls_back_slot_and_status(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let task = o.stored("Broken setup").await;
    o.lifecycle.create_issue(task.id()).await?;
    o.transport.respond_to(
        "worktree add",
        CommandResponse::failed(128, "fatal: could not create work tree dir"),
    );

    ensure!(
        o.lifecycle.create_worktree(task.id()).await.is_err(),
        "setup failure reported as success"
    );

    let stored = o.reload(&task).await;
    ensure!(stored.status() == TaskStatus::IssueCreated, "status {}", stored.status());
    ensure!(o.slots.slot_for_task(task.id())?.is_none(), "slot left bound");
    ensure!(o.slots.find_free()?.len() == 2, "slot leaked");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merge_conflict_is_resolved_in_a_reopened_workspace(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let task = o.drafted().await;
    o.deliver_to_pull_request(&task).await;
    o.tracker.fail_next(
        TrackerOperation::MergePullRequest,
        IssueTrackerError::MergeNotAllowed("Pull Request is not mergeable".to_owned()),
    );

    let recovery = match o.lifecycle.merge(task.id()).await? {
        MergeOutcome::Conflicted { recovery, .. } => recovery,
        other @ MergeOutcome::Merged(_) => bail!("expected a conflict, got {other:?}"),
    };
    ensure!(
        matches!(recovery, RecoveryAction::ResolveConflictInWorktree { .. }),
        "unexpected recovery {recovery}"
    );

    let reopened = o.lifecycle.resolve_conflict_in_worktree(task.id()).await?;
    ensure!(reopened.status() == TaskStatus::WorktreeActive, "status {}", reopened.status());
    ensure!(reopened.has_merge_conflict(), "flag cleared too early");
    ensure!(
        o.transport.executed_commands().iter().any(|command| {
            command.contains("fetch origin task/1-fix-login-redirect")
                && command.contains(
                    "worktree add -B task/1-fix-login-redirect /srv/widgets-wt-1 origin/task/1-fix-login-redirect",
                )
        }),
        "existing branch not reopened: {:?}",
        o.transport.executed_commands()
    );

    let resolved = o.lifecycle.complete_conflict_resolution(task.id()).await?;
    ensure!(resolved.status() == TaskStatus::PrCreated, "status {}", resolved.status());
    ensure!(!resolved.has_merge_conflict(), "flag still set");
    ensure!(o.slots.find_free()?.len() == 2, "slot not released after resolution");

    ensure!(
        matches!(o.lifecycle.merge(task.id()).await?, MergeOutcome::Merged(_)),
        "resolved task did not merge"
    );
    Ok(())
}
