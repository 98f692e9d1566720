//! Upstream issue and pull request state folded into local tasks.

use super::helpers::{Orchestrator, orchestrator};
use eyre::{bail, ensure};
use gropius::task::domain::{PullRequestRef, TaskStatus};
use gropius::task::ports::TaskRepository;
use gropius::task::services::{PassOutcome, ReconciliationReport};
use rstest::rstest;

async fn reconcile(o: &Orchestrator) -> eyre::Result<ReconciliationReport> {
    match o.reconciler.reconcile().await? {
        PassOutcome::Completed(report) => Ok(report),
        PassOutcome::Skipped => bail!("pass skipped with nothing else running"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_merge_is_folded_into_local_task(orchestrator: Orchestrator) -> eyre::Result<()> {
    let o = orchestrator;
    let task = o.drafted().await;
    let with_pr = o.deliver_to_pull_request(&task).await;
    let number = with_pr
        .pull_request()
        .map(PullRequestRef::number)
        .ok_or_else(|| eyre::eyre!("pull request missing"))?;
    o.tracker.merge_remotely(number);

    let report = reconcile(&o).await?;

    ensure!(report.updated == 1, "unexpected report {report:?}");
    ensure!(
        o.reload(&task).await.status() == TaskStatus::PrMerged,
        "remote merge not applied"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_upstream_issue_is_imported_once(orchestrator: Orchestrator) -> eyre::Result<()> {
    let o = orchestrator;
    let issue = o.tracker.open_issue("Crash on empty cart", "Checkout panics")?;

    let first = reconcile(&o).await?;
    let second = reconcile(&o).await?;

    ensure!(first.imported_issues == 1, "first pass {first:?}");
    ensure!(second.imported_issues == 0, "second pass {second:?}");
    let imported = o
        .repository
        .find_by_issue_number(issue.number())
        .await?
        .ok_or_else(|| eyre::eyre!("issue not imported"))?;
    ensure!(imported.status() == TaskStatus::IssueCreated, "status {}", imported.status());
    ensure!(imported.title() == "Crash on empty cart", "title {}", imported.title());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn in_flight_workspace_keeps_local_status(orchestrator: Orchestrator) -> eyre::Result<()> {
    let o = orchestrator;
    let task = o.drafted().await;
    let active = o.open_workspace(&task).await;
    let branch = active
        .branch()
        .map(ToString::to_string)
        .ok_or_else(|| eyre::eyre!("branch missing"))?;
    o.tracker
        .open_pull_request("Fix login redirect", &branch, active.issue().cloned())?;

    let report = reconcile(&o).await?;

    ensure!(report.kept_local == 1, "unexpected report {report:?}");
    let stored = o.reload(&task).await;
    ensure!(stored.status() == TaskStatus::WorktreeActive, "status {}", stored.status());
    ensure!(o.slots.slot_for_task(task.id())?.is_some(), "slot lost");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_issues_prune_only_issue_created_tasks(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let waiting_draft = o.stored("Waiting").await;
    let waiting = o.lifecycle.create_issue(waiting_draft.id()).await?;
    let working_draft = o.stored("Working").await;
    let working = o.open_workspace(&working_draft).await;
    for task in [&waiting, &working] {
        let number = task
            .issue()
            .map(|issue| issue.number())
            .ok_or_else(|| eyre::eyre!("issue missing"))?;
        o.tracker.close_issue(number);
    }

    let removed = match o.reconciler.prune_closed_issues().await? {
        PassOutcome::Completed(removed) => removed,
        PassOutcome::Skipped => bail!("prune skipped"),
    };

    ensure!(removed == vec![waiting.id().clone()], "removed {removed:?}");
    ensure!(
        o.repository.find_by_id(waiting.id()).await?.is_none(),
        "pruned task still stored"
    );
    ensure!(
        o.repository.find_by_id(working.id()).await?.is_some(),
        "workspace-bound task pruned"
    );
    ensure!(!o.reconciler.is_running(), "pass flag left set");
    Ok(())
}
