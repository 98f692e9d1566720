//! Slot pool exclusivity and reconfiguration through the public API.

use super::helpers::{Orchestrator, orchestrator};
use eyre::ensure;
use gropius::task::domain::{TaskId, TaskStatus};
use gropius::worktree::domain::SlotError;
use gropius::worktree::services::WorktreeSlotAllocator;
use rstest::rstest;
use std::collections::HashSet;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_claims_never_share_a_slot() -> eyre::Result<()> {
    let allocator = Arc::new(WorktreeSlotAllocator::with_layout(3, "/srv/widgets")?);
    let claims: Vec<_> = (0..12)
        .map(|_| {
            let shared = Arc::clone(&allocator);
            tokio::spawn(async move {
                let task_id = TaskId::new();
                shared
                    .assign_next_free(&task_id)
                    .map(|slot| (slot.id(), task_id))
            })
        })
        .collect();

    let mut granted = Vec::new();
    let mut refused = 0_usize;
    for claim in claims {
        match claim.await? {
            Ok(binding) => granted.push(binding),
            Err(SlotError::NoFreeSlot) => refused += 1,
            Err(other) => return Err(other.into()),
        }
    }

    let distinct: HashSet<_> = granted.iter().map(|(slot, _)| *slot).collect();
    ensure!(granted.len() == 3, "granted {granted:?}");
    ensure!(distinct.len() == 3, "slot handed out twice: {granted:?}");
    ensure!(refused == 9, "refused {refused}");
    for (slot, task_id) in &granted {
        let bound = allocator
            .slot_for_task(task_id)?
            .ok_or_else(|| eyre::eyre!("binding for {task_id} missing"))?;
        ensure!(bound.id() == *slot, "binding moved");
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shrinking_the_pool_reverts_tasks_on_dropped_slots(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let first_draft = o.stored("First").await;
    let first = o.open_workspace(&first_draft).await;
    let second_draft = o.stored("Second").await;
    let second = o.open_workspace(&second_draft).await;

    let reverted = o.lifecycle.reconfigure(1, &o.config.repository.root_path).await?;

    ensure!(reverted.len() == 1, "reverted {reverted:?}");
    ensure!(reverted.iter().all(|task| task.id() == second.id()), "wrong task reverted");
    let stored = o.reload(&second).await;
    ensure!(stored.status() == TaskStatus::IssueCreated, "status {}", stored.status());
    ensure!(stored.branch().is_none(), "branch kept after losing the slot");
    ensure!(
        o.reload(&first).await.status() == TaskStatus::WorktreeActive,
        "surviving binding disturbed"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn moving_the_root_rederives_every_slot_path(
    orchestrator: Orchestrator,
) -> eyre::Result<()> {
    let o = orchestrator;
    let task_draft = o.stored("Keep me").await;
    let task = o.open_workspace(&task_draft).await;

    let reverted = o.lifecycle.reconfigure(4, "/work/widgets/").await?;

    ensure!(reverted.is_empty(), "growing the pool reverted {reverted:?}");
    let pool = o.slots.snapshot()?;
    let paths: Vec<&str> = pool.slots().iter().map(|slot| slot.path()).collect();
    ensure!(
        paths
            == [
                "/work/widgets-wt-1",
                "/work/widgets-wt-2",
                "/work/widgets-wt-3",
                "/work/widgets-wt-4",
            ],
        "paths {paths:?}"
    );
    ensure!(
        pool.slot_for_task(task.id()).map(|slot| slot.id().value()) == Some(1),
        "binding lost on resize"
    );
    Ok(())
}

#[rstest]
#[case(0)]
#[case(11)]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_slot_counts_leave_the_pool_unchanged(
    orchestrator: Orchestrator,
    #[case] count: usize,
) -> eyre::Result<()> {
    let o = orchestrator;
    let before = o.slots.snapshot()?;

    let result = o.lifecycle.reconfigure(count, "/srv/widgets").await;

    ensure!(result.is_err(), "count {count} accepted");
    ensure!(o.slots.snapshot()? == before, "pool changed on error");
    Ok(())
}
