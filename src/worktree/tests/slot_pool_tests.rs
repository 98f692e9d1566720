//! Slot pool and allocator behaviour.

use crate::task::domain::TaskId;
use crate::worktree::domain::{SlotError, SlotId, SlotPool, derive_slot_path};
use crate::worktree::services::WorktreeSlotAllocator;
use rstest::{fixture, rstest};
use std::collections::HashSet;
use std::sync::Arc;

fn slot(value: u16) -> SlotId {
    SlotId::new(value).expect("valid slot id")
}

fn task(name: &str) -> TaskId {
    TaskId::parse(name).expect("valid task id")
}

#[fixture]
fn pool() -> SlotPool {
    SlotPool::new(3, "/repo").expect("valid pool")
}

#[rstest]
#[case("/repo", 2, "/repo-wt-2")]
#[case("/repo/", 1, "/repo-wt-1")]
#[case("/home/dev/src/app", 10, "/home/dev/src/app-wt-10")]
#[case(r"C:\work\app", 3, r"C:\work\app-wt-3")]
#[case("C:/work/app", 3, r"C:\work\app-wt-3")]
#[case(r"\\server\share\app\", 1, r"\\server\share\app-wt-1")]
fn slot_paths_follow_root_separator_style(
    #[case] root: &str,
    #[case] id: u16,
    #[case] expected: &str,
) {
    assert_eq!(derive_slot_path(root, slot(id)), expected);
}

#[rstest]
#[case(0)]
#[case(11)]
fn slot_ids_outside_range_are_rejected(#[case] value: u16) {
    assert!(matches!(SlotId::new(value), Err(SlotError::UnknownSlot(_))));
}

#[rstest]
#[case(0)]
#[case(11)]
fn pool_rejects_invalid_slot_counts(#[case] count: usize) {
    assert_eq!(
        SlotPool::new(count, "/repo"),
        Err(SlotError::InvalidSlotCount(count))
    );
}

#[rstest]
fn pool_rejects_blank_root() {
    assert_eq!(SlotPool::new(2, "  "), Err(SlotError::EmptyRootPath));
}

#[rstest]
fn assign_binds_free_slot_with_derived_path(mut pool: SlotPool) {
    let assigned = pool.assign(&task("t1"), slot(2)).expect("slot is free");

    assert_eq!(assigned.path(), "/repo-wt-2");
    assert_eq!(assigned.task_id(), Some(&task("t1")));
}

#[rstest]
fn assign_rejects_bound_slot(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(1)).expect("slot is free");

    let result = pool.assign(&task("t2"), slot(1));

    assert_eq!(
        result.map(|assigned| assigned.id()),
        Err(SlotError::SlotOccupied {
            slot: slot(1),
            bound_task: task("t1"),
        })
    );
}

#[rstest]
fn assign_rejects_task_already_holding_another_slot(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(1)).expect("slot is free");

    let result = pool.assign(&task("t1"), slot(2)).map(|assigned| assigned.id());

    assert_eq!(
        result,
        Err(SlotError::TaskAlreadyAssigned {
            task_id: task("t1"),
            slot: slot(1),
        })
    );
}

#[rstest]
fn reassigning_the_held_slot_reports_it_occupied(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(3)).expect("slot is free");

    let again = pool.assign(&task("t1"), slot(3)).map(|assigned| assigned.id());

    assert_eq!(
        again,
        Err(SlotError::SlotOccupied {
            slot: slot(3),
            bound_task: task("t1"),
        })
    );
    assert_eq!(pool.slot_for_task(&task("t1")).map(|held| held.id()), Some(slot(3)));
}

#[rstest]
fn release_is_idempotent(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(2)).expect("slot is free");

    assert_eq!(pool.release(slot(2)), Some(task("t1")));
    assert_eq!(pool.release(slot(2)), None);
    assert!(pool.get(slot(2)).is_some_and(|freed| freed.is_free()));
}

#[rstest]
fn find_free_returns_ascending_ids(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(2)).expect("slot is free");

    let free: Vec<u16> = pool.find_free().iter().map(|s| s.id().value()).collect();

    assert_eq!(free, vec![1, 3]);
}

#[rstest]
fn assign_next_free_picks_lowest_id_and_reports_full_pool(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(1)).expect("slot is free");

    let second = pool.assign_next_free(&task("t2")).map(|s| s.id());
    let third = pool.assign_next_free(&task("t3")).map(|s| s.id());
    let overflow = pool.assign_next_free(&task("t4")).map(|s| s.id());

    assert_eq!(second, Ok(slot(2)));
    assert_eq!(third, Ok(slot(3)));
    assert_eq!(overflow, Err(SlotError::NoFreeSlot));
}

#[rstest]
fn shrinking_drops_high_slots_and_keeps_surviving_bindings(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(2)).expect("slot is free");
    pool.assign(&task("t3"), slot(3)).expect("slot is free");

    let dropped = pool.resize(2, "/repo").expect("valid layout");

    assert_eq!(dropped, vec![task("t3")]);
    assert_eq!(pool.len(), 2);
    let kept = pool.slot_for_task(&task("t1")).expect("binding kept");
    assert_eq!(kept.path(), "/repo-wt-2");
    assert!(pool.slot_for_task(&task("t3")).is_none());
}

#[rstest]
fn moving_root_recomputes_paths_without_losing_bindings(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(1)).expect("slot is free");

    let dropped = pool.resize(4, r"D:\code\repo").expect("valid layout");

    assert!(dropped.is_empty());
    assert_eq!(pool.root_path(), r"D:\code\repo");
    let kept = pool.slot_for_task(&task("t1")).expect("binding kept");
    assert_eq!(kept.path(), r"D:\code\repo-wt-1");
    assert_eq!(pool.get(slot(4)).map(|s| s.path()), Some(r"D:\code\repo-wt-4"));
}

#[rstest]
fn invalid_resize_leaves_pool_untouched(mut pool: SlotPool) {
    pool.assign(&task("t1"), slot(3)).expect("slot is free");
    let before = pool.clone();

    assert_eq!(pool.resize(0, "/repo"), Err(SlotError::InvalidSlotCount(0)));
    assert_eq!(pool, before);
}

#[rstest]
fn from_bindings_skips_duplicates_and_out_of_range_slots() {
    let restored = SlotPool::from_bindings(
        2,
        "/repo",
        vec![
            (slot(1), task("t1")),
            (slot(2), task("t1")),
            (slot(5), task("t5")),
        ],
    )
    .expect("valid layout");

    assert_eq!(restored.bindings(), vec![(slot(1), task("t1"))]);
}

#[rstest]
fn slot_exclusivity_holds_across_assign_release_sequences(mut pool: SlotPool) {
    let tasks = [task("a"), task("b"), task("c"), task("d")];
    for step in 0_u16..60 {
        let task_id = tasks
            .get(usize::from(step % 4))
            .expect("index in range");
        let target = slot(step % 3 + 1);
        if step % 5 == 0 {
            pool.release(target);
        } else {
            pool.assign(task_id, target).ok();
        }

        let bound: Vec<&TaskId> = pool.slots().iter().filter_map(|s| s.task_id()).collect();
        let unique: HashSet<&TaskId> = bound.iter().copied().collect();
        assert_eq!(bound.len(), unique.len(), "duplicate binding at step {step}");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_assignments_to_one_slot_have_a_single_winner() {
    let allocator = Arc::new(WorktreeSlotAllocator::with_layout(3, "/repo").expect("valid pool"));

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let shared = Arc::clone(&allocator);
            tokio::spawn(async move { shared.assign(&task(&format!("t{index}")), slot(1)) })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task joins").is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
}

#[rstest]
fn allocator_reconfigure_reports_dropped_tasks() {
    let allocator = WorktreeSlotAllocator::with_layout(3, "/repo").expect("valid pool");
    allocator.assign(&task("t3"), slot(3)).expect("slot is free");

    let dropped = allocator.reconfigure(1, "/repo").expect("valid layout");

    assert_eq!(dropped, vec![task("t3")]);
    assert_eq!(allocator.slot_for_task(&task("t3")), Ok(None));
}
