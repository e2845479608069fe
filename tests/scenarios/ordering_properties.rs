//! Exhaustive checks of the ordering engine over small lists.

use approval_core::domain::ordering::{
    editing_index_after_remove, editing_index_after_swap, insert_or_replace, remove_at, renumber,
    swap_adjacent, swap_target,
};
use approval_core::{Direction, StepDraft, StepType, WorkflowId, WorkflowRef, WorkflowStep};
use approval_tests::{assert_contiguous, names};

const MAX_LEN: usize = 6;

fn list(len: usize, workflow: WorkflowRef) -> Vec<WorkflowStep> {
    let steps = (0..len)
        .map(|i| StepDraft::new(format!("S{}", i), StepType::Decision, "U1").to_step(workflow))
        .collect();
    renumber(steps, workflow)
}

fn workflows() -> [WorkflowRef; 2] {
    [
        WorkflowRef::Unsaved,
        WorkflowRef::Persisted(WorkflowId::new_v4()),
    ]
}

#[test]
fn test_insert_or_replace_keeps_orders_contiguous() {
    for workflow in workflows() {
        for len in 0..=MAX_LEN {
            let steps = list(len, WorkflowRef::Unsaved);
            let draft = StepDraft::new("New", StepType::Opinion, "U2");

            let appended = insert_or_replace(&steps, &draft, None, workflow).unwrap();
            assert_eq!(appended.len(), len + 1);
            assert_eq!(appended[len].name, "New");
            assert_contiguous(&appended, workflow);

            for index in 0..len {
                let replaced = insert_or_replace(&steps, &draft, Some(index), workflow).unwrap();
                assert_eq!(replaced.len(), len);
                assert_eq!(replaced[index].name, "New");
                assert_contiguous(&replaced, workflow);
            }

            assert!(insert_or_replace(&steps, &draft, Some(len), workflow).is_err());
        }
    }
}

#[test]
fn test_remove_at_keeps_orders_contiguous() {
    for workflow in workflows() {
        for len in 1..=MAX_LEN {
            let steps = list(len, WorkflowRef::Unsaved);
            for index in 0..len {
                let removed = remove_at(&steps, index, workflow).unwrap();
                assert_eq!(removed.len(), len - 1);
                assert!(!names(&removed).contains(&format!("S{}", index)));
                assert_contiguous(&removed, workflow);
            }
            assert!(remove_at(&steps, len, workflow).is_err());
        }
    }
}

#[test]
fn test_swap_adjacent_keeps_orders_contiguous() {
    for workflow in workflows() {
        for len in 2..=MAX_LEN {
            let steps = list(len, workflow);
            for index in 0..len {
                for direction in [Direction::Up, Direction::Down] {
                    let swapped = swap_adjacent(&steps, index, direction, workflow);
                    assert_eq!(swapped.len(), len);
                    assert_contiguous(&swapped, workflow);

                    if let Some(target) = swap_target(len, index, direction) {
                        assert_eq!(swapped[target].name, steps[index].name);
                        assert_eq!(swapped[index].name, steps[target].name);
                    }
                }
            }
        }
    }
}

#[test]
fn test_swaps_at_boundaries_are_no_ops() {
    for workflow in workflows() {
        for len in 1..=MAX_LEN {
            let steps = list(len, workflow);
            assert_eq!(swap_adjacent(&steps, 0, Direction::Up, workflow), steps);
            assert_eq!(
                swap_adjacent(&steps, len - 1, Direction::Down, workflow),
                steps
            );
        }
    }
}

#[test]
fn test_editing_index_follows_the_edited_step() {
    for len in 1..=MAX_LEN {
        let steps = list(len, WorkflowRef::Unsaved);
        for editing in 0..len {
            for removed in 0..len {
                let after = remove_at(&steps, removed, WorkflowRef::Unsaved).unwrap();
                match editing_index_after_remove(Some(editing), removed) {
                    Some(next) => assert_eq!(after[next].name, steps[editing].name),
                    None => assert_eq!(editing, removed),
                }
            }

            for index in 0..len {
                for direction in [Direction::Up, Direction::Down] {
                    let Some(target) = swap_target(len, index, direction) else {
                        continue;
                    };
                    let after = swap_adjacent(&steps, index, direction, WorkflowRef::Unsaved);
                    let next = editing_index_after_swap(Some(editing), index, target).unwrap();
                    assert_eq!(after[next].name, steps[editing].name);
                }
            }
        }
    }
}
