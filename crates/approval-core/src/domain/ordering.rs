//! Pure operations on an ordered step list.
//!
//! Every list returned from this module is renumbered `1..=N` by position
//! and stamped with the caller's workflow reference.

use serde::{Deserialize, Serialize};

use super::step::{StepDraft, WorkflowStep};
use super::workflow::WorkflowRef;
use crate::CoreError;

/// Direction of an adjacent swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards index 0
    Up,
    /// Towards the end of the list
    Down,
}

/// Re-derive `order` from position and stamp `workflow` on every step
pub fn renumber(steps: Vec<WorkflowStep>, workflow: WorkflowRef) -> Vec<WorkflowStep> {
    steps
        .into_iter()
        .enumerate()
        .map(|(idx, mut step)| {
            step.order = idx as u32 + 1;
            step.workflow = workflow;
            step
        })
        .collect()
}

/// Replace the element at `editing_index`, or append when not editing
pub fn insert_or_replace(
    steps: &[WorkflowStep],
    draft: &StepDraft,
    editing_index: Option<usize>,
    workflow: WorkflowRef,
) -> Result<Vec<WorkflowStep>, CoreError> {
    let mut next = steps.to_vec();
    let step = draft.to_step(workflow);

    match editing_index {
        Some(index) if index < next.len() => next[index] = step,
        Some(index) => {
            return Err(CoreError::IndexOutOfRange {
                index,
                len: next.len(),
            })
        }
        None => next.push(step),
    }

    Ok(renumber(next, workflow))
}

/// Remove the element at `index`
pub fn remove_at(
    steps: &[WorkflowStep],
    index: usize,
    workflow: WorkflowRef,
) -> Result<Vec<WorkflowStep>, CoreError> {
    if index >= steps.len() {
        return Err(CoreError::IndexOutOfRange {
            index,
            len: steps.len(),
        });
    }

    let mut next = steps.to_vec();
    next.remove(index);
    Ok(renumber(next, workflow))
}

/// Index of the neighbour a swap would exchange with, if within bounds
pub fn swap_target(len: usize, index: usize, direction: Direction) -> Option<usize> {
    if index >= len {
        return None;
    }
    match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => Some(index + 1).filter(|&target| target < len),
    }
}

/// Swap the element at `index` with its neighbour.
///
/// Moving past either boundary returns the input unchanged.
pub fn swap_adjacent(
    steps: &[WorkflowStep],
    index: usize,
    direction: Direction,
    workflow: WorkflowRef,
) -> Vec<WorkflowStep> {
    match swap_target(steps.len(), index, direction) {
        Some(target) => {
            let mut next = steps.to_vec();
            next.swap(index, target);
            renumber(next, workflow)
        }
        None => steps.to_vec(),
    }
}

/// Editing index after removing `removed`; `None` when the edited step is gone
pub fn editing_index_after_remove(editing: Option<usize>, removed: usize) -> Option<usize> {
    match editing {
        Some(current) if current == removed => None,
        Some(current) if current > removed => Some(current - 1),
        other => other,
    }
}

/// Editing index after swapping `index` with `target`
pub fn editing_index_after_swap(editing: Option<usize>, index: usize, target: usize) -> Option<usize> {
    match editing {
        Some(current) if current == index => Some(target),
        Some(current) if current == target => Some(index),
        other => other,
    }
}
