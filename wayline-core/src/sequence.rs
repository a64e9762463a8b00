//! Mutable ordered sequence of steps with cursor-aware splicing.
//!
//! Branch selection inserts a result step; crossroad "previous" removes
//! it again. Both operations return the adjusted cursor so callers never
//! redo the shift arithmetic themselves.

use thiserror::Error;

use crate::step::Step;

/// Index misuse on the step sequence. A programming error given the
/// navigation invariants; callers clamp and log rather than propagate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("step index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered, mutable list of steps. Indices are contiguous `0..len`.
#[derive(Debug, Clone)]
pub struct StepSequence {
    steps: Vec<Step>,
}

impl StepSequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Step, SequenceError> {
        self.steps.get(index).ok_or(SequenceError::OutOfRange {
            index,
            len: self.steps.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Insert `step` immediately after `index`, returning the adjusted
    /// cursor. A cursor at or before `index` is unaffected; a cursor past
    /// it shifts right by one.
    pub fn insert_after(&mut self, index: usize, step: Step, cursor: usize) -> usize {
        let at = (index + 1).min(self.steps.len());
        self.steps.insert(at, step);
        if cursor >= at {
            cursor + 1
        } else {
            cursor
        }
    }

    /// Remove the step at `index`, returning the adjusted cursor. Out of
    /// range is a silent no-op (the caller's content-equality precondition
    /// already failed, nothing to undo).
    pub fn remove_at(&mut self, index: usize, cursor: usize) -> usize {
        if index >= self.steps.len() {
            return cursor;
        }
        self.steps.remove(index);
        if cursor > index {
            cursor - 1
        } else {
            cursor
        }
    }

    /// Index of the nearest choice step strictly before `index`.
    pub fn last_choice_before(&self, index: usize) -> Option<usize> {
        self.steps[..index.min(self.steps.len())]
            .iter()
            .rposition(|step| step.as_choice().is_some())
    }

    /// First step at or after `from` that is not a crossroad, if any.
    pub fn next_non_crossroad(&self, from: usize) -> Option<usize> {
        (from..self.steps.len()).find(|&i| !self.steps[i].is_crossroad())
    }
}
