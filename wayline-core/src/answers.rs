//! Recorded quiz and choice answers, keyed by step identity.
//!
//! The store is the in-session source of truth: remote submission is
//! best-effort, but the summary screen and persistence always read from
//! here. Keys are step ids, not indices, so splices never invalidate
//! recorded answers.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::sequence::StepSequence;
use crate::step::StepId;

#[derive(Debug, Error)]
pub enum AnswerStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    /// Index into the quiz's options.
    Quiz { option_index: usize },
    /// Id of the selected choice option.
    Choice { choice_id: String },
}

/// A choice result collected for the summary screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResult {
    pub choice_id: String,
    pub image: String,
}

/// In-memory answer store with JSON persistence.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AnswerStore {
    answers: HashMap<StepId, Answer>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a quiz answer, overwriting any previous one for this step.
    pub fn record_quiz(&mut self, step_id: StepId, option_index: usize) {
        self.answers
            .insert(step_id, Answer::Quiz { option_index });
    }

    /// Record a choice selection, overwriting any previous one for this
    /// step (re-selection replaces, never accumulates).
    pub fn record_choice(&mut self, step_id: StepId, choice_id: impl Into<String>) {
        self.answers.insert(
            step_id,
            Answer::Choice {
                choice_id: choice_id.into(),
            },
        );
    }

    pub fn get(&self, step_id: &StepId) -> Option<&Answer> {
        self.answers.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Clear everything. Only used by the explicit "retake" reset.
    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// Result media of every answered choice whose selected option names
    /// one, in sequence order. This is what the summary screen shows.
    pub fn collected_results(&self, sequence: &StepSequence) -> Vec<CollectedResult> {
        let mut out = Vec::new();
        for step in sequence.iter() {
            let Some(choice) = step.as_choice() else {
                continue;
            };
            let Some(Answer::Choice { choice_id }) = self.answers.get(step.id()) else {
                continue;
            };
            if let Some(option) = choice.option(choice_id) {
                if let Some(results) = &option.results {
                    out.push(CollectedResult {
                        choice_id: choice_id.clone(),
                        image: results.clone(),
                    });
                }
            }
        }
        out
    }

    /// Persist answers as pretty JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), AnswerStoreError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load a previously saved answer store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AnswerStoreError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Choice, ChoiceOption, Position, Size, Step, StepKind};

    fn choice_step() -> Step {
        Step::new(StepKind::Choice(Choice {
            background: "bg.png".into(),
            choices: vec![
                ChoiceOption {
                    id: "x".into(),
                    image: "x.png".into(),
                    position: Position { x: 0.3, y: 0.5 },
                    size: Size {
                        width: 0.2,
                        height: 0.2,
                    },
                    results: Some("x_result.png".into()),
                },
                ChoiceOption {
                    id: "y".into(),
                    image: "y.png".into(),
                    position: Position { x: 0.7, y: 0.5 },
                    size: Size {
                        width: 0.2,
                        height: 0.2,
                    },
                    results: None,
                },
            ],
        }))
    }

    #[test]
    fn reselection_overwrites() {
        let step = choice_step();
        let mut store = AnswerStore::new();
        store.record_choice(step.id().clone(), "x");
        store.record_choice(step.id().clone(), "y");

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(step.id()),
            Some(&Answer::Choice {
                choice_id: "y".into()
            })
        );
    }

    #[test]
    fn collected_results_skip_optionless_answers() {
        let step = choice_step();
        let sequence = StepSequence::new(vec![Step::media("a.png"), step.clone()]);

        let mut store = AnswerStore::new();
        store.record_choice(step.id().clone(), "y");
        assert!(store.collected_results(&sequence).is_empty());

        store.record_choice(step.id().clone(), "x");
        let collected = store.collected_results(&sequence);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].image, "x_result.png");
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let step = choice_step();
        let mut store = AnswerStore::new();
        store.record_quiz(StepId::media("unused"), 2);
        store.record_choice(step.id().clone(), "x");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        store.save(&path).await.unwrap();

        let loaded = AnswerStore::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(step.id()), store.get(step.id()));
    }
}
