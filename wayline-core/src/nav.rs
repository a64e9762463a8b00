//! Navigation state machine.
//!
//! Owns the cursor and interprets the step under it: plain media plays
//! inline, interactive steps open an overlay mode that captures input
//! until resolved. Exactly one mode is active at a time, so invalid
//! overlay combinations cannot be represented.
//!
//! All timing flows in through `now` parameters and out through
//! `tick(now)`; the machine never reads the clock itself.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::answers::AnswerStore;
use crate::sequence::StepSequence;
use crate::step::{Step, StepId, StepKind};

/// How long the quiz confirmation stays on screen before auto-advancing.
const QUIZ_CONFIRM: Duration = Duration::from_millis(1000);

/// Overlay mode of the machine. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// Entry gate; navigation has not begun.
    AtStart,
    /// Plain media under the cursor; swipe/key navigation is live.
    Idle,
    /// Quiz overlay. `advance_at` is set once an answer is in, after
    /// which `tick` moves on.
    AwaitingQuiz { advance_at: Option<Instant> },
    /// Choice overlay; only a selection resolves it.
    AwaitingChoice,
    /// Crossroad gate. Action buttons unlock at `unlocked_at`; the
    /// crossroad step itself sits at `crossroad_index` (the cursor may
    /// be on an inserted result just before it).
    AwaitingCrossroad {
        crossroad_index: usize,
        unlocked_at: Instant,
    },
    /// Terminal summary view; exits via complete or reset.
    ShowingSummary,
}

/// Crossroad button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossroadAction {
    Next,
    Previous,
}

/// Result of feeding an intent to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// Cursor moved to this index.
    Moved(usize),
    /// A guard swallowed the intent; nothing changed.
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    /// Selected id is not an option of the current choice (stale UI
    /// event); rejected with no state change.
    #[error("choice id {id:?} is not an option of the current step")]
    InvalidChoice { id: String },

    /// Quiz option index out of range; rejected with no state change.
    #[error("quiz option {index} out of range")]
    InvalidQuizOption { index: usize },
}

/// The playback/navigation state machine.
pub struct Navigator {
    sequence: StepSequence,
    cursor: usize,
    mode: NavMode,
    answers: AnswerStore,
    /// Choice step id -> result media path currently spliced in after it.
    /// At most one pending insertion per choice.
    inserted: HashMap<StepId, String>,
}

impl Navigator {
    /// Create a machine over a freshly seeded sequence, cursor at 0.
    pub fn new(sequence: StepSequence) -> Self {
        let mode = match sequence.get(0).map(Step::kind) {
            Ok(StepKind::Start(_)) => NavMode::AtStart,
            _ => NavMode::Idle,
        };
        Self {
            sequence,
            cursor: 0,
            mode,
            answers: AnswerStore::new(),
            inserted: HashMap::new(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    pub fn sequence(&self) -> &StepSequence {
        &self.sequence
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn answers_mut(&mut self) -> &mut AnswerStore {
        &mut self.answers
    }

    pub fn current_step(&self) -> &Step {
        // The cursor invariant keeps this in range.
        self.sequence
            .get(self.cursor)
            .expect("cursor within sequence")
    }

    /// Whether the crossroad gate (if active) has unlocked.
    pub fn crossroad_unlocked(&self, now: Instant) -> Option<bool> {
        match self.mode {
            NavMode::AwaitingCrossroad { unlocked_at, .. } => Some(now >= unlocked_at),
            _ => None,
        }
    }

    /// Leave the start gate and move onto the first real step.
    pub fn begin(&mut self, now: Instant) -> NavOutcome {
        if self.mode != NavMode::AtStart {
            return NavOutcome::Ignored;
        }
        let first = 1.min(self.sequence.len().saturating_sub(1));
        self.enter_step(first, now);
        NavOutcome::Moved(self.cursor)
    }

    /// Advance intent (swipe / click next / right arrow). Only honored
    /// in `Idle`; overlays resolve through their own actions.
    pub fn advance(&mut self, now: Instant) -> NavOutcome {
        if self.mode != NavMode::Idle {
            return NavOutcome::Ignored;
        }
        if self.cursor + 1 >= self.sequence.len() {
            return NavOutcome::Ignored;
        }
        self.enter_step(self.cursor + 1, now);
        NavOutcome::Moved(self.cursor)
    }

    /// Retreat intent. Retreating onto a pending inserted result or a
    /// crossroad runs the same return-to-choice logic as the crossroad
    /// "previous" button. The start gate is never re-entered.
    pub fn retreat(&mut self, now: Instant) -> NavOutcome {
        if self.mode != NavMode::Idle {
            return NavOutcome::Ignored;
        }
        if self.cursor == 0 {
            return NavOutcome::Ignored;
        }
        let target = self.cursor - 1;
        enum Retreat {
            Blocked,
            ReturnToChoice,
            Enter,
        }
        let plan = match self.sequence.get(target) {
            Err(_) => Retreat::Blocked,
            Ok(step) => match step.kind() {
                StepKind::Start(_) => Retreat::Blocked,
                StepKind::Crossroad(_) => Retreat::ReturnToChoice,
                StepKind::Media(path) if self.is_pending_result(target, path) => {
                    Retreat::ReturnToChoice
                }
                _ => Retreat::Enter,
            },
        };

        match plan {
            Retreat::Blocked => NavOutcome::Ignored,
            Retreat::ReturnToChoice => self.return_to_choice(),
            Retreat::Enter => {
                self.enter_step(target, now);
                NavOutcome::Moved(self.cursor)
            }
        }
    }

    /// Submit a quiz answer. Records it, shows the confirmation, and
    /// arms the auto-advance timer; `tick` performs the move.
    pub fn submit_quiz(&mut self, option_index: usize, now: Instant) -> Result<(), NavError> {
        let NavMode::AwaitingQuiz { .. } = self.mode else {
            return Ok(());
        };
        let step = self.current_step();
        let Some(quiz) = step.as_quiz() else {
            return Ok(());
        };
        if option_index >= quiz.options.len() {
            return Err(NavError::InvalidQuizOption {
                index: option_index,
            });
        }

        let id = step.id().clone();
        self.answers.record_quiz(id, option_index);
        self.mode = NavMode::AwaitingQuiz {
            advance_at: Some(now + QUIZ_CONFIRM),
        };
        Ok(())
    }

    /// Select a choice option. Replaces any previously inserted result
    /// for this choice, splices the new one in (if the option names
    /// one), and arms the following crossroad's unlock gate.
    pub fn select_choice(
        &mut self,
        choice_id: &str,
        now: Instant,
    ) -> Result<NavOutcome, NavError> {
        if self.mode != NavMode::AwaitingChoice {
            return Ok(NavOutcome::Ignored);
        }
        let step = self.current_step();
        let step_id = step.id().clone();
        let Some(choice) = step.as_choice() else {
            return Ok(NavOutcome::Ignored);
        };
        let Some(option) = choice.option(choice_id) else {
            return Err(NavError::InvalidChoice {
                id: choice_id.to_string(),
            });
        };
        let results = option.results.clone();

        self.answers.record_choice(step_id.clone(), choice_id);

        // Re-selection replaces, never accumulates.
        if let Some(previous) = self.inserted.remove(&step_id) {
            if self
                .sequence
                .get(self.cursor + 1)
                .ok()
                .and_then(Step::media_path)
                == Some(previous.as_str())
            {
                self.cursor = self.sequence.remove_at(self.cursor + 1, self.cursor);
            }
        }

        match results {
            Some(path) => {
                self.cursor =
                    self.sequence
                        .insert_after(self.cursor, Step::media(path.clone()), self.cursor);
                self.inserted.insert(step_id, path);
                self.cursor += 1;

                // If a crossroad follows the result, its gate starts
                // counting from the selection.
                self.mode = match self
                    .sequence
                    .get(self.cursor + 1)
                    .ok()
                    .and_then(Step::as_crossroad)
                {
                    Some(crossroad) => NavMode::AwaitingCrossroad {
                        crossroad_index: self.cursor + 1,
                        unlocked_at: now + Duration::from_millis(crossroad.delay_ms),
                    },
                    None => NavMode::Idle,
                };
                Ok(NavOutcome::Moved(self.cursor))
            }
            None => {
                if self.cursor + 1 < self.sequence.len() {
                    self.enter_step(self.cursor + 1, now);
                } else {
                    self.mode = NavMode::Idle;
                }
                Ok(NavOutcome::Moved(self.cursor))
            }
        }
    }

    /// Resolve the crossroad gate. Ignored until the unlock delay has
    /// elapsed.
    pub fn crossroad_action(&mut self, action: CrossroadAction, now: Instant) -> NavOutcome {
        let NavMode::AwaitingCrossroad {
            crossroad_index,
            unlocked_at,
        } = self.mode
        else {
            return NavOutcome::Ignored;
        };
        if now < unlocked_at {
            return NavOutcome::Ignored;
        }

        match action {
            CrossroadAction::Next => {
                // Skip past the crossroad (and any contiguous ones).
                match self.sequence.next_non_crossroad(crossroad_index) {
                    Some(target) => {
                        self.enter_step(target, now);
                        NavOutcome::Moved(self.cursor)
                    }
                    None => {
                        // Nothing but crossroads remain; park on the last step.
                        let last = self.sequence.len().saturating_sub(1);
                        self.cursor = last;
                        self.mode = NavMode::Idle;
                        NavOutcome::Moved(last)
                    }
                }
            }
            CrossroadAction::Previous => self.return_to_choice(),
        }
    }

    /// Timer-driven transitions. Call on every event-loop tick.
    pub fn tick(&mut self, now: Instant) -> NavOutcome {
        if let NavMode::AwaitingQuiz {
            advance_at: Some(at),
        } = self.mode
        {
            if now >= at {
                if self.cursor + 1 < self.sequence.len() {
                    self.enter_step(self.cursor + 1, now);
                    return NavOutcome::Moved(self.cursor);
                }
                self.mode = NavMode::Idle;
            }
        }
        NavOutcome::Ignored
    }

    /// Exit the summary forward, if steps remain.
    pub fn complete(&mut self, now: Instant) -> NavOutcome {
        if self.mode != NavMode::ShowingSummary {
            return NavOutcome::Ignored;
        }
        if self.cursor + 1 < self.sequence.len() {
            self.enter_step(self.cursor + 1, now);
            NavOutcome::Moved(self.cursor)
        } else {
            NavOutcome::Ignored
        }
    }

    /// Full "retake" reset: pristine sequence, cursor 0, answers gone.
    pub fn reset(&mut self, initial: Vec<Step>) {
        self.sequence = StepSequence::new(initial);
        self.cursor = 0;
        self.answers.clear();
        self.inserted.clear();
        self.mode = match self.sequence.get(0).map(Step::kind) {
            Ok(StepKind::Start(_)) => NavMode::AtStart,
            _ => NavMode::Idle,
        };
    }

    /// Undo the pending insertion of the nearest preceding choice and
    /// return to it. Shared by crossroad "previous" and retreat.
    fn return_to_choice(&mut self) -> NavOutcome {
        let Some(choice_index) = self.sequence.last_choice_before(self.cursor) else {
            return NavOutcome::Ignored;
        };
        let choice_id = self
            .sequence
            .get(choice_index)
            .expect("choice index valid")
            .id()
            .clone();

        if let Some(path) = self.inserted.remove(&choice_id) {
            let next = self
                .sequence
                .get(choice_index + 1)
                .ok()
                .and_then(Step::media_path);
            if next == Some(path.as_str()) {
                self.cursor = self.sequence.remove_at(choice_index + 1, self.cursor);
            }
        }

        self.cursor = choice_index;
        self.mode = NavMode::AwaitingChoice;
        NavOutcome::Moved(choice_index)
    }

    /// True when the media at `index` is the currently pending result of
    /// the choice immediately before it.
    fn is_pending_result(&self, index: usize, path: &str) -> bool {
        if index == 0 {
            return false;
        }
        let Ok(prev) = self.sequence.get(index - 1) else {
            return false;
        };
        prev.as_choice().is_some()
            && self.inserted.get(prev.id()).map(String::as_str) == Some(path)
    }

    /// Move the cursor and select the overlay mode the step type
    /// demands. Out-of-range indices are clamped (with a log) rather
    /// than propagated; the invariants make them unreachable.
    fn enter_step(&mut self, index: usize, now: Instant) {
        let index = if index < self.sequence.len() {
            index
        } else {
            warn!(index, len = self.sequence.len(), "cursor clamped");
            self.sequence.len().saturating_sub(1)
        };
        self.cursor = index;
        self.mode = match self.current_step().kind() {
            StepKind::Media(_) => NavMode::Idle,
            StepKind::Quiz(_) => NavMode::AwaitingQuiz { advance_at: None },
            StepKind::Choice(_) => NavMode::AwaitingChoice,
            StepKind::Crossroad(crossroad) => NavMode::AwaitingCrossroad {
                crossroad_index: index,
                unlocked_at: now + Duration::from_millis(crossroad.delay_ms),
            },
            StepKind::ChoiceSummary(_) => NavMode::ShowingSummary,
            StepKind::Start(_) => NavMode::AtStart,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::Answer;
    use crate::step::{Choice, ChoiceOption, Crossroad, Position, Quiz, Size, Start};

    fn start_step() -> Step {
        Step::new(StepKind::Start(Start {
            background: "intro.png".into(),
            title: "T".into(),
            subtitle: "S".into(),
            button_text: "Go".into(),
        }))
    }

    fn quiz_step() -> Step {
        Step::new(StepKind::Quiz(Quiz {
            question: "Q?".into(),
            options: vec!["one".into(), "two".into()],
        }))
    }

    fn choice_step() -> Step {
        Step::new(StepKind::Choice(Choice {
            background: "bg.png".into(),
            choices: vec![
                ChoiceOption {
                    id: "x".into(),
                    image: "b.png".into(),
                    position: Position { x: 0.5, y: 0.5 },
                    size: Size {
                        width: 0.2,
                        height: 0.2,
                    },
                    results: Some("c.png".into()),
                },
                ChoiceOption {
                    id: "y".into(),
                    image: "y.png".into(),
                    position: Position { x: 0.2, y: 0.5 },
                    size: Size {
                        width: 0.2,
                        height: 0.2,
                    },
                    results: Some("y_result.png".into()),
                },
            ],
        }))
    }

    fn crossroad_step() -> Step {
        Step::new(StepKind::Crossroad(Crossroad {
            question: "q".into(),
            next_text: "n".into(),
            previous_text: "p".into(),
            delay_ms: 1000,
        }))
    }

    /// The §-example layout: media, choice, crossroad, media.
    fn branching_nav() -> Navigator {
        Navigator::new(StepSequence::new(vec![
            Step::media("a.png"),
            choice_step(),
            crossroad_step(),
            Step::media("d.png"),
        ]))
    }

    fn ids(nav: &Navigator) -> Vec<StepId> {
        nav.sequence().iter().map(|s| s.id().clone()).collect()
    }

    #[test]
    fn step_type_determines_post_advance_mode() {
        let now = Instant::now();
        let mut nav = Navigator::new(StepSequence::new(vec![
            Step::media("a.png"),
            quiz_step(),
        ]));
        assert_eq!(nav.mode(), NavMode::Idle);
        assert_eq!(nav.advance(now), NavOutcome::Moved(1));
        assert!(matches!(nav.mode(), NavMode::AwaitingQuiz { advance_at: None }));

        let mut nav = branching_nav();
        assert_eq!(nav.advance(now), NavOutcome::Moved(1));
        assert_eq!(nav.mode(), NavMode::AwaitingChoice);
    }

    #[test]
    fn start_gate_blocks_until_begin() {
        let now = Instant::now();
        let mut nav = Navigator::new(StepSequence::new(vec![
            start_step(),
            Step::media("a.png"),
            Step::media("b.png"),
        ]));
        assert_eq!(nav.mode(), NavMode::AtStart);
        assert_eq!(nav.advance(now), NavOutcome::Ignored);
        assert_eq!(nav.retreat(now), NavOutcome::Ignored);

        assert_eq!(nav.begin(now), NavOutcome::Moved(1));
        assert_eq!(nav.mode(), NavMode::Idle);

        // Never back into the gate.
        assert_eq!(nav.retreat(now), NavOutcome::Ignored);
        assert_eq!(nav.cursor(), 1);
    }

    #[test]
    fn advance_clamps_at_end() {
        let now = Instant::now();
        let mut nav = Navigator::new(StepSequence::new(vec![Step::media("a.png")]));
        assert_eq!(nav.advance(now), NavOutcome::Ignored);
        assert_eq!(nav.cursor(), 0);
    }

    #[test]
    fn quiz_guard_and_auto_advance() {
        let now = Instant::now();
        let mut nav = Navigator::new(StepSequence::new(vec![
            Step::media("a.png"),
            quiz_step(),
            Step::media("b.png"),
        ]));
        nav.advance(now);
        let quiz_id = nav.current_step().id().clone();

        // Guard: navigation intents are swallowed.
        assert_eq!(nav.advance(now), NavOutcome::Ignored);
        assert_eq!(nav.retreat(now), NavOutcome::Ignored);
        assert_eq!(nav.cursor(), 1);

        // Out-of-range option rejected without state change.
        assert_eq!(
            nav.submit_quiz(7, now),
            Err(NavError::InvalidQuizOption { index: 7 })
        );
        assert_eq!(nav.answers().len(), 0);

        nav.submit_quiz(1, now).unwrap();
        assert_eq!(
            nav.answers().get(&quiz_id),
            Some(&Answer::Quiz { option_index: 1 })
        );

        // Confirmation window: no move yet.
        assert_eq!(nav.tick(now), NavOutcome::Ignored);
        assert_eq!(nav.cursor(), 1);

        // After the confirmation delay the machine moves on by itself.
        let later = now + Duration::from_millis(1100);
        assert_eq!(nav.tick(later), NavOutcome::Moved(2));
        assert_eq!(nav.mode(), NavMode::Idle);
    }

    #[test]
    fn choice_selection_splices_and_arms_crossroad() {
        let now = Instant::now();
        let mut nav = branching_nav();
        nav.advance(now);
        assert_eq!(nav.mode(), NavMode::AwaitingChoice);

        // Stale id rejected, nothing changes.
        assert_eq!(
            nav.select_choice("zzz", now),
            Err(NavError::InvalidChoice { id: "zzz".into() })
        );
        assert_eq!(nav.sequence().len(), 4);

        assert_eq!(nav.select_choice("x", now), Ok(NavOutcome::Moved(2)));

        // Sequence is now [a.png, choice, c.png, crossroad, d.png].
        assert_eq!(nav.sequence().len(), 5);
        assert_eq!(nav.sequence().get(2).unwrap().media_path(), Some("c.png"));
        assert_eq!(nav.cursor(), 2);

        let NavMode::AwaitingCrossroad {
            crossroad_index,
            unlocked_at,
        } = nav.mode()
        else {
            panic!("expected crossroad gate, got {:?}", nav.mode());
        };
        assert_eq!(crossroad_index, 3);
        assert_eq!(unlocked_at, now + Duration::from_millis(1000));
        assert_eq!(nav.crossroad_unlocked(now), Some(false));
    }

    #[test]
    fn crossroad_locked_then_next_skips_gate() {
        let now = Instant::now();
        let mut nav = branching_nav();
        nav.advance(now);
        nav.select_choice("x", now).unwrap();

        // Locked: both actions ignored, as are swipes.
        assert_eq!(
            nav.crossroad_action(CrossroadAction::Next, now),
            NavOutcome::Ignored
        );
        assert_eq!(nav.advance(now), NavOutcome::Ignored);

        // After delay_ms, "next" lands past the crossroad on d.png.
        let unlocked = now + Duration::from_millis(1000);
        assert_eq!(
            nav.crossroad_action(CrossroadAction::Next, unlocked),
            NavOutcome::Moved(4)
        );
        assert_eq!(nav.mode(), NavMode::Idle);
        assert_eq!(nav.current_step().media_path(), Some("d.png"));
    }

    #[test]
    fn crossroad_previous_round_trips_sequence() {
        let now = Instant::now();
        let mut nav = branching_nav();
        nav.advance(now);
        let before = ids(&nav);

        nav.select_choice("x", now).unwrap();
        let unlocked = now + Duration::from_millis(1000);
        assert_eq!(
            nav.crossroad_action(CrossroadAction::Previous, unlocked),
            NavOutcome::Moved(1)
        );

        // Observably identical to the pre-selection state.
        assert_eq!(ids(&nav), before);
        assert_eq!(nav.cursor(), 1);
        assert_eq!(nav.mode(), NavMode::AwaitingChoice);
    }

    #[test]
    fn reselect_replaces_previous_insertion() {
        let now = Instant::now();
        let mut nav = branching_nav();
        nav.advance(now);

        nav.select_choice("x", now).unwrap();
        let len_after_one = nav.sequence().len();

        let unlocked = now + Duration::from_millis(1000);
        nav.crossroad_action(CrossroadAction::Previous, unlocked);
        nav.select_choice("y", unlocked).unwrap();

        assert_eq!(nav.sequence().len(), len_after_one);
        assert_eq!(
            nav.sequence().get(2).unwrap().media_path(),
            Some("y_result.png")
        );
    }

    #[test]
    fn retreat_into_crossroad_returns_to_choice() {
        let now = Instant::now();
        let mut nav = branching_nav();
        nav.advance(now);
        nav.select_choice("x", now).unwrap();

        // Leave the gate forward, then walk back into the branch.
        let unlocked = now + Duration::from_millis(1000);
        nav.crossroad_action(CrossroadAction::Next, unlocked);
        assert_eq!(nav.cursor(), 4);

        // d.png -> crossroad triggers the return logic directly.
        assert_eq!(nav.retreat(unlocked), NavOutcome::Moved(1));
        assert_eq!(nav.mode(), NavMode::AwaitingChoice);
        assert_eq!(nav.sequence().len(), 4);
    }

    #[test]
    fn retreat_onto_pending_result_returns_to_choice() {
        // No crossroad after the branch: the inserted result is plain
        // Idle media, so we can advance past it and retreat back onto it.
        let now = Instant::now();
        let mut nav = Navigator::new(StepSequence::new(vec![
            Step::media("a.png"),
            choice_step(),
            Step::media("d.png"),
        ]));
        nav.advance(now);
        nav.select_choice("x", now).unwrap();
        assert_eq!(nav.mode(), NavMode::Idle);
        assert_eq!(nav.cursor(), 2);

        nav.advance(now);
        assert_eq!(nav.current_step().media_path(), Some("d.png"));

        assert_eq!(nav.retreat(now), NavOutcome::Moved(1));
        assert_eq!(nav.mode(), NavMode::AwaitingChoice);
        assert_eq!(nav.sequence().len(), 3);
    }

    #[test]
    fn summary_complete_and_reset() {
        let now = Instant::now();
        let initial = vec![
            Step::media("a.png"),
            quiz_step(),
            Step::new(StepKind::ChoiceSummary(crate::step::ChoiceSummary {
                title: "Done".into(),
                description: "All".into(),
            })),
        ];
        let mut nav = Navigator::new(StepSequence::new(initial.clone()));
        nav.advance(now);
        nav.submit_quiz(0, now).unwrap();
        nav.tick(now + Duration::from_millis(1100));
        assert_eq!(nav.mode(), NavMode::ShowingSummary);

        // Last step: complete has nowhere to go.
        assert_eq!(nav.complete(now), NavOutcome::Ignored);
        assert_eq!(nav.advance(now), NavOutcome::Ignored);

        nav.reset(initial);
        assert_eq!(nav.cursor(), 0);
        assert_eq!(nav.mode(), NavMode::Idle);
        assert!(nav.answers().is_empty());
    }
}
