//! Main application state and logic

use std::path::PathBuf;
use std::time::Instant;

use wayline_core::{CrossroadAction, NavMode, NavOutcome, Presentation};

use crate::ui::theme::Theme;

/// Main application state
pub struct App {
    pub session: Presentation,
    pub theme: Theme,
    pub muted: bool,
    pub should_quit: bool,
    /// Answers are persisted here after every recorded answer.
    answers_path: Option<PathBuf>,
    answers_dirty: bool,
    status_message: Option<String>,
}

impl App {
    pub fn new(session: Presentation, answers_path: Option<PathBuf>) -> Self {
        Self {
            session,
            theme: Theme::default(),
            muted: false,
            should_quit: false,
            answers_path,
            answers_dirty: false,
            status_message: None,
        }
    }

    /// Path to save answers to, when an unsaved answer is pending.
    /// Drains the dirty flag; the event loop performs the actual save.
    pub fn take_dirty_answers(&mut self) -> Option<PathBuf> {
        if !self.answers_dirty {
            return None;
        }
        self.answers_dirty = false;
        self.answers_path.clone()
    }

    pub fn status(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.set_status(if self.muted { "Sound off" } else { "Sound on" });
    }

    /// Enter/confirm: leaves the start gate or exits the summary.
    pub fn confirm(&mut self) {
        let now = Instant::now();
        match self.session.mode() {
            NavMode::AtStart => {
                self.session.begin(now);
                self.clear_status();
            }
            NavMode::ShowingSummary => {
                if self.session.complete(now) == NavOutcome::Ignored {
                    self.set_status("End of presentation");
                }
            }
            _ => {}
        }
    }

    pub fn advance(&mut self) {
        if let NavOutcome::Moved(_) = self.session.advance(Instant::now()) {
            self.clear_status();
        }
    }

    pub fn retreat(&mut self) {
        if let NavOutcome::Moved(_) = self.session.retreat(Instant::now()) {
            self.clear_status();
        }
    }

    /// Digit input: quiz option or choice option, 1-based.
    pub fn select(&mut self, number: usize) {
        let now = Instant::now();
        let index = number.saturating_sub(1);
        match self.session.mode() {
            NavMode::AwaitingQuiz { .. } => match self.session.submit_quiz(index, now) {
                Ok(()) => {
                    self.answers_dirty = true;
                    self.set_status("Answer recorded");
                }
                Err(e) => self.set_status(e.to_string()),
            },
            NavMode::AwaitingChoice => {
                let Some(id) = self.choice_id(index, now) else {
                    self.set_status(format!("No option {number}"));
                    return;
                };
                match self.session.select_choice(&id, now) {
                    Ok(_) => {
                        self.answers_dirty = true;
                        self.clear_status();
                    }
                    Err(e) => self.set_status(e.to_string()),
                }
            }
            _ => {}
        }
    }

    pub fn crossroad(&mut self, action: CrossroadAction) {
        let now = Instant::now();
        if let NavMode::AwaitingCrossroad { .. } = self.session.mode() {
            if self.session.crossroad_action(action, now) == NavOutcome::Ignored {
                self.set_status("Not yet, give it a moment");
            } else {
                self.clear_status();
            }
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.answers_dirty = true;
        self.set_status("Restarted");
    }

    pub fn tick(&mut self) {
        self.session.tick(Instant::now());
    }

    fn choice_id(&self, index: usize, now: Instant) -> Option<String> {
        self.session
            .snapshot(now)
            .step
            .as_choice()
            .and_then(|choice| choice.choices.get(index))
            .map(|option| option.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayline_core::testing::{sample_manifest, ScriptedFetcher};
    use wayline_core::{NullSink, PresentationConfig};

    fn test_app(answers_path: Option<PathBuf>) -> App {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let session = Presentation::new(
            sample_manifest(),
            fetcher,
            Arc::new(NullSink),
            PresentationConfig::new(),
        );
        App::new(session, answers_path)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recorded_answer_marks_answers_for_saving() {
        let mut app = test_app(Some("answers.json".into()));
        assert_eq!(app.take_dirty_answers(), None);

        app.confirm(); // leave the start gate
        app.advance(); // onto the quiz
        app.select(1);

        assert_eq!(app.take_dirty_answers(), Some("answers.json".into()));
        // Drained until the next recorded answer.
        assert_eq!(app.take_dirty_answers(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn without_answers_path_saving_is_never_requested() {
        let mut app = test_app(None);
        app.confirm();
        app.advance();
        app.select(1);
        assert_eq!(app.take_dirty_answers(), None);
    }
}
