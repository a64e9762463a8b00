//! Presentation session - the primary public API.
//!
//! Wraps the navigation state machine, media cache and prefetcher into
//! one façade: feed it input intents and ticks, read back snapshots.
//! Mirrors the split the front end needs: all state mutation happens on
//! the caller's thread, while cache population runs in its own async
//! domain and is only ever observed through entry status.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::answers::{AnswerStore, AnswerStoreError, CollectedResult};
use crate::cache::{
    CacheConfig, DeviceClass, FetchMedia, FetchPriority, MediaAsset, MediaCache, MediaStatus,
};
use crate::manifest::{Manifest, ManifestError, SoundSections};
use crate::nav::{CrossroadAction, NavError, NavMode, NavOutcome, Navigator};
use crate::prefetch::Prefetcher;
use crate::sequence::StepSequence;
use crate::step::{Crossroad, Step, StepId};

/// Errors from session-level operations. Navigation and cache failures
/// never surface here; manifest loading is the one fatal path.
#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("answer store error: {0}")]
    Answers(#[from] AnswerStoreError),
}

/// A recorded quiz answer on its way to the collaborator backend.
#[derive(Debug, Clone)]
pub struct QuizSubmission {
    pub step_id: StepId,
    pub question: String,
    pub option_index: usize,
    pub option: String,
}

/// A recorded choice selection on its way to the collaborator backend.
#[derive(Debug, Clone)]
pub struct ChoiceSubmission {
    pub step_id: StepId,
    pub choice_id: String,
}

/// Fire-and-forget remote persistence of answers. Implementations log
/// failures; nothing here may block or fail navigation.
pub trait AnswerSink: Send + Sync + 'static {
    fn submit_quiz(&self, submission: QuizSubmission);
    fn submit_choice(&self, submission: ChoiceSubmission);
}

/// Sink that keeps answers local only.
pub struct NullSink;

impl AnswerSink for NullSink {
    fn submit_quiz(&self, submission: QuizSubmission) {
        debug!(step = %submission.step_id, option = submission.option_index, "quiz answer kept local");
    }

    fn submit_choice(&self, submission: ChoiceSubmission) {
        debug!(step = %submission.step_id, choice = %submission.choice_id, "choice kept local");
    }
}

/// Configuration for creating a presentation session.
#[derive(Debug, Clone)]
pub struct PresentationConfig {
    pub device: DeviceClass,
    pub cache: CacheConfig,
    pub prefetch_debounce: Duration,
}

impl PresentationConfig {
    pub fn new() -> Self {
        Self::for_device(DeviceClass::Desktop)
    }

    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            device,
            cache: CacheConfig::for_device(device),
            prefetch_debounce: Duration::from_millis(100),
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_prefetch_debounce(mut self, debounce: Duration) -> Self {
        self.prefetch_debounce = debounce;
        self
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the session for the renderer.
pub struct Snapshot<'a> {
    pub cursor: usize,
    pub len: usize,
    pub step: &'a Step,
    pub mode: NavMode,
    /// Readiness of the step's primary media, if it has one.
    pub media_status: Option<MediaStatus>,
    pub media: Option<Arc<MediaAsset>>,
    /// The crossroad whose gate is active, when in that mode.
    pub crossroad: Option<&'a Crossroad>,
    pub crossroad_unlocked: Option<bool>,
    pub sound: Option<&'a str>,
}

/// An interactive presentation session.
pub struct Presentation {
    nav: Navigator,
    cache: MediaCache,
    prefetcher: Prefetcher,
    sounds: SoundSections,
    initial: Vec<Step>,
    sink: Arc<dyn AnswerSink>,
}

impl Presentation {
    /// Create a session from a parsed manifest. Spawns the cache worker
    /// pool, so a tokio runtime must be current.
    pub fn new(
        manifest: Manifest,
        fetcher: Arc<dyn FetchMedia>,
        sink: Arc<dyn AnswerSink>,
        config: PresentationConfig,
    ) -> Self {
        let cache = MediaCache::new(fetcher, config.cache.clone());
        let prefetcher = Prefetcher::with_debounce(
            cache.clone(),
            config.device,
            config.prefetch_debounce,
        );
        let nav = Navigator::new(StepSequence::new(manifest.steps.clone()));

        let session = Self {
            nav,
            cache,
            prefetcher,
            sounds: manifest.sounds,
            initial: manifest.steps,
            sink,
        };
        // Warm the entry screen before any input arrives.
        session.after_move();
        session
    }

    /// Load the manifest from disk and build a session over it.
    pub async fn load(
        path: impl AsRef<Path>,
        fetcher: Arc<dyn FetchMedia>,
        sink: Arc<dyn AnswerSink>,
        config: PresentationConfig,
    ) -> Result<Self, PresentationError> {
        let manifest = Manifest::load(path).await?;
        Ok(Self::new(manifest, fetcher, sink, config))
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn answers(&self) -> &AnswerStore {
        self.nav.answers()
    }

    pub fn mode(&self) -> NavMode {
        self.nav.mode()
    }

    pub fn cursor(&self) -> usize {
        self.nav.cursor()
    }

    pub fn collected_results(&self) -> Vec<CollectedResult> {
        self.nav.answers().collected_results(self.nav.sequence())
    }

    /// Leave the start gate.
    pub fn begin(&mut self, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.begin(now))
    }

    /// Advance intent.
    pub fn advance(&mut self, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.advance(now))
    }

    /// Retreat intent.
    pub fn retreat(&mut self, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.retreat(now))
    }

    /// Submit a quiz answer; forwards it to the answer sink.
    pub fn submit_quiz(&mut self, option_index: usize, now: Instant) -> Result<(), NavError> {
        self.nav.submit_quiz(option_index, now)?;

        let step = self.nav.current_step();
        if let Some(quiz) = step.as_quiz() {
            self.sink.submit_quiz(QuizSubmission {
                step_id: step.id().clone(),
                question: quiz.question.clone(),
                option_index,
                option: quiz
                    .options
                    .get(option_index)
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Select a choice option; forwards it to the answer sink and pulls
    /// the inserted result media at top priority.
    pub fn select_choice(
        &mut self,
        choice_id: &str,
        now: Instant,
    ) -> Result<NavOutcome, NavError> {
        let step_id = self.nav.current_step().id().clone();
        let outcome = self.nav.select_choice(choice_id, now)?;
        if let NavOutcome::Moved(_) = outcome {
            self.sink.submit_choice(ChoiceSubmission {
                step_id,
                choice_id: choice_id.to_string(),
            });
            self.after_move();
        }
        Ok(outcome)
    }

    /// Resolve the crossroad gate.
    pub fn crossroad_action(&mut self, action: CrossroadAction, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.crossroad_action(action, now))
    }

    /// Exit the summary forward.
    pub fn complete(&mut self, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.complete(now))
    }

    /// Timer-driven transitions; call from the event loop.
    pub fn tick(&mut self, now: Instant) -> NavOutcome {
        self.dispatch(|nav| nav.tick(now))
    }

    /// Full retake: pristine sequence, cleared answers, cursor home.
    pub fn reset(&mut self) {
        info!("resetting presentation");
        self.nav.reset(self.initial.clone());
        self.after_move();
    }

    /// Persist recorded answers.
    pub async fn save_answers(&self, path: impl AsRef<Path>) -> Result<(), PresentationError> {
        self.nav.answers().save(path).await?;
        Ok(())
    }

    /// Replay a previously saved answer store into this session.
    pub async fn load_answers(&mut self, path: impl AsRef<Path>) -> Result<(), PresentationError> {
        let loaded = AnswerStore::load(path).await?;
        *self.nav.answers_mut() = loaded;
        Ok(())
    }

    /// Read-only view for the renderer.
    pub fn snapshot(&self, now: Instant) -> Snapshot<'_> {
        let step = self.nav.current_step();
        let primary = step.primary_media();
        let crossroad = match self.nav.mode() {
            NavMode::AwaitingCrossroad {
                crossroad_index, ..
            } => self
                .nav
                .sequence()
                .get(crossroad_index)
                .ok()
                .and_then(Step::as_crossroad),
            _ => None,
        };

        Snapshot {
            cursor: self.nav.cursor(),
            len: self.nav.sequence().len(),
            step,
            mode: self.nav.mode(),
            media_status: primary.map(|path| self.cache.status(path)),
            media: primary.and_then(|path| self.cache.get(path)),
            crossroad,
            crossroad_unlocked: self.nav.crossroad_unlocked(now),
            sound: self
                .sounds
                .sound_for(self.nav.cursor(), self.nav.sequence().len()),
        }
    }

    fn dispatch(&mut self, intent: impl FnOnce(&mut Navigator) -> NavOutcome) -> NavOutcome {
        let outcome = intent(&mut self.nav);
        if let NavOutcome::Moved(_) = outcome {
            self.after_move();
        }
        outcome
    }

    /// Pull the current step's media immediately and warm the window.
    fn after_move(&self) {
        if let Some(path) = self.nav.current_step().primary_media() {
            self.cache.request(path, FetchPriority::CURRENT);
        }
        self.prefetcher
            .on_cursor_changed(self.nav.sequence(), self.nav.cursor());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_manifest, ScriptedFetcher};
    use std::sync::Mutex;

    struct RecordingSink {
        quizzes: Mutex<Vec<QuizSubmission>>,
        choices: Mutex<Vec<ChoiceSubmission>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                quizzes: Mutex::new(Vec::new()),
                choices: Mutex::new(Vec::new()),
            }
        }
    }

    impl AnswerSink for RecordingSink {
        fn submit_quiz(&self, submission: QuizSubmission) {
            self.quizzes.lock().unwrap().push(submission);
        }

        fn submit_choice(&self, submission: ChoiceSubmission) {
            self.choices.lock().unwrap().push(submission);
        }
    }

    fn session_with_sink(sink: Arc<dyn AnswerSink>) -> Presentation {
        let fetcher = Arc::new(ScriptedFetcher::new());
        Presentation::new(
            sample_manifest(),
            fetcher,
            sink,
            PresentationConfig::new().with_prefetch_debounce(Duration::ZERO),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn walkthrough_reaches_summary() {
        let now = Instant::now();
        let mut session = session_with_sink(Arc::new(NullSink));

        // start -> a.png
        assert_eq!(session.begin(now), NavOutcome::Moved(1));
        // a.png -> quiz
        session.advance(now);
        assert!(matches!(session.mode(), NavMode::AwaitingQuiz { .. }));
        session.submit_quiz(0, now).unwrap();
        let now = now + Duration::from_millis(1100);
        session.tick(now);

        // choice -> result -> crossroad gate
        assert_eq!(session.mode(), NavMode::AwaitingChoice);
        session.select_choice("x", now).unwrap();
        let now = now + Duration::from_millis(1000);
        session.crossroad_action(CrossroadAction::Next, now);

        // d.webm -> summary
        session.advance(now);
        assert_eq!(session.mode(), NavMode::ShowingSummary);
        assert_eq!(session.collected_results().len(), 1);
        assert_eq!(session.collected_results()[0].image, "c.png");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn answers_flow_to_sink() {
        let now = Instant::now();
        let sink = Arc::new(RecordingSink::new());
        let mut session = session_with_sink(sink.clone());

        session.begin(now);
        session.advance(now);
        session.submit_quiz(1, now).unwrap();

        let quizzes = sink.quizzes.lock().unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].option, "two");
        drop(quizzes);

        let now = now + Duration::from_millis(1100);
        session.tick(now);
        session.select_choice("x", now).unwrap();
        let choices = sink.choices.lock().unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].choice_id, "x");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_choice_does_not_reach_sink() {
        let now = Instant::now();
        let sink = Arc::new(RecordingSink::new());
        let mut session = session_with_sink(sink.clone());

        session.begin(now);
        session.advance(now);
        session.submit_quiz(0, now).unwrap();
        let now = now + Duration::from_millis(1100);
        session.tick(now);

        assert!(session.select_choice("bogus", now).is_err());
        assert!(sink.choices.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_clears_everything() {
        let now = Instant::now();
        let mut session = session_with_sink(Arc::new(NullSink));
        session.begin(now);
        session.advance(now);
        session.submit_quiz(0, now).unwrap();

        session.reset();
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.mode(), NavMode::AtStart);
        assert!(session.answers().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn answers_survive_save_and_load() {
        let now = Instant::now();
        let mut session = session_with_sink(Arc::new(NullSink));
        session.begin(now);
        session.advance(now);
        session.submit_quiz(1, now).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        session.save_answers(&path).await.unwrap();

        let mut replay = session_with_sink(Arc::new(NullSink));
        replay.load_answers(&path).await.unwrap();
        assert_eq!(replay.answers().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_reflects_crossroad_gate() {
        let now = Instant::now();
        let mut session = session_with_sink(Arc::new(NullSink));
        session.begin(now);
        session.advance(now);
        session.submit_quiz(0, now).unwrap();
        let now = now + Duration::from_millis(1100);
        session.tick(now);
        session.select_choice("x", now).unwrap();

        let snap = session.snapshot(now);
        assert_eq!(snap.step.media_path(), Some("c.png"));
        assert_eq!(snap.crossroad_unlocked, Some(false));
        assert_eq!(snap.crossroad.unwrap().next_text, "n");

        let snap = session.snapshot(now + Duration::from_millis(1000));
        assert_eq!(snap.crossroad_unlocked, Some(true));
    }
}
