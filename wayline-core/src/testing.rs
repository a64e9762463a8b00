//! Testing utilities for the presentation engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedFetcher` for deterministic cache tests without a network
//! - `sample_manifest` for a small but complete presentation
//! - Assertion helpers for verifying navigation state

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::{FetchError, FetchFuture, FetchMedia, FetchedMedia, QualityHint};
use crate::manifest::{Manifest, SoundSection, SoundSections};
use crate::nav::{NavMode, NavOutcome, Navigator};
use crate::step::{
    Choice, ChoiceOption, ChoiceSummary, Crossroad, Position, Quiz, Size, Start, Step, StepKind,
};

/// Per-key behavior of a [`ScriptedFetcher`].
enum Script {
    /// Resolve with these bytes, after an optional delay.
    Succeed {
        bytes: Vec<u8>,
        delay: Option<Duration>,
    },
    /// Fail every attempt.
    FailAlways,
    /// Never resolve; exercises the attempt timeout.
    Hang,
    /// Fail a fixed number of attempts, then resolve.
    FailThenSucceed {
        failures_left: usize,
        bytes: Vec<u8>,
    },
}

/// A fetcher that returns scripted outcomes and records every call.
///
/// Keys without a script resolve immediately with empty bytes, so tests
/// only script the keys whose behavior they care about.
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script `key` to resolve immediately with `bytes`.
    pub fn succeed(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.scripts.lock().unwrap().insert(
            key.into(),
            Script::Succeed {
                bytes,
                delay: None,
            },
        );
    }

    /// Script `key` to resolve with `bytes` after `delay`.
    pub fn succeed_after(&self, key: impl Into<String>, bytes: Vec<u8>, delay: Duration) {
        self.scripts.lock().unwrap().insert(
            key.into(),
            Script::Succeed {
                bytes,
                delay: Some(delay),
            },
        );
    }

    /// Script `key` to fail every attempt.
    pub fn fail_always(&self, key: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.into(), Script::FailAlways);
    }

    /// Script `key` to never resolve.
    pub fn hang(&self, key: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.into(), Script::Hang);
    }

    /// Script `key` to fail `failures` attempts, then resolve with
    /// `bytes`.
    pub fn fail_then_succeed(&self, key: impl Into<String>, failures: usize, bytes: Vec<u8>) {
        self.scripts.lock().unwrap().insert(
            key.into(),
            Script::FailThenSucceed {
                failures_left: failures,
                bytes,
            },
        );
    }

    /// How many fetch attempts were made for `key`.
    pub fn fetch_count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    /// Every fetched key, in attempt order.
    pub fn fetch_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

enum Plan {
    Succeed {
        bytes: Vec<u8>,
        delay: Option<Duration>,
    },
    Fail,
    Hang,
}

impl FetchMedia for ScriptedFetcher {
    fn fetch(&self, identity: &str, _quality: QualityHint) -> FetchFuture {
        self.calls.lock().unwrap().push(identity.to_string());

        // Scripts that count down must mutate under the lock, so the
        // outcome is decided here and the future just plays it out.
        let plan = match self.scripts.lock().unwrap().get_mut(identity) {
            None => Plan::Succeed {
                bytes: Vec::new(),
                delay: None,
            },
            Some(Script::Succeed { bytes, delay }) => Plan::Succeed {
                bytes: bytes.clone(),
                delay: *delay,
            },
            Some(Script::FailAlways) => Plan::Fail,
            Some(Script::Hang) => Plan::Hang,
            Some(Script::FailThenSucceed {
                failures_left,
                bytes,
            }) => {
                if *failures_left > 0 {
                    *failures_left -= 1;
                    Plan::Fail
                } else {
                    Plan::Succeed {
                        bytes: bytes.clone(),
                        delay: None,
                    }
                }
            }
        };

        let url = format!("test://{identity}");
        Box::pin(async move {
            match plan {
                Plan::Succeed { bytes, delay } => {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(FetchedMedia {
                        url,
                        content_type: None,
                        bytes,
                    })
                }
                Plan::Fail => Err(FetchError::Network("scripted failure".into())),
                Plan::Hang => futures::future::pending().await,
            }
        })
    }
}

/// A small but complete presentation: start gate, media, quiz, choice
/// with a result and a crossroad, closing media, summary.
pub fn sample_steps() -> Vec<Step> {
    vec![
        Step::new(StepKind::Start(Start {
            background: "intro.png".into(),
            title: "Sample".into(),
            subtitle: "A tiny presentation".into(),
            button_text: "Start".into(),
        })),
        Step::media("a.png"),
        Step::new(StepKind::Quiz(Quiz {
            question: "Q?".into(),
            options: vec!["one".into(), "two".into()],
        })),
        Step::new(StepKind::Choice(Choice {
            background: "bg.png".into(),
            choices: vec![
                ChoiceOption {
                    id: "x".into(),
                    image: "b.png".into(),
                    position: Position { x: 0.3, y: 0.5 },
                    size: Size {
                        width: 0.2,
                        height: 0.2,
                    },
                    results: Some("c.png".into()),
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
        })),
        Step::new(StepKind::Crossroad(Crossroad {
            question: "Continue?".into(),
            next_text: "n".into(),
            previous_text: "p".into(),
            delay_ms: 1000,
        })),
        Step::media("d.webm"),
        Step::new(StepKind::ChoiceSummary(ChoiceSummary {
            title: "Done".into(),
            description: "Your picks".into(),
        })),
    ]
}

/// [`sample_steps`] wrapped into a manifest with one sound section
/// covering the whole run.
pub fn sample_manifest() -> Manifest {
    Manifest {
        steps: sample_steps(),
        sounds: SoundSections::new(vec![SoundSection {
            start: 0,
            end: -1,
            sound: "theme.mp3".into(),
        }]),
    }
}

/// Assert the cursor landed on `index`.
#[track_caller]
pub fn assert_moved(outcome: NavOutcome, index: usize) {
    assert_eq!(
        outcome,
        NavOutcome::Moved(index),
        "expected a move to step {index}"
    );
}

/// Assert the machine swallowed the intent.
#[track_caller]
pub fn assert_ignored(outcome: NavOutcome) {
    assert_eq!(outcome, NavOutcome::Ignored, "expected the intent ignored");
}

/// Assert cursor position and mode in one shot.
#[track_caller]
pub fn assert_at(nav: &Navigator, cursor: usize, mode: NavMode) {
    assert_eq!(nav.cursor(), cursor, "cursor mismatch");
    assert_eq!(nav.mode(), mode, "mode mismatch");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchPriority;
    use crate::cache::{CacheConfig, MediaCache, MediaStatus, QualityHint, RetryPolicy};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread")]
    async fn unscripted_keys_succeed_empty() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let cache = MediaCache::new(
            fetcher.clone(),
            CacheConfig {
                workers: 1,
                quality: QualityHint::Full,
                policy: RetryPolicy::default(),
                max_queue: 8,
            },
        );

        cache.request("anything.png", FetchPriority::CURRENT);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while cache.status("anything.png") != MediaStatus::Ready {
            assert!(std::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cache.get("anything.png").unwrap().bytes.is_empty());
        assert_eq!(fetcher.fetch_count("anything.png"), 1);
    }

    #[test]
    fn sample_walkthrough_with_helpers() {
        let now = std::time::Instant::now();
        let mut nav = Navigator::new(crate::sequence::StepSequence::new(sample_steps()));
        assert_at(&nav, 0, NavMode::AtStart);
        assert_ignored(nav.advance(now));

        assert_moved(nav.begin(now), 1);
        assert_moved(nav.advance(now), 2);
        assert!(matches!(nav.mode(), NavMode::AwaitingQuiz { .. }));
    }
}
