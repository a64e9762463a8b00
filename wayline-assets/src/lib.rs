//! HTTP collaborators for the presentation engine.
//!
//! This crate provides the network half of a wayline deployment:
//! - [`AssetResolver`] maps media identities to backend URLs, including
//!   the reduced-quality thumbnail variant
//! - [`HttpAssets`] implements [`FetchMedia`] over reqwest
//! - [`HttpAnswerSink`] posts recorded answers, fire and forget

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use wayline_core::cache::{FetchError, FetchFuture, FetchMedia, FetchedMedia, QualityHint};
use wayline_core::session::{AnswerSink, ChoiceSubmission, QuizSubmission};
use wayline_core::step::{media_kind, MediaKind};

/// Errors from constructing the HTTP collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Maps media identities to URLs on the content backend.
///
/// Full quality reads straight from `contents/`; reduced quality asks
/// the backend for a server-side thumbnail. Only images have a reduced
/// variant, everything else always resolves to the full URL.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    base: String,
}

impl AssetResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let base = base_url.into().trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(Error::Config(format!("base url {base:?} is not http(s)")));
        }
        Ok(Self { base })
    }

    /// URL for a media identity at the requested quality.
    pub fn url_for(&self, identity: &str, quality: QualityHint) -> String {
        match quality {
            QualityHint::Reduced if media_kind(identity) == MediaKind::Image => {
                format!("{}/api/file/{identity}/thumbnail?size=400", self.base)
            }
            _ => format!("{}/contents/{identity}", self.base),
        }
    }

    /// Endpoint for recorded quiz answers.
    pub fn quiz_answer_url(&self) -> String {
        format!("{}/api/save-quiz-answer", self.base)
    }

    /// Endpoint for recorded choice selections.
    pub fn choice_answer_url(&self) -> String {
        format!("{}/api/save-choice", self.base)
    }
}

/// [`FetchMedia`] implementation over HTTP.
#[derive(Clone)]
pub struct HttpAssets {
    client: reqwest::Client,
    resolver: AssetResolver,
}

impl HttpAssets {
    /// Create a fetcher against the given backend.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            client,
            resolver: AssetResolver::new(base_url)?,
        })
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }
}

impl FetchMedia for HttpAssets {
    fn fetch(&self, identity: &str, quality: QualityHint) -> FetchFuture {
        let url = self.resolver.url_for(identity, quality);
        let client = self.client.clone();

        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?
                .to_vec();

            Ok(FetchedMedia {
                url,
                content_type,
                bytes,
            })
        })
    }
}

/// [`FetchMedia`] implementation over a local content directory.
///
/// Serves the same layout the backend exposes under `contents/`, for
/// running without a server. There is no reduced-quality variant on
/// disk, so the quality hint is ignored.
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: std::path::PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FetchMedia for FsAssets {
    fn fetch(&self, identity: &str, _quality: QualityHint) -> FetchFuture {
        let path = self.root.join(identity);
        let url = format!("file://{}", path.display());

        Box::pin(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| FetchError::Network(format!("{}: {e}", path.display())))?;
            Ok(FetchedMedia {
                url,
                content_type: None,
                bytes,
            })
        })
    }
}

#[derive(Serialize)]
struct QuizPayload<'a> {
    step_id: &'a str,
    question: &'a str,
    selected_option_index: usize,
    selected_option: &'a str,
    timestamp: u64,
}

#[derive(Serialize)]
struct ChoicePayload<'a> {
    step_id: &'a str,
    choice_id: &'a str,
    timestamp: u64,
}

/// [`AnswerSink`] that posts answers to the backend.
///
/// Submissions run on spawned tasks so navigation never waits on the
/// network; failures are logged and otherwise dropped. The in-memory
/// answer store remains the source of truth either way.
pub struct HttpAnswerSink {
    client: reqwest::Client,
    resolver: AssetResolver,
}

impl HttpAnswerSink {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            client,
            resolver: AssetResolver::new(base_url)?,
        })
    }

    fn post(&self, url: String, body: serde_json::Value) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(url, status = response.status().as_u16(), "answer submission rejected");
                }
                Ok(_) => {}
                Err(e) => warn!(url, error = %e, "answer submission failed"),
            }
        });
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AnswerSink for HttpAnswerSink {
    fn submit_quiz(&self, submission: QuizSubmission) {
        let payload = QuizPayload {
            step_id: submission.step_id.as_str(),
            question: &submission.question,
            selected_option_index: submission.option_index,
            selected_option: &submission.option,
            timestamp: unix_timestamp(),
        };
        match serde_json::to_value(&payload) {
            Ok(body) => self.post(self.resolver.quiz_answer_url(), body),
            Err(e) => warn!(error = %e, "failed to encode quiz answer"),
        }
    }

    fn submit_choice(&self, submission: ChoiceSubmission) {
        let payload = ChoicePayload {
            step_id: submission.step_id.as_str(),
            choice_id: &submission.choice_id,
            timestamp: unix_timestamp(),
        };
        match serde_json::to_value(&payload) {
            Ok(body) => self.post(self.resolver.choice_answer_url(), body),
            Err(e) => warn!(error = %e, "failed to encode choice answer"),
        }
    }
}
