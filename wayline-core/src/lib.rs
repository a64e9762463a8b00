//! Branching media presentation engine.
//!
//! This crate provides:
//! - A spliceable step sequence with typed interactive screens
//! - A navigation state machine (cursor, overlay modes, input guards)
//! - A prioritized media cache with a worker pool, retries and a
//!   placeholder fallback
//! - Look-ahead prefetching tuned per device class
//! - Answer recording with JSON persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Instant;
//! use wayline_core::{NullSink, Presentation, PresentationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(wayline_assets::HttpAssets::new("http://localhost:8000")?);
//!     let mut session = Presentation::load(
//!         "order.json",
//!         fetcher,
//!         Arc::new(NullSink),
//!         PresentationConfig::new(),
//!     )
//!     .await?;
//!
//!     session.begin(Instant::now());
//!     let snapshot = session.snapshot(Instant::now());
//!     println!("step {} of {}", snapshot.cursor + 1, snapshot.len);
//!     Ok(())
//! }
//! ```

pub mod answers;
pub mod cache;
pub mod manifest;
pub mod nav;
pub mod prefetch;
pub mod sequence;
pub mod session;
pub mod step;
pub mod testing;

// Primary public API
pub use answers::{Answer, AnswerStore, CollectedResult};
pub use cache::{
    CacheConfig, DeviceClass, FetchError, FetchFuture, FetchMedia, FetchPriority, FetchedMedia,
    MediaAsset, MediaCache, MediaStatus, QualityHint,
};
pub use manifest::{Manifest, ManifestError, SoundSections};
pub use nav::{CrossroadAction, NavError, NavMode, NavOutcome, Navigator};
pub use prefetch::Prefetcher;
pub use sequence::StepSequence;
pub use session::{
    AnswerSink, ChoiceSubmission, NullSink, Presentation, PresentationConfig, PresentationError,
    QuizSubmission, Snapshot,
};
pub use step::{Step, StepId, StepKind};
