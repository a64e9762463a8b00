//! Media readiness cache with priority-ordered asynchronous population.
//!
//! The cache answers one question for the navigation layer: "is this
//! media item ready to render instantly." Population happens in a small
//! worker pool draining a priority queue; the navigation side only ever
//! reads entry status. Entries move `NotRequested -> InFlight ->
//! {Ready | Failed}`; a failed entry is retried with linear backoff and,
//! once retries are exhausted, bound to a built-in placeholder so the
//! presentation can never dead-end on a missing asset.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 1x1 transparent PNG used when an asset cannot be fetched at all.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Device/network class. Constrained classes get fewer workers, a
/// shorter prefetch window and reduced-quality image variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn workers(self) -> usize {
        match self {
            DeviceClass::Desktop => 4,
            DeviceClass::Mobile => 2,
        }
    }

    pub fn quality(self) -> QualityHint {
        match self {
            DeviceClass::Desktop => QualityHint::Full,
            DeviceClass::Mobile => QualityHint::Reduced,
        }
    }

    pub fn prefetch_window(self) -> usize {
        match self {
            DeviceClass::Desktop => 3,
            DeviceClass::Mobile => 2,
        }
    }

    pub fn prefetch_videos(self) -> bool {
        matches!(self, DeviceClass::Desktop)
    }
}

/// Requested asset quality. Purely a URL-construction hint for the
/// resolver; the cache itself does not care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityHint {
    Full,
    Reduced,
}

/// Errors from a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("invalid asset url: {0}")]
    Url(String),
}

/// Raw fetched media, as produced by a [`FetchMedia`] implementation.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchedMedia, FetchError>> + Send>>;

/// The seam between the cache and the network. The HTTP implementation
/// lives in `wayline-assets`; tests script their own.
pub trait FetchMedia: Send + Sync + 'static {
    fn fetch(&self, identity: &str, quality: QualityHint) -> FetchFuture;
}

/// A cached media asset ready for rendering.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// True when this is the built-in fallback, not the real asset.
    pub placeholder: bool,
}

impl MediaAsset {
    fn placeholder(identity: &str) -> Self {
        Self {
            url: format!("placeholder:{identity}"),
            content_type: Some("image/png".to_string()),
            bytes: PLACEHOLDER_PNG.to_vec(),
            placeholder: true,
        }
    }
}

impl From<FetchedMedia> for MediaAsset {
    fn from(fetched: FetchedMedia) -> Self {
        Self {
            url: fetched.url,
            content_type: fetched.content_type,
            bytes: fetched.bytes,
            placeholder: false,
        }
    }
}

/// Per-key readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaStatus {
    #[default]
    NotRequested,
    InFlight,
    Ready,
    Failed,
}

/// Scheduling urgency. Lower values drain first; `CURRENT` is reserved
/// for the step under the cursor. Priority affects ordering only, never
/// correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchPriority(pub u32);

impl FetchPriority {
    pub const CURRENT: FetchPriority = FetchPriority(0);

    /// Priority for a step `distance` positions ahead of the cursor.
    pub fn ahead(distance: usize) -> Self {
        FetchPriority(distance.min(u32::MAX as usize) as u32)
    }

    pub const BACKGROUND: FetchPriority = FetchPriority(u32::MAX);
}

/// Retry behavior for a single cache key, centralized so every call
/// site shares one policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before falling back to the placeholder.
    pub max_attempts: u32,
    /// Per-attempt timeout.
    pub attempt_timeout: Duration,
    /// Linear backoff: attempt `n` waits `n * backoff_step` before retrying.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            attempt_timeout: Duration::from_secs(6),
            backoff_step: Duration::from_millis(750),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Cache construction parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub workers: usize,
    pub quality: QualityHint,
    pub policy: RetryPolicy,
    /// Queued-request cap; the least urgent pending requests are dropped
    /// past this point (they can always be re-requested).
    pub max_queue: usize,
}

impl CacheConfig {
    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            workers: device.workers(),
            quality: device.quality(),
            policy: RetryPolicy::default(),
            max_queue: 32,
        }
    }
}

#[derive(Debug)]
struct QueuedFetch {
    key: String,
    priority: FetchPriority,
    seq: u64,
}

impl PartialEq for QueuedFetch {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedFetch {}

impl Ord for QueuedFetch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap pops the maximum: invert so the smallest priority
        // value (most urgent) drains first, FIFO within a priority.
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedFetch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Entry {
    status: MediaStatus,
    asset: Option<Arc<MediaAsset>>,
    attempts: u32,
}

struct Inner {
    entries: HashMap<String, Entry>,
    queue: BinaryHeap<QueuedFetch>,
    queued: HashSet<String>,
    next_seq: u64,
    max_queue: usize,
}

impl Inner {
    fn new(max_queue: usize) -> Self {
        Self {
            entries: HashMap::new(),
            queue: BinaryHeap::new(),
            queued: HashSet::new(),
            next_seq: 0,
            max_queue,
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
    fetcher: Arc<dyn FetchMedia>,
    policy: RetryPolicy,
    quality: QualityHint,
}

/// Aborts the worker tasks when the last cache handle is dropped.
struct WorkerGuard(Vec<JoinHandle<()>>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// The media readiness cache. Cheap to clone; all clones share entries
/// and the worker pool.
#[derive(Clone)]
pub struct MediaCache {
    shared: Arc<Shared>,
    _workers: Arc<WorkerGuard>,
}

impl MediaCache {
    /// Create a cache and spawn its worker pool on the current runtime.
    pub fn new(fetcher: Arc<dyn FetchMedia>, config: CacheConfig) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner::new(config.max_queue.max(1))),
            notify: Notify::new(),
            fetcher,
            policy: config.policy,
            quality: config.quality,
        });

        let workers = (0..config.workers.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                tokio::spawn(worker_loop(shared))
            })
            .collect();

        Self {
            shared,
            _workers: Arc::new(WorkerGuard(workers)),
        }
    }

    /// Request population of `key`. Idempotent: keys already queued, in
    /// flight, mid-retry or ready are left alone. A `Failed` entry is
    /// still owned by the worker sleeping out its backoff; its retry
    /// chain always terminates in `Ready`, so re-enqueueing it here
    /// would start a second writer for the same key.
    pub fn request(&self, key: &str, priority: FetchPriority) {
        let mut inner = self.shared.inner.lock().unwrap();

        let status = inner
            .entries
            .get(key)
            .map(|entry| entry.status)
            .unwrap_or_default();
        if matches!(
            status,
            MediaStatus::InFlight | MediaStatus::Ready | MediaStatus::Failed
        ) {
            return;
        }
        if inner.queued.contains(key) {
            return;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push(QueuedFetch {
            key: key.to_string(),
            priority,
            seq,
        });
        inner.queued.insert(key.to_string());
        inner.entries.entry(key.to_string()).or_default();

        if inner.queue.len() > inner.max_queue {
            inner.drop_stale();
        }

        drop(inner);
        self.shared.notify.notify_one();
    }

    /// Readiness state of `key`.
    pub fn status(&self, key: &str) -> MediaStatus {
        self.shared
            .inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// The ready asset, or `None` unless the entry is `Ready`.
    pub fn get(&self, key: &str) -> Option<Arc<MediaAsset>> {
        let inner = self.shared.inner.lock().unwrap();
        let entry = inner.entries.get(key)?;
        if entry.status == MediaStatus::Ready {
            entry.asset.clone()
        } else {
            None
        }
    }

    /// Attempts spent on `key` so far (diagnostics).
    pub fn attempts(&self, key: &str) -> u32 {
        self.shared
            .inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .map(|entry| entry.attempts)
            .unwrap_or(0)
    }
}

impl Inner {
    /// Keep only the most urgent `max_queue` pending requests. Dropped
    /// keys revert to `NotRequested` and can be re-requested later.
    fn drop_stale(&mut self) {
        let mut pending = std::mem::take(&mut self.queue).into_vec();
        pending.sort_by(|a, b| b.cmp(a));
        for dropped in pending.drain(self.max_queue..) {
            debug!(key = %dropped.key, "dropping stale prefetch request");
            self.queued.remove(&dropped.key);
        }
        self.queue = pending.into();
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = next_job(&shared);
        match job {
            Some(key) => fetch_with_retry(&shared, &key).await,
            None => shared.notify.notified().await,
        }
    }
}

/// Pop the most urgent runnable key, marking it in flight. Keys that
/// became ready or in flight while queued are skipped.
fn next_job(shared: &Shared) -> Option<String> {
    let mut inner = shared.inner.lock().unwrap();
    while let Some(queued) = inner.queue.pop() {
        inner.queued.remove(&queued.key);
        let entry = inner.entries.entry(queued.key.clone()).or_default();
        if matches!(entry.status, MediaStatus::Ready | MediaStatus::InFlight) {
            continue;
        }
        entry.status = MediaStatus::InFlight;
        return Some(queued.key);
    }
    None
}

/// Run the full retry schedule for one key. Exactly one worker executes
/// this per key at a time (the `InFlight` guard), so entry writes for
/// the key are serialized.
async fn fetch_with_retry(shared: &Shared, key: &str) {
    let policy = &shared.policy;
    for attempt in 1..=policy.max_attempts {
        let outcome = tokio::time::timeout(
            policy.attempt_timeout,
            shared.fetcher.fetch(key, shared.quality),
        )
        .await;

        match outcome {
            Ok(Ok(fetched)) => {
                debug!(key, attempt, "media ready");
                let mut inner = shared.inner.lock().unwrap();
                let entry = inner.entries.entry(key.to_string()).or_default();
                entry.status = MediaStatus::Ready;
                entry.attempts = attempt;
                entry.asset = Some(Arc::new(MediaAsset::from(fetched)));
                return;
            }
            Ok(Err(err)) => {
                warn!(key, attempt, %err, "media fetch failed");
            }
            Err(_) => {
                warn!(key, attempt, "media fetch timed out");
            }
        }

        {
            let mut inner = shared.inner.lock().unwrap();
            let entry = inner.entries.entry(key.to_string()).or_default();
            entry.status = MediaStatus::Failed;
            entry.attempts = attempt;
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff(attempt)).await;
            let mut inner = shared.inner.lock().unwrap();
            let entry = inner.entries.entry(key.to_string()).or_default();
            entry.status = MediaStatus::InFlight;
        }
    }

    // Retries exhausted: bind the placeholder so navigation never waits
    // on this key again.
    warn!(key, "retries exhausted, using placeholder");
    let mut inner = shared.inner.lock().unwrap();
    let entry = inner.entries.entry(key.to_string()).or_default();
    entry.status = MediaStatus::Ready;
    entry.asset = Some(Arc::new(MediaAsset::placeholder(key)));
}
