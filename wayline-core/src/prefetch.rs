//! Look-ahead media prefetching.
//!
//! Reacts to cursor movement by requesting every media identity
//! reachable from the next few steps, nearest first, without ever
//! blocking navigation. Rapid cursor changes are debounced so fast
//! swiping settles before any requests go out.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{DeviceClass, FetchPriority, MediaCache, MediaStatus};
use crate::sequence::StepSequence;
use crate::step::{media_kind, MediaKind};

const DEBOUNCE: Duration = Duration::from_millis(100);

pub struct Prefetcher {
    cache: MediaCache,
    device: DeviceClass,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Prefetcher {
    pub fn new(cache: MediaCache, device: DeviceClass) -> Self {
        Self::with_debounce(cache, device, DEBOUNCE)
    }

    pub fn with_debounce(cache: MediaCache, device: DeviceClass, debounce: Duration) -> Self {
        Self {
            cache,
            device,
            debounce,
            pending: Mutex::new(None),
        }
    }

    /// React to the cursor settling on `cursor`. Extracts the media
    /// identities of the look-ahead window synchronously, then requests
    /// them after the quiet period (superseded by any newer call).
    pub fn on_cursor_changed(&self, sequence: &StepSequence, cursor: usize) {
        let requests = self.window_requests(sequence, cursor);

        // The newest cursor position always supersedes the pending
        // window, even when it has nothing of its own to request.
        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        if requests.is_empty() {
            return;
        }

        if self.debounce.is_zero() {
            drop(pending);
            self.dispatch(&requests);
            return;
        }

        let cache = self.cache.clone();
        let debounce = self.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            for (key, priority) in &requests {
                cache.request(key, *priority);
            }
        }));
    }

    fn dispatch(&self, requests: &[(String, FetchPriority)]) {
        for (key, priority) in requests {
            self.cache.request(key, *priority);
        }
    }

    /// Media identities reachable from `[cursor, cursor + W)`, nearest
    /// first, deduplicated and filtered against cache state and device
    /// constraints.
    fn window_requests(
        &self,
        sequence: &StepSequence,
        cursor: usize,
    ) -> Vec<(String, FetchPriority)> {
        let window = self.device.prefetch_window();
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for distance in 0..window {
            let index = cursor + distance;
            let Ok(step) = sequence.get(index) else {
                break;
            };
            for path in step.reachable_media() {
                if !self.wanted(path) || !seen.insert(path.to_string()) {
                    continue;
                }
                if self.cache.status(path) != MediaStatus::NotRequested {
                    continue;
                }
                let priority = if distance == 0 {
                    FetchPriority::CURRENT
                } else {
                    FetchPriority::ahead(distance)
                };
                out.push((path.to_string(), priority));
            }
        }

        debug!(cursor, count = out.len(), "prefetch window computed");
        out
    }

    fn wanted(&self, path: &str) -> bool {
        match media_kind(path) {
            MediaKind::Image => true,
            MediaKind::Video => self.device.prefetch_videos(),
            MediaKind::Audio | MediaKind::Unknown => false,
        }
    }
}
