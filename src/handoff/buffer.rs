//! Bounded frame hand-off between the capture and display threads.
//!
//! The capture thread pushes finished bundles; the display loop pops
//! them at its own cadence. A push into a full buffer waits briefly for
//! the display to catch up, then drops the new bundle. The capture
//! thread never blocks for longer than the push timeout and never sees
//! an error.

use crate::compositing::{FaceOverlay, FaceSlot, FrameBundle};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default number of bundles held between capture and display.
pub const DEFAULT_CAPACITY: usize = 21;
/// Default time a push waits for room before dropping its bundle.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_millis(5);

/// Buffer sizing and push policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of queued bundles.
    pub capacity: usize,
    /// How long a push into a full buffer waits before dropping.
    pub push_timeout_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Bundle queued; `depth` is the buffer length after the push.
    Queued {
        /// Buffer length after the push.
        depth: usize,
    },
    /// The buffer stayed full for the whole timeout; the bundle was dropped.
    Dropped,
    /// The buffer is closed; the bundle was dropped.
    Closed,
}

/// Which buffered bundle a face result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceTarget {
    /// The oldest bundle whose face slot is not yet resolved.
    OldestUnresolved,
    /// The bundle with this sequence number.
    Sequence(u64),
}

/// Result of [`FrameHandoffBuffer::attach_face_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The bundle with this sequence number received the result.
    Attached(u64),
    /// No buffered bundle matched the target.
    NoMatch,
    /// The guard refused the result; nothing was touched.
    Rejected,
}

struct Inner {
    queue: VecDeque<FrameBundle>,
    closed: bool,
}

/// Thread-safe FIFO of [`FrameBundle`]s with a fixed capacity.
pub struct FrameHandoffBuffer {
    inner: Mutex<Inner>,
    not_full: Condvar,
    capacity: usize,
    push_timeout: Duration,
}

impl FrameHandoffBuffer {
    /// Creates a buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize, push_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            capacity,
            push_timeout,
        }
    }

    /// Creates a buffer from its configuration.
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.capacity, Duration::from_millis(config.push_timeout_ms))
    }

    // A poisoned lock only means a holder panicked mid-operation; the
    // queue itself is always structurally valid.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a bundle, waiting up to the push timeout for room.
    pub fn push(&self, bundle: FrameBundle) -> PushOutcome {
        let deadline = Instant::now() + self.push_timeout;
        let mut inner = self.lock();

        while inner.queue.len() >= self.capacity && !inner.closed {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            if remaining.is_zero() {
                break;
            }
            inner = self
                .not_full
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        if inner.closed {
            tracing::debug!(sequence = bundle.sequence, "Buffer closed, bundle dropped");
            return PushOutcome::Closed;
        }
        if inner.queue.len() >= self.capacity {
            tracing::debug!(
                sequence = bundle.sequence,
                capacity = self.capacity,
                dropped = true,
                "Buffer full, dropping newest bundle"
            );
            return PushOutcome::Dropped;
        }

        inner.queue.push_back(bundle);
        PushOutcome::Queued {
            depth: inner.queue.len(),
        }
    }

    /// Removes the oldest bundle, if any. Never blocks on an empty buffer.
    pub fn pop(&self) -> Option<FrameBundle> {
        let bundle = self.lock().queue.pop_front();
        if bundle.is_some() {
            self.not_full.notify_one();
        }
        bundle
    }

    /// Resolves the face slot of the targeted bundle.
    ///
    /// Returns the sequence number of the bundle that received the
    /// result, or `None` when no buffered bundle matched.
    pub fn attach_face(&self, target: FaceTarget, face: Option<FaceOverlay>) -> Option<u64> {
        match self.attach_face_if(target, face, || true) {
            AttachOutcome::Attached(sequence) => Some(sequence),
            AttachOutcome::NoMatch | AttachOutcome::Rejected => None,
        }
    }

    /// Like [`attach_face`](Self::attach_face), but first evaluates
    /// `accept` while holding the buffer lock. Anything changed inside
    /// [`exclusive`](Self::exclusive) is therefore either fully visible to
    /// `accept` or happens after the attachment.
    pub fn attach_face_if(
        &self,
        target: FaceTarget,
        face: Option<FaceOverlay>,
        accept: impl FnOnce() -> bool,
    ) -> AttachOutcome {
        let mut inner = self.lock();
        if !accept() {
            return AttachOutcome::Rejected;
        }
        let bundle = match target {
            FaceTarget::OldestUnresolved => inner.queue.iter_mut().find(|b| !b.face.is_resolved()),
            FaceTarget::Sequence(sequence) => {
                inner.queue.iter_mut().find(|b| b.sequence == sequence)
            }
        };
        match bundle {
            Some(bundle) => {
                bundle.face = FaceSlot::Resolved(face);
                AttachOutcome::Attached(bundle.sequence)
            }
            None => AttachOutcome::NoMatch,
        }
    }

    /// Runs `f` while holding the buffer lock, serialised with every
    /// push, pop and attachment.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _inner = self.lock();
        f()
    }

    /// Number of queued bundles.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the buffer holds no bundles.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Maximum number of queued bundles.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every buffered bundle.
    pub fn clear(&self) {
        let dropped = {
            let mut inner = self.lock();
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        self.not_full.notify_all();
        tracing::debug!(dropped, "Buffer cleared");
    }

    /// Rejects further pushes and wakes any producer waiting for room.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_all();
    }

    /// Accepts pushes again after [`close`](Self::close).
    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    /// Whether pushes are currently rejected.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Default for FrameHandoffBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_PUSH_TIMEOUT)
    }
}
