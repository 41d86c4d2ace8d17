//! Synchronous single-producer fan-out stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::trace;

use super::Pipeline;
use crate::message::{Message, MessageRef};

type Sink = Box<dyn Fn(&dyn Message) + Send + Sync>;

struct Tap {
    id: u64,
    active: AtomicBool,
    pipeline: Pipeline,
    sink: Sink,
}

struct SubjectInner {
    taps: RwLock<Vec<Arc<Tap>>>,
    next_id: AtomicU64,
}

/// Broadcast stream of messages.
///
/// `on_next` runs every live tap's pipeline, then its sink, on the caller's
/// stack in subscription order. The tap list is snapshotted before dispatch,
/// so sinks may publish, subscribe or dispose re-entrantly: taps added during
/// a dispatch see only later messages, taps disposed during a dispatch are
/// skipped from that point on.
#[derive(Clone)]
pub struct Subject {
    inner: Arc<SubjectInner>,
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl Subject {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                taps: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach `sink` behind `pipeline`. The tap lives until the returned
    /// handle is disposed or dropped.
    pub fn subscribe<F>(&self, pipeline: Pipeline, sink: F) -> Subscription
    where
        F: Fn(&dyn Message) + Send + Sync + 'static,
    {
        let tap = Arc::new(Tap {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            pipeline,
            sink: Box::new(sink),
        });

        self.inner
            .taps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&tap));

        trace!(tap = tap.id, stages = tap.pipeline.len(), "Tap attached");

        Subscription {
            subject: Arc::downgrade(&self.inner),
            tap,
        }
    }

    /// Push `message` through every live tap. Returns how many sinks ran.
    pub fn on_next(&self, message: MessageRef) -> usize {
        let snapshot: Vec<Arc<Tap>> = self
            .inner
            .taps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for tap in snapshot {
            if !tap.active.load(Ordering::Acquire) {
                continue;
            }
            // Unfiltered taps (observers) take the message as published.
            if tap.pipeline.is_empty() {
                (tap.sink)(message.as_ref());
                delivered += 1;
                continue;
            }
            if let Some(out) = tap.pipeline.run(&message) {
                (tap.sink)(out.as_ref());
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live taps.
    pub fn tap_count(&self) -> usize {
        self.inner
            .taps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Live handle to a tap on a [`Subject`]. Disposes the tap when dropped.
pub struct Subscription {
    subject: Weak<SubjectInner>,
    tap: Arc<Tap>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.tap.id
    }

    pub fn is_active(&self) -> bool {
        self.tap.active.load(Ordering::Acquire)
    }

    /// Detach the tap. Idempotent.
    pub fn dispose(&self) {
        if !self.tap.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(subject) = self.subject.upgrade() {
            subject
                .taps
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tap| tap.id != self.tap.id);
        }
        trace!(tap = self.tap.id, "Tap disposed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.tap.id)
            .field("active", &self.is_active())
            .finish()
    }
}
