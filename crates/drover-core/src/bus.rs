// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::event::Event;

/// A bus subscriber.  Invoked synchronously on the emitting task, so it must
/// return quickly; use [`event_stream`] or [`spawn_handler`] to hand events
/// to another event loop.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Ordered multicast of events to subscribers.
///
/// Subscribers are invoked in registration order.  A panicking subscriber is
/// logged and skipped; it aborts neither the remaining subscribers nor the
/// step loop.  The subscriber list is frozen at construction time, so the bus
/// can be shared without locking.
#[derive(Default)]
pub struct CallbackBus {
    subscribers: Vec<Callback>,
}

impl CallbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl Fn(&Event) + Send + Sync + 'static) {
        self.subscribers.push(Arc::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&self, event: &Event) {
        for (i, subscriber) in self.subscribers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                warn!(subscriber = i, event_id = %event.id, "event subscriber panicked; continuing");
            }
        }
    }
}

/// Bridge for stream-oriented observers: returns a subscriber callback and
/// the stream of events it captures.  The callback clones each event into an
/// unbounded channel and returns immediately, so the emitting thread never
/// blocks on a slow consumer.
pub fn event_stream() -> (Callback, UnboundedReceiverStream<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: Callback = Arc::new(move |event: &Event| {
        let _ = tx.send(event.clone());
    });
    (callback, UnboundedReceiverStream::new(rx))
}

/// Bridge a blocking subscriber position to an async handler running on
/// `handle`'s event loop.  Events are captured synchronously from the
/// emitting thread and queued; the spawned forwarder drives `handler` for
/// each one in order.  No state is shared between the threads beyond the
/// queue.
pub fn spawn_handler<F, Fut>(handle: tokio::runtime::Handle, handler: F) -> Callback
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    handle.spawn(async move {
        while let Some(event) = rx.recv().await {
            handler(event).await;
        }
    });
    Arc::new(move |event: &Event| {
        let _ = tx.send(event.clone());
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
