// src/network/queue.rs
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::message::{NetworkMessage, RequestId};
use crate::utils::config::SessionSettings;

/// Inbound responses of one session, shared by the engine's delivery tasks
/// (producers) and every caller waiting for a correlated response (consumers).
///
/// Each waiter looks only for its own request ID. A message stays queued until
/// its waiter claims it or it grows stale, whichever happens first; stale
/// messages are dropped on the next scan and are never handed out.
pub struct InboundQueue {
    messages: Mutex<VecDeque<NetworkMessage>>,
    arrival: Notify,
    closed: AtomicBool,
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundQueue {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            arrival: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues `message`, first dropping whatever has outlived `expiry`.
    pub fn push(&self, message: NetworkMessage, expiry: Duration) {
        let len = {
            let mut messages = self.messages.lock();
            purge_stale(&mut messages, expiry);
            messages.push_back(message);
            messages.len()
        };
        trace!("Queued inbound message, queue length {}", len);
        self.arrival.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Wakes every waiter with `None` and refuses new waits until reopened.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.arrival.notify_waiters();
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Waits for the message correlated with `request_id`.
    ///
    /// Returns `None` once `settings.response_timeout` has elapsed or the queue
    /// is closed. Between arrivals the waiter still wakes every
    /// `settings.poll_interval` to sweep stale messages and check its deadline.
    pub async fn take(&self, request_id: RequestId, settings: &SessionSettings) -> Option<NetworkMessage> {
        let deadline = Instant::now() + settings.response_timeout;

        loop {
            // registered before scanning, so an arrival during the scan is not missed
            let notified = self.arrival.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::SeqCst) {
                debug!("Wait for request {} interrupted", request_id);
                return None;
            }

            if let Some(message) = self.claim(request_id, settings.message_expiry) {
                return Some(message);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Timed out waiting for response to request {}", request_id);
                return None;
            }

            let wake_at = deadline.min(now + settings.poll_interval);
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    fn claim(&self, request_id: RequestId, expiry: Duration) -> Option<NetworkMessage> {
        let mut messages = self.messages.lock();
        purge_stale(&mut messages, expiry);

        let position = messages.iter().position(|message| message.request_id() == request_id)?;
        messages.remove(position)
    }
}

fn purge_stale(messages: &mut VecDeque<NetworkMessage>, expiry: Duration) {
    let now = Utc::now().timestamp_millis();
    messages.retain(|message| {
        let valid = message.is_valid_at(now, expiry);
        if !valid {
            debug!(
                "Discarding stale message: ID = {}; Timestamp = {}",
                message.request_id(),
                message.timestamp()
            );
        }
        valid
    });
}
