//! Ordered async mailboxes for actor communication.
//!
//! A mailbox is split into a consumer half ([`Mailbox`]) and a cloneable
//! producer half ([`MailboxSender`]). Only one actor consumes a mailbox:
//! [`Mailbox`] is not `Clone` and [`Mailbox::pop`] takes `&mut self`.
//!
//! Items are delivered strictly in push order. Pushing never blocks the
//! producer; a consumer suspended in [`Mailbox::pop`] is woken by the next
//! push.
//!
//! # Closing
//!
//! Each mailbox carries a [`CancellationToken`]. Cancelling it (directly,
//! through [`Mailbox::close`]/[`MailboxSender::close`], or by cancelling a
//! parent token) closes the mailbox: a pending `pop` resolves to `None`,
//! queued items are discarded and further pushes are dropped.
//!
//! ```
//! use hrmon_core::mailbox::mailbox;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut inbox, tx) = mailbox();
//! tx.push(1);
//! tx.push_batch([2, 3]);
//! assert_eq!(inbox.pop().await, Some(1));
//! assert_eq!(inbox.pop().await, Some(2));
//! tx.close();
//! assert_eq!(inbox.pop().await, None);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Notify,
    token: CancellationToken,
}

impl<T> Shared<T> {
    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The lock is never held across a panic point that could leave the
        // deque inconsistent, so a poisoned lock is still usable.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a mailbox with its own cancellation token.
pub fn mailbox<T>() -> (Mailbox<T>, MailboxSender<T>) {
    mailbox_with_token(CancellationToken::new())
}

/// Create a mailbox that closes when `token` is cancelled.
///
/// Pass a [`CancellationToken::child_token`] to tie several mailboxes to
/// one shutdown signal.
pub fn mailbox_with_token<T>(token: CancellationToken) -> (Mailbox<T>, MailboxSender<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        ready: Notify::new(),
        token,
    });
    (
        Mailbox {
            shared: Arc::clone(&shared),
        },
        MailboxSender { shared },
    )
}

/// The consuming half of a mailbox.
pub struct Mailbox<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Mailbox<T> {
    /// Take the next item, waiting for one if the mailbox is empty.
    ///
    /// Returns `None` once the mailbox is closed.
    pub async fn pop(&mut self) -> Option<T> {
        loop {
            if self.shared.token.is_cancelled() {
                return None;
            }
            if let Some(item) = self.shared.queue().pop_front() {
                return Some(item);
            }
            // `Notify` keeps a permit for a push that lands between the
            // empty check and this await, so no wakeup is lost.
            tokio::select! {
                _ = self.shared.token.cancelled() => return None,
                _ = self.shared.ready.notified() => {}
            }
        }
    }

    /// Take the next item without waiting.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.shared.token.is_cancelled() {
            return None;
        }
        self.shared.queue().pop_front()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.shared.queue().len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.shared.queue().is_empty()
    }

    /// Close the mailbox.
    pub fn close(&self) {
        self.shared.token.cancel();
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Create another producer for this mailbox.
    pub fn sender(&self) -> MailboxSender<T> {
        MailboxSender {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The producing half of a mailbox.
pub struct MailboxSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> MailboxSender<T> {
    /// Append an item and wake the consumer.
    ///
    /// Returns `false` if the mailbox is closed and the item was dropped.
    pub fn push(&self, item: T) -> bool {
        self.push_batch(std::iter::once(item))
    }

    /// Append several items at once, preserving their order.
    ///
    /// The consumer is woken at most once for the whole batch. Returns
    /// `false` if the mailbox is closed and the items were dropped.
    pub fn push_batch<I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        if self.shared.token.is_cancelled() {
            trace!("Mailbox closed, dropping pushed items");
            return false;
        }
        let added = {
            let mut queue = self.shared.queue();
            let before = queue.len();
            queue.extend(items);
            queue.len() - before
        };
        if added > 0 {
            self.shared.ready.notify_one();
        }
        true
    }

    /// Close the mailbox.
    pub fn close(&self) {
        self.shared.token.cancel();
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl<T> std::fmt::Debug for MailboxSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSender")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
