//! Change notifications and live snapshot subscriptions

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::{wrappers::ReceiverStream, Stream};

use super::CollectionName;

const FEED_CAPACITY: usize = 256;

/// Broadcasts the name of every collection touched by a committed write
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<CollectionName>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn notify(&self, collection: CollectionName) {
        // No listeners is not an error
        let _ = self.sender.send(collection);
    }

    pub fn listen(&self) -> broadcast::Receiver<CollectionName> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of full result-set snapshots.
///
/// Each item replaces the previous one entirely. Dropping the subscription or
/// calling [`Subscription::cancel`] stops delivery.
pub struct Subscription<R> {
    snapshots: ReceiverStream<Vec<R>>,
    task: JoinHandle<()>,
}

impl<R> Subscription<R> {
    pub(crate) fn new(snapshots: ReceiverStream<Vec<R>>, task: JoinHandle<()>) -> Self {
        Self { snapshots, task }
    }

    /// Stop delivery; nothing is yielded afterwards
    pub fn cancel(mut self) {
        self.task.abort();
        self.snapshots.close();
    }
}

// Never pinned structurally
impl<R> Unpin for Subscription<R> {}

impl<R> Stream for Subscription<R> {
    type Item = Vec<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.snapshots).poll_next(cx)
    }
}

impl<R> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
