// ── Reactive topology stream ──
//
// Subscription type for consuming topology revisions from the DataStore.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::Topology;

/// A subscription to the diagram.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct TopologyStream {
    current: Arc<Topology>,
    receiver: watch::Receiver<Arc<Topology>>,
}

impl TopologyStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Topology>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Arc<Topology> {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<Topology> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next revision.
    /// Returns `None` once the DataStore has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Topology>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> TopologyWatchStream {
        TopologyWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new `Arc<Topology>` revision, starting
/// with the current one.
pub struct TopologyWatchStream {
    inner: WatchStream<Arc<Topology>>,
}

impl Stream for TopologyWatchStream {
    type Item = Arc<Topology>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
