//! Bounded cross-stage hand-off between the worker pool and the
//! Player's filler task.
//!
//! Backed by `tokio::sync::mpsc`, whose bounded channel already gives
//! blocking-put/blocking-get backpressure; the only addition here is a
//! terminal sentinel variant so "no more clips are coming" can travel
//! through the same channel rather than a side-channel flag.

use crate::playback::types::ProcessedClip;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// One item drained by the filler.
#[derive(Debug)]
pub enum QueueItem {
    Clip(ProcessedClip),
    /// End of stream: no more clips will ever be enqueued this cycle.
    Sentinel,
}

/// The producing half, held by each worker in the pool. Cloning is
/// cheap (it's a channel handle) and expected — the pool has multiple
/// workers sharing one queue.
#[derive(Clone)]
pub struct ProcessedClipsSender {
    tx: mpsc::Sender<QueueItem>,
}

impl ProcessedClipsSender {
    /// Enqueue a clip, blocking (suspending) while the queue is full.
    pub async fn send(&self, clip: ProcessedClip) {
        // The channel only closes when the filler has dropped its
        // receiver, which only happens at shutdown; a send error there
        // is a benign race with STOP, not a bug to propagate.
        let _ = self.tx.send(QueueItem::Clip(clip)).await;
    }

    pub async fn send_sentinel(&self) {
        let _ = self.tx.send(QueueItem::Sentinel).await;
    }

    /// Current occupancy: items sitting in the channel, not yet drained
    /// by the filler. Used by the admission loop's queued-seconds
    /// compensation, which needs to count clips that have already been
    /// enqueued here as well as jobs still in the worker pool.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// The consuming half, held by the Player's filler task.
pub struct ProcessedClipsReceiver {
    rx: mpsc::Receiver<QueueItem>,
}

/// Poll timeout the filler uses so it can also observe a stop flag
/// between gets.
const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

impl ProcessedClipsReceiver {
    /// Wait up to 100 ms for an item, so the caller can also poll a
    /// stop flag between gets. `None` means "timed out, no item yet"
    /// (processors may be slow) as distinct from a closed channel.
    pub async fn recv_timeout(&mut self) -> Option<QueueItem> {
        match timeout(RECV_POLL_TIMEOUT, self.rx.recv()).await {
            Ok(item) => item,
            Err(_elapsed) => None,
        }
    }
}

/// Create a bounded queue with capacity `min(4, song_count)`, never
/// zero since a zero-capacity channel can't hand off anything.
pub fn bounded(song_count: usize) -> (ProcessedClipsSender, ProcessedClipsReceiver) {
    let capacity = song_count.min(4).max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (ProcessedClipsSender { tx }, ProcessedClipsReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::types::ProcessedClip;

    fn clip(id: &str) -> ProcessedClip {
        ProcessedClip {
            song_id: id.to_string(),
            title: id.to_string(),
            samples: vec![],
            tag: 0,
        }
    }

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (tx, mut rx) = bounded(8);
        tx.send(clip("a")).await;
        tx.send(clip("b")).await;
        let first = rx.recv_timeout().await.unwrap();
        let second = rx.recv_timeout().await.unwrap();
        match (first, second) {
            (QueueItem::Clip(a), QueueItem::Clip(b)) => {
                assert_eq!(a.song_id, "a");
                assert_eq!(b.song_id, "b");
            }
            _ => panic!("expected two clips"),
        }
    }

    #[tokio::test]
    async fn sentinel_travels_through_the_same_queue() {
        let (tx, mut rx) = bounded(8);
        tx.send(clip("a")).await;
        tx.send_sentinel().await;
        assert!(matches!(rx.recv_timeout().await, Some(QueueItem::Clip(_))));
        assert!(matches!(rx.recv_timeout().await, Some(QueueItem::Sentinel)));
    }

    #[tokio::test]
    async fn recv_times_out_when_empty() {
        let (_tx, mut rx) = bounded(8);
        assert!(rx.recv_timeout().await.is_none());
    }

    #[test]
    fn capacity_is_capped_at_four_and_never_zero() {
        let (tx, _rx) = bounded(100);
        assert_eq!(tx.tx.capacity(), 4);
        let (tx, _rx) = bounded(0);
        assert_eq!(tx.tx.capacity(), 1);
    }
}
