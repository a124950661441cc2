//! Device position sources and a cancellable position watch.
//!
//! A [`PositionSource`] answers one-shot position requests. A
//! [`PositionWatch`] turns any source into a stream of [`PositionEvent`]s on a
//! single channel, polled on a background task until [`PositionWatch::stop`]
//! is called or the watch is dropped. The subscription cannot outlive its
//! owner.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::PositionError;
use crate::model::Coordinates;

/// One update from a position watch.
pub type PositionEvent = Result<Coordinates, PositionError>;

/// Capacity of the watch channel. The producer waits when the consumer falls
/// behind rather than dropping fixes.
const WATCH_CHANNEL_CAPACITY: usize = 8;

/// Something that can report the device's current position.
pub trait PositionSource: Send + Sync + 'static {
    fn current_position(&self) -> impl Future<Output = PositionEvent> + Send;
}

/// Always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedPositionSource(pub Coordinates);

impl PositionSource for FixedPositionSource {
    async fn current_position(&self) -> PositionEvent {
        Ok(self.0)
    }
}

/// Always fails with the same error, e.g. when the user has denied access.
#[derive(Debug, Clone, Copy)]
pub struct FailingPositionSource(pub PositionError);

impl PositionSource for FailingPositionSource {
    async fn current_position(&self) -> PositionEvent {
        Err(self.0)
    }
}

/// Replays a fixed sequence of events, then keeps repeating the last one.
#[derive(Debug)]
pub struct ScriptedPositionSource {
    remaining: Mutex<VecDeque<PositionEvent>>,
    last: Mutex<PositionEvent>,
}

impl ScriptedPositionSource {
    pub fn new(events: impl IntoIterator<Item = PositionEvent>) -> Self {
        Self {
            remaining: Mutex::new(events.into_iter().collect()),
            last: Mutex::new(Err(PositionError::PositionUnavailable)),
        }
    }
}

impl PositionSource for ScriptedPositionSource {
    async fn current_position(&self) -> PositionEvent {
        let next = self.remaining.lock().await.pop_front();
        let mut last = self.last.lock().await;
        if let Some(event) = next {
            *last = event;
        }
        *last
    }
}

/// A background subscription to position updates.
pub struct PositionWatch<S: PositionSource> {
    source: Arc<S>,
    interval: Duration,
    receiver: Option<mpsc::Receiver<PositionEvent>>,
    task: Option<JoinHandle<()>>,
}

impl<S: PositionSource> PositionWatch<S> {
    /// Create an inactive watch that polls `source` every `interval` once
    /// started.
    pub fn new(source: Arc<S>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            receiver: None,
            task: None,
        }
    }

    /// Begin polling. Calling `start` on an active watch does nothing.
    pub fn start(&mut self) {
        if self.is_active() {
            return;
        }

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let source = Arc::clone(&self.source);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            loop {
                let event = source.current_position().await;
                if tx.send(event).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "Position watch started");
        self.receiver = Some(rx);
        self.task = Some(task);
    }

    /// Cancel the background task and close the channel.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Position watch stopped");
        }
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the next event. Returns `None` once the watch is stopped.
    pub async fn next_event(&mut self) -> Option<PositionEvent> {
        match self.receiver.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl<S: PositionSource> Drop for PositionWatch<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64) -> PositionEvent {
        Ok(Coordinates::new(lat, lng))
    }

    #[tokio::test]
    async fn test_scripted_source_repeats_last() {
        let source = ScriptedPositionSource::new(vec![at(1.0, 1.0), at(2.0, 2.0)]);

        assert_eq!(source.current_position().await, at(1.0, 1.0));
        assert_eq!(source.current_position().await, at(2.0, 2.0));
        assert_eq!(source.current_position().await, at(2.0, 2.0));
    }

    #[tokio::test]
    async fn test_empty_script_is_unavailable() {
        let source = ScriptedPositionSource::new(Vec::new());
        assert_eq!(
            source.current_position().await,
            Err(PositionError::PositionUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_emits_in_order() {
        let source = Arc::new(ScriptedPositionSource::new(vec![
            at(1.0, 1.0),
            Err(PositionError::Timeout),
            at(3.0, 3.0),
        ]));
        let mut watch = PositionWatch::new(source, Duration::from_secs(5));

        assert!(watch.next_event().await.is_none());
        watch.start();
        assert!(watch.is_active());

        assert_eq!(watch.next_event().await, Some(at(1.0, 1.0)));
        assert_eq!(watch.next_event().await, Some(Err(PositionError::Timeout)));
        assert_eq!(watch.next_event().await, Some(at(3.0, 3.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_subscription() {
        let source = Arc::new(FixedPositionSource(Coordinates::new(0.0, 0.0)));
        let mut watch = PositionWatch::new(Arc::clone(&source), Duration::from_secs(1));

        watch.start();
        assert!(watch.next_event().await.is_some());

        watch.stop();
        assert!(!watch.is_active());
        assert!(watch.next_event().await.is_none());

        // Only the test and the stopped watch still hold the source.
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&source), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_source() {
        let source = Arc::new(FixedPositionSource(Coordinates::new(0.0, 0.0)));
        {
            let mut watch = PositionWatch::new(Arc::clone(&source), Duration::from_secs(1));
            watch.start();
            watch.next_event().await;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&source), 1);
    }
}
