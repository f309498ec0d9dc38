//! SubscriberHandle - one subscriber with an isolated queue and worker task

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DeliveryOutcome, MessageSink, SubscriberId, WireFrame};

/// A queued frame and the channel its outcome is reported on
struct Delivery {
    frame: WireFrame,
    ack: oneshot::Sender<DeliveryOutcome>,
}

/// Result of handing a frame to a subscriber
#[derive(Debug)]
pub enum Enqueued {
    /// Accepted; resolves once the worker has sent or abandoned the frame
    Queued(oneshot::Receiver<DeliveryOutcome>),
    /// Not accepted
    Rejected(DeliveryOutcome),
}

impl Enqueued {
    /// Wait for the delivery outcome
    ///
    /// The worker bounds each send by its own `send_timeout` once it starts
    /// writing the frame, so time spent queued behind earlier frames is not
    /// charged to this one.
    pub async fn outcome(self) -> DeliveryOutcome {
        match self {
            Self::Rejected(outcome) => outcome,
            // Worker dropped the ack without answering
            Self::Queued(ack) => ack.await.unwrap_or(DeliveryOutcome::Closed),
        }
    }
}

/// Handle to a running subscriber worker
///
/// Frames are written in enqueue order. The first failed or timed-out send
/// closes the handle: the connection is presumed broken and every later
/// delivery resolves to `Closed`.
pub struct SubscriberHandle {
    id: SubscriberId,
    /// Sink name
    name: String,
    /// Channel to send frames to worker
    tx: mpsc::Sender<Delivery>,
    /// Closed flag, shared with the worker
    closed: Arc<watch::Sender<bool>>,
    send_timeout: Duration,
    /// Worker task handle, taken on shutdown
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriberHandle {
    /// Create a new SubscriberHandle and spawn the worker task
    pub fn spawn<S: MessageSink + Send + 'static>(
        id: SubscriberId,
        sink: S,
        queue_capacity: usize,
        send_timeout: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (closed, _) = watch::channel(false);
        let closed = Arc::new(closed);

        let worker = SubscriberWorker {
            id,
            name: name.clone(),
            rx,
            closed: Arc::clone(&closed),
            send_timeout,
        };
        let worker_handle = tokio::spawn(worker.run(sink));

        Self {
            id,
            name,
            tx,
            closed,
            send_timeout,
            worker_handle: Mutex::new(Some(worker_handle)),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Queue a frame for delivery (non-blocking)
    pub fn enqueue(&self, frame: WireFrame) -> Enqueued {
        if self.is_closed() {
            return Enqueued::Rejected(DeliveryOutcome::Closed);
        }

        let (ack, ack_rx) = oneshot::channel();
        match self.tx.try_send(Delivery { frame, ack }) {
            Ok(()) => Enqueued::Queued(ack_rx),
            Err(mpsc::error::TrySendError::Full(delivery)) => {
                warn!(
                    subscriber = %self.id,
                    kind = delivery.frame.kind(),
                    "Queue full, message dropped"
                );
                Enqueued::Rejected(DeliveryOutcome::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Enqueued::Rejected(DeliveryOutcome::Closed)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Mark the subscriber closed, cancelling any in-flight send
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            debug!(subscriber = %self.id, "Subscriber closed");
        }
    }

    /// Resolve once the subscriber is closed, by `close` or by a failed send
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        wait_closed(&mut rx).await;
    }

    /// Close the subscriber and wait for its worker to release the sink
    #[instrument(name = "subscriber_handle_shutdown", skip(self), fields(subscriber = %self.id))]
    pub async fn shutdown(&self) {
        self.close();

        let worker = match self.worker_handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(subscriber = %self.id, error = ?e, "Worker task panicked");
            }
        }
        debug!(subscriber = %self.id, "SubscriberHandle shutdown complete");
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        let closed = *rx.borrow_and_update();
        if closed || rx.changed().await.is_err() {
            return;
        }
    }
}

/// Worker task state: consumes frames and writes them to the sink
struct SubscriberWorker {
    id: SubscriberId,
    name: String,
    rx: mpsc::Receiver<Delivery>,
    closed: Arc<watch::Sender<bool>>,
    send_timeout: Duration,
}

impl SubscriberWorker {
    #[instrument(
        name = "subscriber_worker_loop",
        skip(self, sink),
        fields(subscriber = %self.id, sink = %self.name)
    )]
    async fn run<S: MessageSink>(mut self, mut sink: S) {
        debug!("Subscriber worker started");
        let mut closed_rx = self.closed.subscribe();

        loop {
            let delivery = tokio::select! {
                biased;
                _ = wait_closed(&mut closed_rx) => break,
                delivery = self.rx.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let outcome = tokio::select! {
                biased;
                _ = wait_closed(&mut closed_rx) => DeliveryOutcome::Closed,
                result = tokio::time::timeout(self.send_timeout, sink.send(&delivery.frame)) => {
                    match result {
                        Ok(Ok(())) => DeliveryOutcome::Delivered,
                        Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
                        Err(_) => DeliveryOutcome::TimedOut,
                    }
                }
            };

            if !outcome.is_delivered() {
                warn!(
                    kind = delivery.frame.kind(),
                    outcome = outcome.label(),
                    "Send failed, closing subscriber"
                );
                self.closed.send_replace(true);
            }
            // Receiver may have given up waiting
            let _ = delivery.ack.send(outcome);
        }

        self.closed.send_replace(true);
        self.rx.close();
        while let Some(delivery) = self.rx.recv().await {
            let _ = delivery.ack.send(DeliveryOutcome::Closed);
        }

        if let Err(e) = sink.close().await {
            debug!(error = %e, "Close failed on shutdown");
        }
        debug!("Subscriber worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, OutboundMessage};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Ok,
        Fail,
        Hang,
    }

    /// Mock sink for testing
    struct MockSink {
        mode: Mode,
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockSink {
        fn new(mode: Mode) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let sink = Self {
                mode,
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (sink, sent, closed)
        }
    }

    impl MessageSink for MockSink {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&mut self, frame: &WireFrame) -> Result<(), ContractError> {
            match self.mode {
                Mode::Ok => {
                    self.sent.lock().unwrap().push(frame.as_str().to_string());
                    Ok(())
                }
                Mode::Fail => Err(ContractError::sink_send("mock", "connection reset")),
                Mode::Hang => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn frame(n: usize) -> WireFrame {
        WireFrame::encode(&OutboundMessage::Positions(
            (0..n)
                .map(|i| contracts::PositionUpdate {
                    driver: i.to_string().into(),
                    pos: Default::default(),
                })
                .collect(),
        ))
        .unwrap()
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_delivers_in_enqueue_order() {
        let (sink, sent, _) = MockSink::new(Mode::Ok);
        let handle = SubscriberHandle::spawn(SubscriberId(1), sink, 8, WAIT);

        let pending: Vec<_> = (1..=3).map(|n| handle.enqueue(frame(n))).collect();
        for enqueued in pending {
            assert_eq!(enqueued.outcome().await, DeliveryOutcome::Delivered);
        }

        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent, vec![frame(1).as_str(), frame(2).as_str(), frame(3).as_str()]);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_error_closes_handle() {
        let (sink, _, sink_closed) = MockSink::new(Mode::Fail);
        let handle = SubscriberHandle::spawn(SubscriberId(2), sink, 8, WAIT);

        let outcome = handle.enqueue(frame(1)).outcome().await;
        assert!(matches!(outcome, DeliveryOutcome::Failed(reason) if reason.contains("reset")));

        tokio::time::timeout(WAIT, handle.closed()).await.unwrap();
        assert!(handle.is_closed());
        assert!(matches!(
            handle.enqueue(frame(1)),
            Enqueued::Rejected(DeliveryOutcome::Closed)
        ));

        handle.shutdown().await;
        assert!(sink_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_hanging_send_times_out() {
        let (sink, _, _) = MockSink::new(Mode::Hang);
        let handle = SubscriberHandle::spawn(SubscriberId(3), sink, 8, Duration::from_millis(50));

        let outcome = handle.enqueue(frame(1)).outcome().await;
        assert_eq!(outcome, DeliveryOutcome::TimedOut);
        assert!(handle.is_closed());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_full() {
        let (sink, _, _) = MockSink::new(Mode::Hang);
        let handle = SubscriberHandle::spawn(SubscriberId(4), sink, 1, WAIT);

        // Worker has not been polled yet, so the single slot stays occupied
        let first = handle.enqueue(frame(1));
        let second = handle.enqueue(frame(2));

        assert!(matches!(first, Enqueued::Queued(_)));
        assert!(matches!(second, Enqueued::Rejected(DeliveryOutcome::QueueFull)));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_send() {
        let (sink, _, sink_closed) = MockSink::new(Mode::Hang);
        let handle = Arc::new(SubscriberHandle::spawn(SubscriberId(5), sink, 8, WAIT));

        let in_flight = handle.enqueue(frame(1));
        let queued = handle.enqueue(frame(2));
        tokio::task::yield_now().await;
        handle.close();

        assert_eq!(in_flight.outcome().await, DeliveryOutcome::Closed);
        assert_eq!(queued.outcome().await, DeliveryOutcome::Closed);

        handle.shutdown().await;
        assert!(sink_closed.load(Ordering::SeqCst));
    }
}
