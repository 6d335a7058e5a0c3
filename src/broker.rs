//! The broker boundary: where outbound jobs come from.
//!
//! The session consumes whatever `dequeue` yields next and never assumes
//! more ordering than that. Production deployments put a durable queue
//! behind this trait; the in-memory default exists for tests, demos and
//! single-process setups.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::protocol::OutboundJob;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker queue is full")]
    QueueFull,

    #[error("broker is closed")]
    Closed,

    #[error("broker backend error: {0}")]
    Backend(String),
}

/// The two-method broker contract.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Enqueue a job. A bounded broker reports a full queue so the
    /// producer sees backpressure instead of silent loss.
    async fn enqueue(&self, job: OutboundJob) -> Result<(), BrokerError>;

    /// Dequeue the next job, waiting until one is available.
    async fn dequeue(&self) -> Result<OutboundJob, BrokerError>;
}

/// Bounded in-process broker backed by a channel.
pub struct InMemoryBroker {
    tx: mpsc::Sender<OutboundJob>,
    rx: Mutex<mpsc::Receiver<OutboundJob>>,
}

impl InMemoryBroker {
    /// `maxsize` bounds the number of queued jobs, not their size.
    pub fn new(maxsize: usize) -> Self {
        let (tx, rx) = mpsc::channel(maxsize);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(2500)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, job: OutboundJob) -> Result<(), BrokerError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BrokerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => BrokerError::Closed,
        })
    }

    async fn dequeue(&self) -> Result<OutboundJob, BrokerError> {
        self.rx.lock().await.recv().await.ok_or(BrokerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SubmitSmJob;

    fn job(log_id: &str) -> OutboundJob {
        OutboundJob::SubmitSm(SubmitSmJob::new(log_id, "hi", "100", "200"))
    }

    #[tokio::test]
    async fn fifo_through_the_queue() {
        let broker = InMemoryBroker::new(8);
        broker.enqueue(job("a")).await.unwrap();
        broker.enqueue(job("b")).await.unwrap();

        assert_eq!(broker.dequeue().await.unwrap().log_id(), "a");
        assert_eq!(broker.dequeue().await.unwrap().log_id(), "b");
    }

    #[tokio::test]
    async fn full_queue_pushes_back() {
        let broker = InMemoryBroker::new(1);
        broker.enqueue(job("a")).await.unwrap();

        let result = broker.enqueue(job("b")).await;
        assert!(matches!(result, Err(BrokerError::QueueFull)));
    }

    #[tokio::test]
    async fn dequeue_waits_for_work() {
        let broker = std::sync::Arc::new(InMemoryBroker::new(4));

        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.dequeue().await.unwrap() })
        };

        tokio::task::yield_now().await;
        broker.enqueue(job("late")).await.unwrap();

        let got = waiter.await.unwrap();
        assert_eq!(got.log_id(), "late");
    }
}
