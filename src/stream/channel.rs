//! Duplex message channel between the harness and the worker transport
//!
//! Two independent unbounded FIFO queues. The harness side sends on the
//! outbound queue and receives from the inbound queue; the transport
//! adapter holds the opposite ends in a [`WorkerEndpoint`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::common::{Error, Result};

use super::message::StreamingMessage;

/// Outcome of a single receive
#[derive(Debug)]
pub enum Received {
    /// The next inbound message
    Message(StreamingMessage),
    /// Nothing arrived within the timeout
    TimedOut,
    /// The run was cancelled while waiting
    Cancelled,
    /// The transport dropped its producer; nothing more will arrive
    Closed,
}

/// Capability the actions need from a channel
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Enqueue a message for the worker. Never blocks.
    fn send(&self, message: StreamingMessage) -> Result<()>;

    /// Wait for the next inbound message, bounded by `timeout` and `cancel`
    async fn receive(&self, timeout: Duration, cancel: &CancelSignal) -> Received;
}

/// Harness side of the duplex channel
#[derive(Debug)]
pub struct DuplexChannel {
    outbound: mpsc::UnboundedSender<StreamingMessage>,
    inbound: Mutex<mpsc::UnboundedReceiver<StreamingMessage>>,
}

/// Transport side of the duplex channel
#[derive(Debug)]
pub struct WorkerEndpoint {
    /// Messages from the worker to the harness
    pub inbound: mpsc::UnboundedSender<StreamingMessage>,
    /// Messages from the harness to the worker
    pub outbound: mpsc::UnboundedReceiver<StreamingMessage>,
}

impl DuplexChannel {
    /// Create a connected channel/endpoint pair
    pub fn new() -> (Self, WorkerEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let channel = Self {
            outbound: outbound_tx,
            inbound: Mutex::new(inbound_rx),
        };
        let endpoint = WorkerEndpoint {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (channel, endpoint)
    }
}

#[async_trait]
impl MessageChannel for DuplexChannel {
    fn send(&self, message: StreamingMessage) -> Result<()> {
        tracing::debug!(message = %message.describe(), "Outbound");
        self.outbound.send(message).map_err(|_| Error::ChannelClosed)
    }

    async fn receive(&self, timeout: Duration, cancel: &CancelSignal) -> Received {
        let next = tokio::time::timeout(timeout, async {
            let mut inbound = self.inbound.lock().await;
            inbound.recv().await
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Received::Cancelled,
            result = next => match result {
                Ok(Some(message)) => {
                    tracing::debug!(message = %message.describe(), "Inbound");
                    Received::Message(message)
                }
                Ok(None) => Received::Closed,
                Err(_) => Received::TimedOut,
            },
        }
    }
}

/// Cancels every [`CancelSignal`] cloned from its pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Cooperative cancellation observed by waiting actions
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Cancel the run. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that is never cancelled
    pub fn never() -> Self {
        let (_handle, signal) = cancel_pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancelled; pends forever if the handle is dropped first
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
