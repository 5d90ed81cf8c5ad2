//! Streaming message transport
//!
//! The harness talks to the worker through a [`DuplexChannel`]; the
//! [`WorkerProcess`] adapter connects the other end of that channel to a
//! worker's stdio using Content-Length framed JSON.

pub mod channel;
pub mod codec;
pub mod message;
pub mod worker;

pub use channel::{cancel_pair, CancelHandle, CancelSignal, DuplexChannel, MessageChannel, Received, WorkerEndpoint};
pub use message::StreamingMessage;
pub use worker::WorkerProcess;
