//! Worker process transport
//!
//! Spawns the worker and pumps framed messages between its stdio and a
//! [`WorkerEndpoint`]: outbound queue → worker stdin, worker stdout →
//! inbound queue.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::{Error, Result};

use super::channel::WorkerEndpoint;
use super::codec;
use super::message::StreamingMessage;

/// How long shutdown waits for queued messages to reach the worker
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long shutdown waits for the worker to exit after stdin closes
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// A running worker process wired to a duplex channel
pub struct WorkerProcess {
    child: Child,
    close_outbound: Option<oneshot::Sender<()>>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

impl WorkerProcess {
    /// Spawn the worker and start pumping messages
    pub fn spawn(program: &Path, args: &[String], endpoint: WorkerEndpoint) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::WorkerStartFailed(format!("Failed to start {}: {}", program.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::WorkerStartFailed("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::WorkerStartFailed("Failed to get worker stdout".to_string()))?;

        tracing::info!(program = %program.display(), pid = ?child.id(), "Worker started");

        let WorkerEndpoint { inbound, outbound } = endpoint;
        let (close_tx, close_rx) = oneshot::channel();
        let writer_task = tokio::spawn(pump_outbound(outbound, BufWriter::new(stdin), close_rx));
        let reader_task = tokio::spawn(pump_inbound(BufReader::new(stdout), inbound));

        Ok(Self {
            child,
            close_outbound: Some(close_tx),
            writer_task,
            reader_task,
        })
    }

    /// Check if the worker is still running
    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Deliver queued messages, close stdin, then stop the worker
    ///
    /// Messages sent before this call are written first. The worker is
    /// killed if it has not exited shortly after its stdin closes.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(close) = self.close_outbound.take() {
            let _ = close.send(());
        }
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.writer_task)
            .await
            .is_err()
        {
            tracing::warn!(
                "Worker did not accept queued messages within {}ms, discarding them",
                DRAIN_TIMEOUT.as_millis()
            );
            self.writer_task.abort();
        }

        if let Ok(status) = tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            tracing::debug!(status = ?status.ok(), "Worker exited");
        }
        self.reader_task.abort();
        if self.is_running() {
            self.child.kill().await?;
        }
        tracing::debug!("Worker stopped");
        Ok(())
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        self.writer_task.abort();
        self.reader_task.abort();
        let _ = self.child.start_kill();
    }
}

/// Forward harness messages to the worker, one frame each, in order
///
/// Once `close` fires no new messages are accepted; those already queued
/// are still written before stdin is shut down.
pub async fn pump_outbound<W: AsyncWrite + Unpin>(
    mut outbound: mpsc::UnboundedReceiver<StreamingMessage>,
    mut writer: W,
    mut close: oneshot::Receiver<()>,
) {
    let mut closing = false;
    loop {
        let message = tokio::select! {
            biased;
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
            _ = &mut close, if !closing => {
                closing = true;
                outbound.close();
                continue;
            }
        };

        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(message = %message.describe(), "Failed to encode message: {}", e);
                continue;
            }
        };
        tracing::trace!("WORKER <<< {}", json);
        if let Err(e) = codec::write_frame(&mut writer, &json).await {
            let lost = 1 + std::iter::from_fn(|| outbound.try_recv().ok()).count();
            tracing::warn!(lost, "Worker stdin closed: {}", e);
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Failed to close worker stdin: {}", e);
    }
}

/// Forward worker frames to the harness until the stream ends
///
/// Frames that are not valid messages are logged and skipped. Returning
/// drops the inbound sender, which a waiting action observes as closed.
pub async fn pump_inbound<R: AsyncBufRead + Unpin>(
    mut reader: R,
    inbound: mpsc::UnboundedSender<StreamingMessage>,
) {
    loop {
        let json = match codec::read_frame(&mut reader).await {
            Ok(json) => json,
            Err(Error::WorkerCrashed) => {
                tracing::info!("Worker output closed");
                break;
            }
            Err(e) => {
                tracing::error!("Worker stream error: {}", e);
                break;
            }
        };
        tracing::trace!("WORKER >>> {}", json);

        match serde_json::from_str::<StreamingMessage>(&json) {
            Ok(message) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("Skipping malformed worker message: {}: {}", e, json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_pump_inbound_skips_malformed_frames() {
        let data = b"Content-Length: 5\r\n\r\n[1,2]Content-Length: 39\r\n\r\n{\"requestId\":\"r1\",\"rpcLog\":{\"level\":1}}";
        let (tx, mut rx) = mpsc::unbounded_channel();

        pump_inbound(BufReader::new(Cursor::new(data.to_vec())), tx).await;

        let message = rx.recv().await.unwrap();
        assert_eq!(message.request_id, "r1");
        assert_eq!(message.message_type(), Some("rpcLog"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_outbound_writes_frames_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(StreamingMessage::new("a", "first", json!({}))).unwrap();
        tx.send(StreamingMessage::new("b", "second", json!({}))).unwrap();
        drop(tx);

        let (_close_tx, close_rx) = oneshot::channel();
        let mut output = Vec::new();
        pump_outbound(rx, &mut output, close_rx).await;

        let mut reader = BufReader::new(Cursor::new(output));
        let first: StreamingMessage =
            serde_json::from_str(&codec::read_frame(&mut reader).await.unwrap()).unwrap();
        let second: StreamingMessage =
            serde_json::from_str(&codec::read_frame(&mut reader).await.unwrap()).unwrap();
        assert_eq!(first.request_id, "a");
        assert_eq!(second.request_id, "b");
    }

    #[tokio::test]
    async fn test_pump_outbound_drains_queue_after_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        tx.send(StreamingMessage::new("t", "workerTerminate", json!({}))).unwrap();
        close_tx.send(()).unwrap();

        let mut output = Vec::new();
        pump_outbound(rx, &mut output, close_rx).await;

        let mut reader = BufReader::new(Cursor::new(output));
        let frame = codec::read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, "{\"requestId\":\"t\",\"workerTerminate\":{}}");
        assert!(tx.send(StreamingMessage::empty("late")).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_delivers_queued_messages() {
        use crate::stream::{DuplexChannel, MessageChannel};

        let dir = tempfile::tempdir().unwrap();
        let sink = dir.path().join("stdin.bin");
        let (channel, endpoint) = DuplexChannel::new();
        let worker = WorkerProcess::spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), format!("cat > '{}'", sink.display())],
            endpoint,
        )
        .unwrap();

        channel
            .send(StreamingMessage::new("t", "workerTerminate", json!({})))
            .unwrap();
        worker.shutdown().await.unwrap();

        let written = std::fs::read_to_string(&sink).unwrap();
        assert_eq!(
            written,
            "Content-Length: 38\r\n\r\n{\"requestId\":\"t\",\"workerTerminate\":{}}"
        );
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let (_channel, endpoint) = crate::stream::DuplexChannel::new();
        let result = WorkerProcess::spawn(Path::new("/nonexistent/worker-binary"), &[], endpoint);
        assert!(matches!(result, Err(Error::WorkerStartFailed(_))));
    }
}
