//! Framing for the worker's stdio stream
//!
//! Each streaming message travels as one JSON document prefixed by its
//! byte length, in both directions:
//! ```text
//! Content-Length: 39\r\n
//! \r\n
//! {"requestId":"r1","workerTerminate":{}}
//! ```
//! Unknown header lines from the worker are tolerated. A worker whose
//! stdout ends mid-frame is reported as crashed.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Largest message body accepted from a worker
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Pull the next message body off the worker's stdout
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    let len = read_body_length(reader).await?;
    if len > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Worker sent a {} byte message, limit is {}",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(eof_as_crash)?;

    String::from_utf8(body)
        .map_err(|e| Error::Protocol(format!("Worker message is not UTF-8: {}", e)))
}

/// Consume header lines up to the blank separator
async fn read_body_length<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<usize, Error> {
    let mut content_length = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.map_err(eof_as_crash)? == 0 {
            return Err(Error::WorkerCrashed);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let value = value.trim();
            content_length = Some(value.parse().map_err(|_| {
                Error::Protocol(format!("Invalid Content-Length from worker: {}", value))
            })?);
        }
    }

    content_length
        .ok_or_else(|| Error::Protocol("Worker message has no Content-Length header".to_string()))
}

/// Push one message body onto the worker's stdin
///
/// Flushes so the worker sees the frame before the harness starts waiting
/// for its reply.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<(), Error> {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

fn eof_as_crash(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::WorkerCrashed,
        _ => Error::Io(e),
    }
}
