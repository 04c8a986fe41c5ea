//! Dedicated writer task serializing all frame writes.
//!
//! Every outbound frame goes through one mpsc channel into a single task
//! that owns the socket's write half, so exactly one frame write is in
//! flight at a time and frames never interleave on the wire. Senders
//! enqueue and return immediately; a closed channel means the session is
//! gone.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RemoteError, Result};
use crate::protocol::{CommandHeader, HEADER_SIZE};

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    header: [u8; HEADER_SIZE],
    /// Payload bytes, possibly empty.
    payload: Bytes,
}

impl OutboundFrame {
    /// Create an outbound frame from a header and payload.
    pub fn new(header: &CommandHeader, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Total wire size of this frame.
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Cheaply cloneable handle enqueueing frames for the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl WriterHandle {
    /// Enqueue a frame. Non-blocking.
    ///
    /// Fails with `ConnectionLost` once the writer task has stopped.
    pub fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| RemoteError::ConnectionLost)
    }
}

/// Spawn the writer task owning `writer`.
///
/// The task ends when every handle is dropped (clean shutdown) or a write
/// fails (the read side of the session notices the dead socket).
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::UnboundedReceiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            tracing::debug!(error = %e, "frame write failed, stopping writer");
            return Err(RemoteError::Io(e));
        }
        // Flush only once no further frame is queued.
        if rx.is_empty() {
            if let Err(e) = writer.flush().await {
                tracing::debug!(error = %e, "flush failed, stopping writer");
                return Err(RemoteError::Io(e));
            }
        }
    }
    let _ = writer.flush().await;
    Ok(())
}

async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.header).await?;
    if !frame.payload.is_empty() {
        writer.write_all(&frame.payload).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CommandKind;
    use tokio::io::{duplex, AsyncReadExt};

    fn frame(kind: CommandKind, command_id: u32, payload: &'static [u8]) -> OutboundFrame {
        let header = CommandHeader::new(kind, 1, command_id, payload.len() as u32);
        OutboundFrame::new(&header, Bytes::from_static(payload))
    }

    #[test]
    fn test_outbound_frame_size() {
        assert_eq!(frame(CommandKind::Break, 0, b"").size(), HEADER_SIZE);
        assert_eq!(frame(CommandKind::Eval, 1, b"abc").size(), HEADER_SIZE + 3);
    }

    #[tokio::test]
    async fn test_frames_arrive_in_send_order() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client);

        handle.send(frame(CommandKind::Break, 0, b"")).unwrap();
        handle.send(frame(CommandKind::Eval, 1, b"x")).unwrap();
        handle.send(frame(CommandKind::Resume, 0, b"")).unwrap();
        drop(handle);

        task.await.unwrap().unwrap();

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len(), 3 * HEADER_SIZE + 1);

        let first = CommandHeader::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(first.kind, CommandKind::Break);
        let second = CommandHeader::decode(&bytes[HEADER_SIZE..2 * HEADER_SIZE]).unwrap();
        assert_eq!(second.kind, CommandKind::Eval);
        assert_eq!(bytes[2 * HEADER_SIZE], b'x');
    }

    #[tokio::test]
    async fn test_task_stops_when_handles_dropped() {
        let (client, _server) = duplex(64);
        let (handle, task) = spawn_writer_task(client);

        drop(handle);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_send_after_peer_close_is_connection_lost() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client);
        drop(server);

        // The enqueue itself still succeeds; the task then dies on the
        // broken pipe and later sends report the loss.
        let _ = handle.send(frame(CommandKind::Break, 0, b""));
        assert!(task.await.unwrap().is_err());
        assert!(matches!(
            handle.send(frame(CommandKind::Break, 0, b"")),
            Err(RemoteError::ConnectionLost)
        ));
    }
}
