// Frame-based I/O over the two halves of an SMPP TCP connection. The
// reader loop owns the read half exclusively; the write half sits behind
// the session's writer mutex so complete PDUs never interleave.

use bytes::{Bytes, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::codec::{CodecError, Frame, PduHeader, PduRegistry};

/// Split a connected socket into its framed halves.
pub fn split(socket: TcpStream) -> (FrameReader, FrameWriter) {
    let (read_half, write_half) = socket.into_split();
    (FrameReader::new(read_half), FrameWriter::new(write_half))
}

/// Reads SMPP frames from the connection.
///
/// SMPP framing relies on one trustworthy length prefix: four octets of
/// command_length, then exactly that many octets in total. Buffering the
/// stream and only parsing once a complete PDU is present is the only way
/// to stay synchronized; a short read at end of stream means the peer died
/// mid-frame and the session must tear down.
#[derive(Debug)]
pub struct FrameReader {
    stream: OwnedReadHalf,
    buffer: BytesMut,
}

impl FrameReader {
    pub fn new(stream: OwnedReadHalf) -> Self {
        Self {
            stream,
            // one page covers the common case; submit-heavy sessions grow it
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single frame from the stream, returning it decoded along
    /// with its raw wire bytes (hooks receive the latter).
    ///
    /// Returns `Ok(None)` on a clean end of stream (no partial frame
    /// buffered). A partial frame at end of stream, or an unparseable
    /// header, is an error: the byte stream can no longer be trusted.
    pub async fn read_frame(
        &mut self,
        registry: &PduRegistry,
    ) -> Result<Option<(Frame, Bytes)>, CodecError> {
        loop {
            if let Some(frame) = self.parse_frame(registry)? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(CodecError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "peer closed the connection mid-frame",
                )));
            }
        }
    }

    /// Try to parse one frame out of the buffer. `Ok(None)` means more
    /// data is needed; decode failures are fatal to the session.
    fn parse_frame(
        &mut self,
        registry: &PduRegistry,
    ) -> Result<Option<(Frame, Bytes)>, CodecError> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(()) => {
                let command_length = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]) as usize;

                let header = PduHeader::decode(&mut buf)?;
                let frame = registry.decode_pdu(header, &mut buf)?;

                let raw = self.buffer.split_to(command_length).freeze();
                Ok(Some((frame, raw)))
            }
            // not enough buffered yet; read more from the socket
            Err(CodecError::TruncatedHeader) | Err(CodecError::TruncatedBody { .. }) => Ok(None),
            // impossible command_length: the stream is out of sync
            Err(e) => Err(e),
        }
    }
}

/// Writes complete PDUs to the connection.
///
/// One `write_pdu` call writes one complete PDU and flushes; callers
/// serialize through the session's writer lock.
#[derive(Debug)]
pub struct FrameWriter {
    stream: BufWriter<OwnedWriteHalf>,
}

impl FrameWriter {
    pub fn new(stream: OwnedWriteHalf) -> Self {
        Self {
            stream: BufWriter::new(stream),
        }
    }

    pub async fn write_pdu(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Flush and shut down the write direction, signalling the peer that
    /// no more PDUs follow.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
