//! Length-Prefixed Frame Encoding
//!
//! Message boundaries over the pipe pair shared by supervisor and worker.
//!
//! ```text
//! +----------------+------------------+
//! | length (u32 LE)| rkyv payload     |
//! +----------------+------------------+
//! ```
//!
//! Every frame is a request or a reply the peer is blocked on, so the
//! writer flushes after each one.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use thiserror::Error;

/// Maximum frame size (1 MB). Task and output messages are a few dozen bytes.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Errors raised while moving frames across the pipes
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying pipe failed, including a payload cut short
    #[error("pipe error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed its end between frames
    #[error("peer closed the channel")]
    Closed,

    /// Message could not be serialized
    #[error("cannot encode message: {0}")]
    Encode(String),

    /// Payload failed validation or could not be deserialized
    #[error("cannot decode message: {0}")]
    Decode(String),

    /// Length prefix exceeds [`MAX_FRAME_SIZE`]
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    TooLarge(usize),

    /// Length prefix of zero; every message has a payload
    #[error("empty frame")]
    Empty,
}

fn check_len(len: usize) -> Result<usize, FrameError> {
    match len {
        0 => Err(FrameError::Empty),
        n if n > MAX_FRAME_SIZE => Err(FrameError::TooLarge(n)),
        n => Ok(n),
    }
}

/// Sends framed messages
pub struct FrameWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a pipe (or any writer)
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(4 * 1024, writer),
        }
    }

    /// Serialize `message`, write it as one frame and flush.
    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        let payload =
            rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Encode(e.to_string()))?;
        let len = check_len(payload.len())?;

        self.inner.write_all(&(len as u32).to_le_bytes())?;
        self.inner.write_all(&payload)?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Receives framed messages
pub struct FrameReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a pipe (or any reader)
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::with_capacity(4 * 1024, reader),
        }
    }

    /// Block until the next frame arrives and decode it.
    ///
    /// A clean EOF before the length prefix is [`FrameError::Closed`]; an
    /// EOF inside a frame is an I/O error.
    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        let mut header = [0u8; HEADER_LEN];
        if let Err(e) = self.inner.read_exact(&mut header) {
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => FrameError::Closed,
                _ => FrameError::Io(e),
            });
        }
        let len = check_len(u32::from_le_bytes(header) as usize)?;

        // rkyv validates in place and needs an aligned buffer
        let mut payload = AlignedVec::with_capacity(len);
        payload.resize(len, 0);
        self.inner.read_exact(&mut payload)?;

        rkyv::check_archived_root::<T>(&payload)
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .deserialize(&mut Infallible)
            .map_err(|_| FrameError::Decode("archived value rejected".to_string()))
    }
}
