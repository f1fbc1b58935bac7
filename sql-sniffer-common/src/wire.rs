//! Frame codec for telemetry records.
//!
//! Each frame is a 4-byte big-endian length followed by a JSON body. This is
//! the default layout of `tokio_util::codec::LengthDelimitedCodec`, so the
//! collector can read frames asynchronously while the hook writes them with
//! plain blocking I/O.

use crate::TelemetryRecord;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest accepted frame body. Query text can be large (bulk inserts), but
/// anything beyond this means the stream is out of sync.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid duration {0}: must be finite and non-negative")]
    InvalidDuration(f64),

    #[error("Frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WireError {
    /// `true` when only the record body was bad and the frame boundary is
    /// intact, so the reader can skip it and continue with the next frame.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::InvalidDuration(_))
    }
}

/// Serialize a record body (no length prefix).
///
/// # Errors
/// Returns `InvalidDuration` for negative or non-finite durations.
pub fn encode_body(record: &TelemetryRecord) -> Result<Vec<u8>, WireError> {
    if !record.has_valid_duration() {
        return Err(WireError::InvalidDuration(record.duration));
    }
    Ok(serde_json::to_vec(record)?)
}

/// Deserialize a record body (no length prefix).
///
/// # Errors
/// Returns `Malformed` if the body is not a record, `InvalidDuration` if the
/// duration is negative or non-finite.
pub fn decode_body(body: &[u8]) -> Result<TelemetryRecord, WireError> {
    let record: TelemetryRecord = serde_json::from_slice(body)?;
    if !record.has_valid_duration() {
        return Err(WireError::InvalidDuration(record.duration));
    }
    Ok(record)
}

/// Serialize a record into a complete frame (length prefix + body).
///
/// # Errors
/// See [`encode_body`]; additionally `FrameTooLarge` for oversized bodies.
pub fn encode_frame(record: &TelemetryRecord) -> Result<Vec<u8>, WireError> {
    let body = encode_body(record)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(body.len()));
    }
    let len = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge(body.len()))?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Write one record as a frame.
///
/// The frame is written with a single `write_all` so a record is never split
/// by an interleaved writer.
///
/// # Errors
/// Encoding errors, or any I/O error from the writer (a closed peer shows up
/// as `BrokenPipe` / `ConnectionReset`).
pub fn write_record<W: Write>(writer: &mut W, record: &TelemetryRecord) -> Result<(), WireError> {
    let frame = encode_frame(record)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one record frame.
///
/// Returns `Ok(None)` on a clean end of stream (EOF exactly on a frame
/// boundary). EOF in the middle of a frame is an `UnexpectedEof` I/O error.
///
/// # Errors
/// I/O errors, `FrameTooLarge`, or body decoding errors. Body decoding errors
/// leave the reader positioned at the next frame.
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<TelemetryRecord>, WireError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    decode_body(&body).map(Some)
}
