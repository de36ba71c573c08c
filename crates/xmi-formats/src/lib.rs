//! XMI container and event-stream parsing.
//!
//! Locates the `EVNT` chunk inside the IFF `FORM`/`CAT ` framing used
//! by the AIL Miles Sound System, decodes the XMI event encoding, and
//! offers a metadata-only probe.

mod container;
mod event;
mod probe;
mod reader;

pub use container::{find_evnt, EvntChunk};
pub use event::{read_delta, read_event, read_vlq, EvntEvent};
pub use probe::{probe, XmiInfo};
pub use reader::{ByteReader, Eof};

use std::fmt;

/// Error type for container loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// File missing or unreadable
    NotFound(String),
    /// Container walk finished without locating an EVNT chunk
    NoEvntChunk,
    /// Chunk header or payload claims bytes past the end of the file
    TruncatedContainer,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(msg) => write!(f, "cannot read file: {}", msg),
            LoadError::NoEvntChunk => write!(f, "no EVNT chunk in container"),
            LoadError::TruncatedContainer => write!(f, "truncated container"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Error type for event-stream decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Event byte had the high bit clear with no prior status byte
    RunningStatusWithoutPrior,
    /// Status byte outside the recognised ranges
    UnknownStatus(u8),
    /// Event data ran past the end of the chunk
    UnexpectedEof,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::RunningStatusWithoutPrior => {
                write!(f, "running status with no prior status byte")
            }
            DecodeError::UnknownStatus(status) => {
                write!(f, "unknown status byte 0x{:02X}", status)
            }
            DecodeError::UnexpectedEof => write!(f, "event stream ended mid-event"),
        }
    }
}

impl std::error::Error for DecodeError {}
