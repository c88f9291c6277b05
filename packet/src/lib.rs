//! Shared packet layout for the lora link
//!
//! both the transmitter and the receiver agree on these structures byte for byte.
//! there is no framing at this layer: a record is a raw fixed-size blob, and the
//! radio transport is expected to have validated whatever framing it uses before
//! handing the bytes over.
//!
//! all multi-byte values are little-endian on the wire, and there is no padding.

pub mod message;
pub mod peer;

pub use message::{MessagePacket, RawMessagePacket};
pub use peer::PeerNode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the buffer provided was too small (for writing data)")]
    TooSmallWrite,
    #[error("the buffer provided was too small (for reading data)")]
    TooSmallRead,
}

pub type Result<T> = ::core::result::Result<T, Error>;
