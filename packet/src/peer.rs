use std::{fmt, mem::size_of};

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use super::{Error, Result};

/// size of one peer address on the wire
pub const SIZE: usize = 3;

/// fixed address of a radio node (ADDH, ADDL, CHAN)
///
/// the three bytes are opaque, `addh`/`addl` are never combined into a u16 here.
/// this is set once when a node is provisioned and not changed afterwards.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromZeroes,
    FromBytes,
    AsBytes,
    Unaligned,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct PeerNode {
    /// high byte of the address (ADDH)
    pub addh: u8,
    /// low byte of the address (ADDL)
    pub addl: u8,
    /// radio channel (CHAN)
    pub chan: u8,
}

const_assert_eq!(size_of::<PeerNode>(), SIZE);

impl PeerNode {
    pub const fn new(addh: u8, addl: u8, chan: u8) -> Self {
        Self { addh, addl, chan }
    }

    pub fn to_bytes(&self) -> [u8; SIZE] {
        zerocopy::transmute!(*self)
    }

    pub fn from_bytes(bytes: &[u8; SIZE]) -> Self {
        zerocopy::transmute!(*bytes)
    }

    pub fn read_from_prefix(buf: &[u8]) -> Result<Self> {
        <Self as FromBytes>::read_from_prefix(buf).ok_or(Error::TooSmallRead)
    }

    pub fn write_to_prefix(&self, buf: &mut [u8]) -> Result<()> {
        <Self as AsBytes>::write_to_prefix(self, buf).ok_or(Error::TooSmallWrite)
    }
}

impl fmt::Display for PeerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}@{:02x}", self.addh, self.addl, self.chan)
    }
}
