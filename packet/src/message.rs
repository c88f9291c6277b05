use std::{fmt, mem::size_of};

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use zerocopy::{byteorder::little_endian::F32, AsBytes, FromBytes, FromZeroes, Unaligned};

use super::{Error, Result};

/// size of one telemetry record on the wire
pub const SIZE: usize = 24;

/// one measurement cycle, as sent by the transmitter
///
/// the sender fills in every field. nothing here is derived, in particular
/// `power_mw` is sent as-is and is *not* checked against `current_ma * load_voltage`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MessagePacket {
    // barometer data
    pub pressure: f32,
    pub temperature: f32,
    pub altitude: f32,

    // power consumption data
    #[serde(rename = "current_mA")]
    pub current_ma: f32,
    #[serde(rename = "loadVoltage")]
    pub load_voltage: f32,
    #[serde(rename = "power_mW")]
    pub power_mw: f32,
}

/// on-wire shape of `MessagePacket`
///
/// field order is part of the contract, do not reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct RawMessagePacket {
    pub pressure: F32,
    pub temperature: F32,
    pub altitude: F32,
    pub current_ma: F32,
    pub load_voltage: F32,
    pub power_mw: F32,
}

const_assert_eq!(size_of::<RawMessagePacket>(), SIZE);

impl MessagePacket {
    pub fn new(
        pressure: f32,
        temperature: f32,
        altitude: f32,
        current_ma: f32,
        load_voltage: f32,
        power_mw: f32,
    ) -> Self {
        Self {
            pressure,
            temperature,
            altitude,
            current_ma,
            load_voltage,
            power_mw,
        }
    }

    pub fn to_raw(&self) -> RawMessagePacket {
        RawMessagePacket {
            pressure: F32::new(self.pressure),
            temperature: F32::new(self.temperature),
            altitude: F32::new(self.altitude),
            current_ma: F32::new(self.current_ma),
            load_voltage: F32::new(self.load_voltage),
            power_mw: F32::new(self.power_mw),
        }
    }

    pub fn to_bytes(&self) -> [u8; SIZE] {
        zerocopy::transmute!(self.to_raw())
    }

    pub fn from_bytes(bytes: &[u8; SIZE]) -> Self {
        let raw: RawMessagePacket = zerocopy::transmute!(*bytes);
        raw.into()
    }

    /// true if no reading is NaN or infinite
    pub fn is_finite(&self) -> bool {
        [
            self.pressure,
            self.temperature,
            self.altitude,
            self.current_ma,
            self.load_voltage,
            self.power_mw,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// reads one record from the start of `buf`, ignoring anything after it
    pub fn read_from_prefix(buf: &[u8]) -> Result<Self> {
        RawMessagePacket::read_from_prefix(buf)
            .map(Self::from)
            .ok_or(Error::TooSmallRead)
    }

    /// writes this record to the start of `buf`, leaving the rest untouched
    pub fn write_to_prefix(&self, buf: &mut [u8]) -> Result<()> {
        self.to_raw()
            .write_to_prefix(buf)
            .ok_or(Error::TooSmallWrite)
    }
}

impl From<RawMessagePacket> for MessagePacket {
    fn from(raw: RawMessagePacket) -> Self {
        Self {
            pressure: raw.pressure.get(),
            temperature: raw.temperature.get(),
            altitude: raw.altitude.get(),
            current_ma: raw.current_ma.get(),
            load_voltage: raw.load_voltage.get(),
            power_mw: raw.power_mw.get(),
        }
    }
}

impl From<MessagePacket> for RawMessagePacket {
    fn from(msg: MessagePacket) -> Self {
        msg.to_raw()
    }
}

/// the text block printed by the receiver for every packet it gets
impl fmt::Display for MessagePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pressure: {:.2}", self.pressure)?;
        writeln!(f, "temperature: {:.2}", self.temperature)?;
        writeln!(f, "altitude: {:.2}", self.altitude)?;
        writeln!(f, "current_mA: {:.2}", self.current_ma)?;
        writeln!(f, "loadVoltage: {:.2}", self.load_voltage)?;
        writeln!(f, "power_mW: {:.2}", self.power_mw)
    }
}
