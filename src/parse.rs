//! parsing of the receiver's text output
//!
//! the receiver prints every packet it gets as a block of `key: value` lines.
//! lines are buffered until all six readings have been seen, then a record is produced.

use lora_packet::MessagePacket;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("buffer overflow without any matches. resetting buffer")]
    BufferOverflow,
}

/// keys in `MessagePacket` field order
const KEYS: [&str; 6] = [
    "pressure",
    "temperature",
    "altitude",
    "current_mA",
    "loadVoltage",
    "power_mW",
];

#[derive(Debug)]
pub struct TextParser {
    buffer: String,
    max_buffer: usize,
}

impl TextParser {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            buffer: String::new(),
            max_buffer,
        }
    }

    /// add one line (without its line ending) to the buffer
    ///
    /// returns `Some(Ok(..))` once a whole record has been seen, `Some(Err(..))`
    /// if the buffer was dropped for growing past `max_buffer`
    pub fn push_line(&mut self, line: &str) -> Option<Result<MessagePacket, ParseError>> {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if let Some(msg) = parse_buffer(&self.buffer) {
            self.buffer.clear();
            return Some(Ok(msg));
        }

        if self.buffer.len() > self.max_buffer {
            self.buffer.clear();
            return Some(Err(ParseError::BufferOverflow));
        }
        None
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// all six readings from `buf`, or None if any is missing
pub fn parse_buffer(buf: &str) -> Option<MessagePacket> {
    let mut values = [0f32; 6];
    for (key, slot) in KEYS.iter().zip(values.iter_mut()) {
        *slot = find_value(buf, key)?;
    }
    let [pressure, temperature, altitude, current_ma, load_voltage, power_mw] = values;
    Some(MessagePacket {
        pressure,
        temperature,
        altitude,
        current_ma,
        load_voltage,
        power_mw,
    })
}

/// value of the first `<key>: <number>` in `buf`
fn find_value(buf: &str, key: &str) -> Option<f32> {
    buf.match_indices(key).find_map(|(at, _)| {
        let rest = buf[at + key.len()..].strip_prefix(": ")?;
        let len = number_len(rest)?;
        rest[..len].parse().ok()
    })
}

/// length of a leading `-?\d+\.\d+` in `s`
fn number_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let int = digits(end);
    if int == 0 {
        return None;
    }
    end += int;
    if bytes.get(end) != Some(&b'.') {
        return None;
    }
    end += 1;
    match digits(end) {
        0 => None,
        frac => Some(end + frac),
    }
}
