//! Core types for the I2C trace decoder library
//!
//! This module defines the bus events the decoder consumes, the transactions it
//! emits, and the errors it reports. Events are parsed from exported logic
//! analyzer records of the form `<time>,<event-name>[,<data>]`.

use crate::transitions::State;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Location of a record inside its source (file name or label + line number)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Source name, usually the trace file path
    pub source: Arc<str>,
    /// 1-based line number of the record
    pub line: u64,
}

impl Position {
    pub fn new(source: impl Into<Arc<str>>, line: u64) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Errors that can occur during decoding
///
/// Every variant is fatal to the trace it came from. The caller decides whether
/// to stop the whole run or move on to the next trace.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("{position}: malformed time field {value:?}")]
    MalformedTime { position: Position, value: String },

    #[error("{position}: truncated record, expected at least a time and an event name")]
    TruncatedRecord { position: Position },

    #[error("{position}: unexpected \"{event}\" in state {state}")]
    ProtocolViolation {
        position: Position,
        state: State,
        event: String,
    },

    #[error("{position}: malformed address {value:?}")]
    MalformedAddress { position: Position, value: String },

    #[error("Failed to read trace records: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecoderError {
    /// Record position the error refers to, if it came from a specific record
    pub fn position(&self) -> Option<&Position> {
        match self {
            DecoderError::MalformedTime { position, .. }
            | DecoderError::TruncatedRecord { position }
            | DecoderError::ProtocolViolation { position, .. }
            | DecoderError::MalformedAddress { position, .. } => Some(position),
            DecoderError::CsvError(_) | DecoderError::IoError(_) => None,
        }
    }
}

/// The fixed vocabulary of bus events exported by the logic analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartBit,
    RepeatedStartBit,
    StopBit,
    WriteAddressAck,
    WriteAddressNak,
    ReadAddressAck,
    ReadAddressNak,
    DataAck,
    DataNak,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::StartBit,
        EventKind::RepeatedStartBit,
        EventKind::StopBit,
        EventKind::WriteAddressAck,
        EventKind::WriteAddressNak,
        EventKind::ReadAddressAck,
        EventKind::ReadAddressNak,
        EventKind::DataAck,
        EventKind::DataNak,
    ];

    /// Canonical event name as it appears in the trace
    pub fn name(self) -> &'static str {
        match self {
            EventKind::StartBit => "Start Bit",
            EventKind::RepeatedStartBit => "Repeated Start Bit",
            EventKind::StopBit => "Stop Bit",
            EventKind::WriteAddressAck => "Write Address + ACK",
            EventKind::WriteAddressNak => "Write Address + NAK",
            EventKind::ReadAddressAck => "Read Address + ACK",
            EventKind::ReadAddressNak => "Read Address + NAK",
            EventKind::DataAck => "Data + ACK",
            EventKind::DataNak => "Data + NAK",
        }
    }

    /// Look up an event by name, collapsing internal whitespace first
    pub fn from_name(name: &str) -> Option<Self> {
        let name = normalize_whitespace(name);
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed trace record
///
/// The event name is kept as text: a name outside the vocabulary is not a parse
/// error, it is reported by the decoder as a protocol violation.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    /// Where the record came from
    pub position: Position,
    /// Capture time in seconds
    pub time: f64,
    /// Event name with whitespace collapsed
    pub name: String,
    /// Optional payload (address or data byte), empty when absent
    pub data: String,
}

impl BusEvent {
    /// Parse a record from its fields: time, event name, optional data.
    /// Extra trailing fields are ignored.
    pub fn parse_fields<'a, I>(fields: I, position: Position) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = fields.into_iter();
        let (time, name) = match (fields.next(), fields.next()) {
            (Some(time), Some(name)) => (time.trim(), name),
            _ => return Err(DecoderError::TruncatedRecord { position }),
        };

        let time = match time.parse::<f64>() {
            Ok(time) => time,
            Err(_) => {
                return Err(DecoderError::MalformedTime {
                    position,
                    value: time.to_string(),
                })
            }
        };

        Ok(Self {
            position,
            time,
            name: normalize_whitespace(name),
            data: fields.next().map(normalize_whitespace).unwrap_or_default(),
        })
    }

    /// Parse a single comma-separated record line
    pub fn parse_line(line: &str, position: Position) -> Result<Self> {
        Self::parse_fields(line.trim_end_matches(['\r', '\n']).split(','), position)
    }

    /// Resolve the event name against the vocabulary
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_name(&self.name)
    }
}

/// Transfer direction taken from the address event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Fixed-width label used in the transaction line
    pub fn label(self) -> &'static str {
        match self {
            Direction::Write => "Write",
            Direction::Read => "Read ",
        }
    }
}

/// A completed bus transaction addressed to the filtered device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// Time of the start condition that opened the transaction
    pub start_time: Option<f64>,
    /// Transfer direction
    pub direction: Direction,
    /// Parsed device address
    pub address: u32,
    /// Address exactly as it appeared in the trace
    pub address_text: String,
    /// True if the device did not acknowledge its address
    pub nak: bool,
    /// Data bytes as they appeared in the trace
    pub data: Vec<String>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(time) = self.start_time {
            write!(f, "{} ", format_time(time))?;
        }
        write!(f, "{} {} ", self.direction.label(), self.address_text)?;
        if self.nak {
            return f.write_str("NAK ");
        }
        f.write_str("DATA ")?;
        for byte in &self.data {
            write!(f, "{} ", byte)?;
        }
        Ok(())
    }
}

/// Fixed-precision timestamp used in transaction lines
pub(crate) fn format_time(time: f64) -> String {
    format!("{:.8}", time)
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
