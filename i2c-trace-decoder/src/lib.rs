//! I2C Trace Decoder Library
//!
//! Reconstructs I2C bus transactions from the bus-level events a logic
//! analyzer exports (start, address + ACK/NAK, data + ACK/NAK, stop), one event
//! per record.
//!
//! # Architecture
//!
//! - [`formats`] turns trace exports into a stream of [`BusEvent`]s
//! - [`transitions`] holds the protocol states and the transition table
//! - [`Decoder`] applies the table to one event at a time and surfaces
//!   completed transactions addressed to one device
//!
//! The decoder can attach anywhere inside a trace: it ignores address and data
//! events until it sees a start or stop condition. A cutoff time stops new
//! transactions from being opened once it has passed.
//!
//! The library does NOT print anything or decide what to do on errors; every
//! error is returned to the caller.
//!
//! # Example Usage
//!
//! ```no_run
//! use i2c_trace_decoder::{decode_file, DecoderConfig};
//! use std::path::Path;
//!
//! let config = DecoderConfig::new(0x20).with_timeout(10.0);
//! for transaction in decode_file(Path::new("capture.csv"), config).unwrap() {
//!     match transaction {
//!         Ok(transaction) => println!("{}", transaction),
//!         Err(e) => {
//!             eprintln!("{}", e);
//!             break;
//!         }
//!     }
//! }
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod formats;
pub mod transitions;
pub mod types;

// Re-export main types for convenience
pub use config::{parse_address, DecoderConfig, RepeatedStartPolicy};
pub use decoder::{decode_file, Decoder, DecoderStats, TraceDecoder};
pub use formats::CsvTraceReader;
pub use transitions::State;
pub use types::{BusEvent, DecoderError, Direction, EventKind, Position, Result, Transaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
