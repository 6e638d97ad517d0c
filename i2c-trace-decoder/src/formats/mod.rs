//! Trace export readers
//!
//! Each reader is an iterator over parsed [`BusEvent`](crate::types::BusEvent)
//! records that can be handed to a [`TraceDecoder`](crate::decoder::TraceDecoder).

pub mod csv;

pub use self::csv::CsvTraceReader;
