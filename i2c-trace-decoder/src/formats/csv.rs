//! CSV trace export reader
//!
//! Logic analyzer exports carry one bus event per row:
//!
//! ```text
//! Time [s],Event,Data
//! 0.100000000,Start Bit
//! 0.100012000,Write Address + ACK,0x20
//! ```
//!
//! The header row is mandatory and skipped. Rows may have any number of
//! columns; only the first three are used.

use crate::types::{BusEvent, Position, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Iterator over the bus events of a CSV trace export
pub struct CsvTraceReader<R> {
    records: ::csv::StringRecordsIntoIter<R>,
    source: Arc<str>,
}

impl CsvTraceReader<File> {
    /// Open a trace export on disk
    pub fn from_path(path: &Path) -> Result<Self> {
        log::debug!("Opening trace export: {:?}", path);
        let file = File::open(path)?;
        Ok(Self::from_reader(file, path.display().to_string()))
    }
}

impl<R: Read> CsvTraceReader<R> {
    /// Read a trace export from any byte source; `source` names it in errors
    pub fn from_reader(reader: R, source: impl Into<Arc<str>>) -> Self {
        let reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        Self {
            records: reader.into_records(),
            source: source.into(),
        }
    }
}

impl<R: Read> Iterator for CsvTraceReader<R> {
    type Item = Result<BusEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let position = Position::new(Arc::clone(&self.source), line);
        Some(BusEvent::parse_fields(record.iter(), position))
    }
}
