//! Rendering of surfaced transactions
//!
//! Text output is one transaction line per transaction, exactly as the decoder
//! renders it. JSON output is one object per line.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use i2c_trace_decoder::Transaction;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct JsonRecord<'a> {
    file: String,
    #[serde(flatten)]
    transaction: &'a Transaction,
    line: String,
}

/// Writes transactions to stdout or a file in the selected format
pub struct TransactionWriter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl TransactionWriter<Box<dyn Write>> {
    /// Open the output destination; `None` means stdout
    pub fn create(path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let out: Box<dyn Write> = match path {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output file: {:?}", path))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };
        Ok(Self::new(out, format))
    }
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn write(&mut self, source: &Path, transaction: &Transaction) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", transaction)?,
            OutputFormat::Json => {
                let record = JsonRecord {
                    file: source.display().to_string(),
                    transaction,
                    line: transaction.to_string(),
                };
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
