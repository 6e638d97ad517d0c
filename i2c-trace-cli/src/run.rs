//! Per-file decoding loop
//!
//! Files are decoded concurrently, one decoder per file, and reported in the
//! order they were given. Each file is decoded in full and buffered before
//! anything is written, so output for a long trace appears only once it ends,
//! and files after a failing one are still decoded even when the run stops.

use crate::config::RunSettings;
use crate::output::TransactionWriter;
use anyhow::{bail, Result};
use i2c_trace_decoder::{decode_file, DecoderConfig, DecoderError, DecoderStats, Transaction};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of decoding one trace file
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub transactions: Vec<Transaction>,
    pub stats: DecoderStats,
    pub error: Option<DecoderError>,
}

impl FileReport {
    /// Single diagnostic line for a failed file
    pub fn diagnostic(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e.position() {
            Some(_) => e.to_string(),
            None => format!("{}: {}", self.path.display(), e),
        })
    }
}

/// Decode one trace file, keeping every transaction surfaced before any error
pub fn decode_one(path: &Path, config: &DecoderConfig) -> FileReport {
    let mut report = FileReport {
        path: path.to_path_buf(),
        transactions: Vec::new(),
        stats: DecoderStats::default(),
        error: None,
    };

    let mut trace = match decode_file(path, config.clone()) {
        Ok(trace) => trace,
        Err(e) => {
            report.error = Some(e);
            return report;
        }
    };

    for result in trace.by_ref() {
        match result {
            Ok(transaction) => report.transactions.push(transaction),
            Err(e) => {
                report.error = Some(e);
                break;
            }
        }
    }

    report.stats = trace.decoder().stats();
    report
}

/// Decode every file and write the surfaced transactions
///
/// Without `keep_going` the first failing file ends the run; its transactions
/// up to the failure are still written.
pub fn run<W: Write>(settings: &RunSettings, writer: &mut TransactionWriter<W>) -> Result<()> {
    let reports: Vec<FileReport> = settings
        .files
        .par_iter()
        .map(|path| decode_one(path, &settings.decoder))
        .collect();

    let mut failed = 0;
    for report in &reports {
        for transaction in &report.transactions {
            writer.write(&report.path, transaction)?;
        }

        let stats = report.stats;
        log::info!(
            "{:?}: {} events, {} transactions ({} surfaced, {} filtered, {} aborted), {} after cutoff",
            report.path,
            stats.events,
            stats.closed,
            stats.emitted,
            stats.filtered,
            stats.aborted,
            stats.discarded
        );

        if let Some(diagnostic) = report.diagnostic() {
            if !settings.keep_going {
                bail!(diagnostic);
            }
            log::error!("{}", diagnostic);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} trace files failed to decode", failed, reports.len());
    }
    Ok(())
}
