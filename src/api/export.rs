//!
//! Drive a writer over a range of blocks.
//!

use crate::api::sort::sort_unique;
use crate::errors::OpResult;
use crate::parser::proto::simple_proto::SBlock;
use crate::writer::csv::{CsvDumpOptions, CsvDumpWriter};
use crate::writer::db::{DbDumpOptions, DbDumpWriter, RelationalStore};
use crate::writer::schema::RecordSet;
use crate::writer::BlockWriter;
use log::{info, warn};
use serde::Deserialize;
use std::borrow::Borrow;
use std::path::PathBuf;

/// Sorted unique after a csv export when transactions are deduplicated.
const TRANSACTION_RECORD_SETS: [RecordSet; 4] = [
    RecordSet::Transactions,
    RecordSet::RelTxOutput,
    RecordSet::Outputs,
    RecordSet::RelOutputAddress,
];

///
/// Settings of a csv export run.
///
/// Every field has a default, so a partial config deserializes.
///
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_path: PathBuf,
    pub plain_header: bool,
    pub separate_header: bool,
    ///
    /// Also sort-unique transactions, outputs and their relationships,
    /// which a block replayed after a partial export emits twice.
    ///
    pub deduplicate_transactions: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output_path: PathBuf::from("blocks"),
            plain_header: false,
            separate_header: true,
            deduplicate_transactions: true,
        }
    }
}

impl ExportConfig {
    /// Default config writing to `blocks_<start>_<end>`.
    pub fn for_range(start: u32, end: u32) -> Self {
        ExportConfig {
            output_path: PathBuf::from(format!("blocks_{}_{}", start, end)),
            ..Default::default()
        }
    }

    pub fn csv_options(&self) -> CsvDumpOptions {
        CsvDumpOptions {
            plain_header: self.plain_header,
            separate_header: self.separate_header,
        }
    }
}

///
/// Open `writer`, write every block in the given order, and close it.
///
/// The writer is closed on every exit path. A write error wins over a
/// close error. `progress` receives the processed fraction each time it
/// crosses another whole percent of `total`.
///
/// Returns the number of blocks written.
///
pub fn write_blocks<W, I, P>(writer: &mut W, blocks: I, total: usize, mut progress: P) -> OpResult<usize>
where
    W: BlockWriter + ?Sized,
    I: IntoIterator,
    I::Item: Borrow<SBlock>,
    P: FnMut(f64),
{
    writer.open()?;
    let mut written = 0;
    let mut result = Ok(());
    for block in blocks {
        if let Err(e) = writer.write(block.borrow()) {
            result = Err(e);
            break;
        }
        written += 1;
        if total > 0 && (written * 100) / total > ((written - 1) * 100) / total {
            progress(written as f64 / total as f64);
        }
    }
    let closed = writer.close();
    match (result, closed) {
        (Err(e), Err(close_error)) => {
            warn!("close after failed write also failed: {}", close_error);
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(written),
    }
}

///
/// Export `blocks` as csv files following `config`.
///
/// With separate headers, `addresses` is sorted unique afterwards, and so
/// are the transaction record-sets when `deduplicate_transactions` is set.
/// In-line headers would be sorted into the data, so nothing is
/// post-processed then.
///
pub fn export_csv<I, P>(config: &ExportConfig, blocks: I, total: usize, progress: P) -> OpResult<usize>
where
    I: IntoIterator,
    I::Item: Borrow<SBlock>,
    P: FnMut(f64),
{
    let mut writer = CsvDumpWriter::new(&config.output_path, config.csv_options())?;
    info!("exporting {} blocks to {}", total, config.output_path.display());
    let written = write_blocks(&mut writer, blocks, total, progress)?;

    if config.separate_header {
        sort_unique(&writer.data_path(RecordSet::Addresses))?;
        if config.deduplicate_transactions {
            for record_set in TRANSACTION_RECORD_SETS.iter() {
                sort_unique(&writer.data_path(*record_set))?;
            }
        }
    }
    info!("exported {} blocks", written);
    Ok(written)
}

///
/// Export `blocks` into the tables of `store`.
///
pub fn export_db<S, I, P>(
    store: S,
    options: DbDumpOptions,
    blocks: I,
    total: usize,
    progress: P,
) -> OpResult<usize>
where
    S: RelationalStore,
    I: IntoIterator,
    I::Item: Borrow<SBlock>,
    P: FnMut(f64),
{
    let mut writer = DbDumpWriter::with_options(store, options)?;
    info!("exporting {} blocks to relational store", total);
    let written = write_blocks(&mut writer, blocks, total, progress)?;
    info!("exported {} blocks", written);
    Ok(written)
}
