//!
//! Flat-file writer producing CSV files for a bulk graph-database import.
//!
//! Every record-set gets a `<name>.csv` data file opened in append mode.
//! Headers carry the import tool's type and role annotations
//! (`hash:ID(Block)`, `txid:START_ID(Transaction)`, `height:int`, ...)
//! unless `plain_header` is set, and go to `<name>_header.csv` when
//! `separate_header` is set, in front of the data otherwise.
//!

use crate::errors::{OpError, OpResult};
use crate::parser::proto::simple_proto::SBlock;
use crate::writer::schema::RecordSet;
use crate::writer::{emit_block, BlockWriter, Field};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvDumpOptions {
    /// Bare attribute names, without type and role annotations
    pub plain_header: bool,
    /// Headers in `<name>_header.csv` instead of in front of the data
    pub separate_header: bool,
}

impl Default for CsvDumpOptions {
    fn default() -> Self {
        CsvDumpOptions {
            plain_header: false,
            separate_header: true,
        }
    }
}

pub struct CsvDumpWriter {
    output_path: PathBuf,
    options: CsvDumpOptions,
    /// One sink per record-set, indexed by `RecordSet::index`
    sinks: Option<Vec<BufWriter<File>>>,
    line: String,
}

impl CsvDumpWriter {
    ///
    /// Create `output_path` if needed and write the header of every
    /// record-set. Data files are only touched by `open`, except that
    /// in-line headers truncate them.
    ///
    pub fn new<P: AsRef<Path>>(output_path: P, options: CsvDumpOptions) -> OpResult<CsvDumpWriter> {
        let output_path = output_path.as_ref().to_path_buf();
        fs::create_dir_all(&output_path).map_err(|source| OpError::CreateDir {
            path: output_path.clone(),
            source,
        })?;
        let writer = CsvDumpWriter {
            output_path,
            options,
            sinks: None,
            line: String::with_capacity(256),
        };
        for record_set in RecordSet::ALL.iter() {
            writer.write_header(*record_set)?;
        }
        info!(
            "csv export to {} (plain_header: {}, separate_header: {})",
            writer.output_path.display(),
            options.plain_header,
            options.separate_header
        );
        Ok(writer)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn options(&self) -> CsvDumpOptions {
        self.options
    }

    pub fn is_open(&self) -> bool {
        self.sinks.is_some()
    }

    pub fn data_path(&self, record_set: RecordSet) -> PathBuf {
        self.output_path.join(format!("{}.csv", record_set.name()))
    }

    pub fn header_path(&self, record_set: RecordSet) -> PathBuf {
        if self.options.separate_header {
            self.output_path
                .join(format!("{}_header.csv", record_set.name()))
        } else {
            self.data_path(record_set)
        }
    }

    fn write_header(&self, record_set: RecordSet) -> OpResult<()> {
        let path = self.header_path(record_set);
        let header = record_set.schema().header(self.options.plain_header);
        let mut line = String::new();
        for (i, name) in header.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            push_escaped(&mut line, name);
        }
        line.push('\n');
        fs::write(&path, line).map_err(|source| OpError::Header {
            record_set,
            path,
            source,
        })
    }
}

impl BlockWriter for CsvDumpWriter {
    fn open(&mut self) -> OpResult<()> {
        if self.sinks.is_some() {
            return Err(OpError::AlreadyOpen);
        }
        let mut sinks = Vec::with_capacity(RecordSet::ALL.len());
        for record_set in RecordSet::ALL.iter() {
            let path = self.data_path(*record_set);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| OpError::Open {
                    record_set: *record_set,
                    path,
                    source,
                })?;
            sinks.push(BufWriter::new(file));
        }
        self.sinks = Some(sinks);
        Ok(())
    }

    fn write(&mut self, block: &SBlock) -> OpResult<()> {
        let sinks = self.sinks.as_mut().ok_or(OpError::NotOpen)?;
        let line = &mut self.line;
        debug!("writing block {} ({})", block.header.height, block.header.block_hash);
        emit_block(block, |record_set, fields| {
            format_row(line, fields);
            sinks[record_set.index()]
                .write_all(line.as_bytes())
                .map_err(|source| OpError::Append { record_set, source })
        })
    }

    ///
    /// Flush and close every sink. A sink failing to flush does not keep
    /// the others open; the first failure is returned.
    ///
    fn close(&mut self) -> OpResult<()> {
        let sinks = match self.sinks.take() {
            Some(sinks) => sinks,
            None => return Ok(()),
        };
        let mut result = Ok(());
        for (record_set, mut sink) in RecordSet::ALL.iter().copied().zip(sinks) {
            if let Err(source) = sink.flush() {
                warn!("failed to flush {}: {}", record_set, source);
                if result.is_ok() {
                    result = Err(OpError::Flush { record_set, source });
                }
            }
        }
        result
    }
}

impl Drop for CsvDumpWriter {
    fn drop(&mut self) {
        if self.is_open() {
            debug!("closing csv sinks on drop");
            // failures are already logged by close
            let _ = self.close();
        }
    }
}

/// Render `fields` as one `\n` terminated row into `line`.
fn format_row(line: &mut String, fields: &[Field]) {
    line.clear();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        match field {
            Field::Text(s) => push_escaped(line, s),
            other => line.push_str(&other.to_string()),
        }
    }
    line.push('\n');
}

/// Quote a value holding a delimiter, quote or line break.
fn push_escaped(line: &mut String, value: &str) {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        line.push('"');
        line.push_str(&value.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(value);
    }
}
