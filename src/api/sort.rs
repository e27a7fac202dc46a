//!
//! On-disk sort of exported csv files.
//!
//! Records are read in runs of bounded size. Each run is sorted, deduplicated
//! and spilled to a sibling file, then the runs are merged into a sibling
//! output that replaces the input only once it is complete.
//!
//! A quoted field may contain line breaks, so the unit of sorting is a csv
//! record, not a line.
//!

use crate::errors::{OpError, OpResult};
use log::{debug, warn};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};

/// Bytes of records held in memory per run.
pub const RUN_BYTES: usize = 64 * 1024 * 1024;

///
/// Rewrite the csv file at `path` with its records sorted bytewise and
/// duplicate records removed.
///
/// The file is replaced by a rename, so on error it is left as it was.
///
pub fn sort_unique(path: &Path) -> OpResult<()> {
    sort_unique_in_runs(path, RUN_BYTES)
}

///
/// `sort_unique` holding at most about `run_bytes` of records in memory.
///
pub fn sort_unique_in_runs(path: &Path, run_bytes: usize) -> OpResult<()> {
    let sorted = sibling(path, "sorted");
    let mut runs = Vec::new();
    let result = sort_into(path, &sorted, run_bytes, &mut runs);
    for run in &runs {
        if let Err(e) = fs::remove_file(run) {
            warn!("cannot remove sort run {}: {}", run.display(), e);
        }
    }
    match result {
        Ok(()) => fs::rename(&sorted, path).map_err(|source| io_error(path, source)),
        Err(e) => {
            if sorted.exists() {
                let _ = fs::remove_file(&sorted);
            }
            Err(e)
        }
    }
}

fn sort_into(path: &Path, sorted: &Path, run_bytes: usize, runs: &mut Vec<PathBuf>) -> OpResult<()> {
    let input = File::open(path).map_err(|source| io_error(path, source))?;
    let mut reader = BufReader::new(input);
    let mut run = Vec::new();
    let mut run_size = 0;
    let mut record = String::new();
    while read_record(&mut reader, &mut record).map_err(|source| io_error(path, source))? {
        run_size += record.len();
        run.push(mem::take(&mut record));
        if run_size >= run_bytes {
            spill(path, &mut run, runs)?;
            run_size = 0;
        }
    }

    if runs.is_empty() {
        return write_run(sorted, &mut run);
    }
    if !run.is_empty() {
        spill(path, &mut run, runs)?;
    }
    debug!("merging {} runs of {}", runs.len(), path.display());
    merge(runs, sorted)
}

fn spill(path: &Path, run: &mut Vec<String>, runs: &mut Vec<PathBuf>) -> OpResult<()> {
    let run_path = sibling(path, &format!("run{}", runs.len()));
    // registered first, so a half written run is removed too
    runs.push(run_path.clone());
    write_run(&run_path, run)
}

/// Sort, deduplicate and write `run` to `path`, leaving `run` empty.
fn write_run(path: &Path, run: &mut Vec<String>) -> OpResult<()> {
    run.sort_unstable();
    run.dedup();
    let mut output = create(path)?;
    for record in run.drain(..) {
        write_record(&mut output, &record).map_err(|source| io_error(path, source))?;
    }
    output.flush().map_err(|source| io_error(path, source))
}

fn merge(runs: &[PathBuf], sorted: &Path) -> OpResult<()> {
    let mut readers = Vec::with_capacity(runs.len());
    let mut heads = BinaryHeap::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        let file = File::open(run).map_err(|source| io_error(run, source))?;
        let mut reader = BufReader::new(file);
        let mut record = String::new();
        if read_record(&mut reader, &mut record).map_err(|source| io_error(run, source))? {
            heads.push(Reverse((record, i)));
        }
        readers.push(reader);
    }

    let mut output = create(sorted)?;
    let mut last: Option<String> = None;
    while let Some(Reverse((record, i))) = heads.pop() {
        if last.as_ref() != Some(&record) {
            write_record(&mut output, &record).map_err(|source| io_error(sorted, source))?;
        }
        let mut next = String::new();
        if read_record(&mut readers[i], &mut next).map_err(|source| io_error(&runs[i], source))? {
            heads.push(Reverse((next, i)));
        }
        last = Some(record);
    }
    output.flush().map_err(|source| io_error(sorted, source))
}

///
/// Read the next csv record into `record`, without its line terminator.
///
/// A record ends at the first `\n` outside of quotes. Quotes inside a
/// quoted field are doubled, so an odd quote count means the record
/// continues on the next line. Returns `false` at end of input.
///
fn read_record<R: BufRead>(reader: &mut R, record: &mut String) -> io::Result<bool> {
    record.clear();
    loop {
        if reader.read_line(record)? == 0 {
            break;
        }
        if record.matches('"').count() % 2 == 0 {
            break;
        }
    }
    if record.is_empty() {
        return Ok(false);
    }
    if record.ends_with('\n') {
        record.pop();
    }
    Ok(true)
}

fn write_record<W: Write>(output: &mut W, record: &str) -> io::Result<()> {
    output.write_all(record.as_bytes())?;
    output.write_all(b"\n")
}

fn create(path: &Path) -> OpResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| io_error(path, source))
}

/// `<path>.<suffix>`, in the directory of `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}", suffix));
    path.with_file_name(name)
}

fn io_error(path: &Path, source: io::Error) -> OpError {
    OpError::Io {
        path: path.to_path_buf(),
        source,
    }
}
