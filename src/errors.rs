//!
//! Error types shared by the writers and the export driver.
//!
//! Every failure that happens while a record-set is being touched carries
//! that record-set, so a caller can tell which file or table broke.
//!

use crate::writer::schema::RecordSet;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type OpResult<T> = Result<T, OpError>;

/// Boxed error coming from a relational store implementation.
pub type StoreError = Box<dyn StdError + Send + Sync + 'static>;

/// The store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    CreateTable,
    Insert,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreOp::CreateTable => write!(f, "create table"),
            StoreOp::Insert => write!(f, "insert"),
        }
    }
}

#[derive(Error, Debug)]
pub enum OpError {
    /// Output directory could not be created
    #[error("cannot create output directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    /// Header record could not be written
    #[error("cannot write header for '{record_set}' at '{path}': {source}")]
    Header {
        record_set: RecordSet,
        path: PathBuf,
        source: io::Error,
    },

    /// Data sink could not be opened
    #[error("cannot open sink for '{record_set}' at '{path}': {source}")]
    Open {
        record_set: RecordSet,
        path: PathBuf,
        source: io::Error,
    },

    #[error("writer sinks are already open")]
    AlreadyOpen,

    #[error("writer sinks are not open")]
    NotOpen,

    /// A single row append failed
    #[error("cannot append to '{record_set}': {source}")]
    Append {
        record_set: RecordSet,
        source: io::Error,
    },

    /// Buffered rows could not be flushed on close
    #[error("cannot flush '{record_set}': {source}")]
    Flush {
        record_set: RecordSet,
        source: io::Error,
    },

    /// Error raised by the relational store, kept as is
    #[error("store {operation} on '{record_set}' failed: {source}")]
    Store {
        record_set: RecordSet,
        operation: StoreOp,
        source: StoreError,
    },

    /// Two outputs of one block map to the same composite key
    #[error("composite output key '{key}' emitted twice in one block")]
    KeyCollision { key: String },

    /// Post-processing of an exported file failed
    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid script hex: {0}")]
    Hex(#[from] bitcoin::hashes::hex::Error),
}

impl OpError {
    /// The record-set this error is attached to, if any.
    pub fn record_set(&self) -> Option<RecordSet> {
        match self {
            OpError::Header { record_set, .. }
            | OpError::Open { record_set, .. }
            | OpError::Append { record_set, .. }
            | OpError::Flush { record_set, .. }
            | OpError::Store { record_set, .. } => Some(*record_set),
            _ => None,
        }
    }
}
