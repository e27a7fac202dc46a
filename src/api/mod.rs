//!
//! Crates APIs, essential structs, functions, methods are all here!
//!
//! A writer is created once per export run, fed every block in chain
//! order through `write`, and closed at the end. `write_blocks` does all
//! three for any writer; `export_csv` additionally post-processes the
//! csv files the way the graph import expects.
//!
//! # Example
//!
//! ```rust
//! use bitcoin_graph_export::{BlockWriter, CsvDumpOptions, CsvDumpWriter, SBlock};
//!
//! let blocks: Vec<SBlock> = Vec::new();
//!
//! let mut writer = CsvDumpWriter::new("blocks_0_100", CsvDumpOptions::default()).unwrap();
//! writer.open().unwrap();
//! for block in &blocks {
//!     writer.write(block).unwrap();
//! }
//! writer.close().unwrap();
//! ```
//!

pub mod export;
pub mod sort;

// re-exports
pub use crate::api::export::{export_csv, export_db, write_blocks, ExportConfig};
pub use crate::api::sort::{sort_unique, sort_unique_in_runs};
pub use crate::errors::{OpError, OpResult, StoreError, StoreOp};
pub use crate::parser::proto::simple_proto::{SBlock, SBlockHeader, STransaction, STxIn, STxOut};
pub use crate::parser::script::{evaluate_script, ScriptInfo, ScriptType};
pub use crate::writer::csv::{CsvDumpOptions, CsvDumpWriter};
pub use crate::writer::db::{DbDumpOptions, DbDumpWriter, InsertStatement, OnConflict, RelationalStore};
pub use crate::writer::key::{composite_key, split_key, KEY_SEPARATOR};
pub use crate::writer::schema::{AttrType, Attribute, RecordKind, RecordSchema, RecordSet, Role};
pub use crate::writer::{BlockWriter, Field};
pub use bitcoin::hashes::hex::FromHex;
pub use bitcoin::{Address, Block, Network, Script};

///
/// Extract script type and addresses from a hex encoded script public key.
///
#[inline]
pub fn parse_script(script_pub_key: &str) -> OpResult<ScriptInfo> {
    let script = Script::from_hex(script_pub_key)?;
    Ok(evaluate_script(&script, Network::Bitcoin))
}
