//!
//! # Introduction
//!
//! This library exports parsed Bitcoin blocks as a graph:
//! blocks, transactions, outputs and addresses as entities,
//! and the links between them as relationships.
//!
//! Two backends write the same records:
//! - CSV files, one per record-set, ready for a bulk graph-database import
//! - tables of a relational store (SQLite with the `sqlite` feature)
//!
//! Outputs have no identifier of their own, so they are keyed by
//! `<txid>_<index>`. Inputs are written as relationships from the
//! spending transaction to that key.
//!
//! # Example
//!
//! ```rust
//! use bitcoin_graph_export::{export_csv, ExportConfig, SBlock};
//!
//! let blocks: Vec<SBlock> = Vec::new();
//!
//! let config = ExportConfig::for_range(0, 100);
//! export_csv(&config, &blocks, blocks.len(), |p| println!("{:.0}%", p * 100.0)).unwrap();
//! ```
//!

pub(crate) mod api;
pub mod errors;
pub mod parser;
pub mod writer;

#[doc(inline)]
pub use crate::api::*;
