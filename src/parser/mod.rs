//!
//! This module turns blocks decoded by rust-bitcoin into the simple
//! structs the writers consume.
//!

/// classify output scripts and decode their addresses
pub mod script;

/// the block, transaction and output structs handed to writers
pub mod proto;
