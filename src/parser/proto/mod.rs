//!
//! ## Simple Block Types
//!
//! `SBlock` and its parts are what every writer consumes:
//! a block reduced to hash, height and time, transactions reduced
//! to their id, spent outpoints and outputs, and outputs carrying
//! their script type and addresses.
//!
//! They can be built from a decoded `bitcoin::Block` with
//! `SBlock::parse`, or directly by any other block source.
//!

/// simplified blockchain objects, as consumed by the writers
pub mod simple_proto;
