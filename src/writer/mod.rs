//!
//! Writers persisting blocks as entity and relationship records.
//!
//! Two backends share one lifecycle (`open`, `write`, `close`) and one
//! traversal of a block, so they emit the same logical records:
//! - `CsvDumpWriter`: one delimited file per record-set, for a bulk graph import
//! - `DbDumpWriter`: one table per record-set in a relational store
//!

/// one delimited file per record-set
pub mod csv;

/// one table per record-set in a relational store
pub mod db;

/// composite output keys
pub mod key;

/// entity and relationship record-sets
pub mod schema;

use crate::errors::{OpError, OpResult};
use crate::parser::proto::simple_proto::SBlock;
use crate::writer::key::{composite_key, split_key};
use crate::writer::schema::RecordSet;
use ahash::AHashSet;
use std::fmt;

///
/// Common lifecycle of every writer.
///
/// `open` acquires the output resources, `write` is called once per block
/// in chain order, `close` releases everything that is still held.
/// Calls on one writer must not interleave.
///
pub trait BlockWriter {
    fn open(&mut self) -> OpResult<()>;

    ///
    /// Emit every record reachable from `block`.
    ///
    /// Records already emitted when an error occurs stay emitted.
    ///
    fn write(&mut self, block: &SBlock) -> OpResult<()>;

    fn close(&mut self) -> OpResult<()>;
}

///
/// One attribute value of an emitted record.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Text(&'a str),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
}

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Field::Text(s) => f.write_str(s),
            Field::Integer(i) => write!(f, "{}", i),
            // whole amounts keep one fractional digit, never an exponent
            Field::Decimal(d) if d.is_finite() && d.fract() == 0.0 => write!(f, "{:.1}", d),
            Field::Decimal(d) => write!(f, "{}", d),
            Field::Boolean(b) => write!(f, "{}", b),
        }
    }
}

///
/// Walk `block` and hand each record to `emit`, in this order:
///
/// block; then per transaction: transaction, block->transaction,
/// one input record per spent outpoint (none for coinbase); then per
/// output: output, transaction->output, and per address: address,
/// output->address.
///
/// Entities are emitted before the relationships pointing at them.
/// Fails with `KeyCollision` before emitting an output whose composite key
/// was already emitted for this block.
///
pub(crate) fn emit_block<F>(block: &SBlock, mut emit: F) -> OpResult<()>
where
    F: FnMut(RecordSet, &[Field]) -> OpResult<()>,
{
    let hash = block.header.block_hash.as_str();
    emit(
        RecordSet::Blocks,
        &[
            Field::Text(hash),
            Field::Integer(block.header.height as i64),
            Field::Integer(block.header.time as i64),
        ],
    )?;

    let mut output_keys = AHashSet::new();
    for tx in &block.txdata {
        let txid = tx.txid.as_str();
        let coinbase = tx.is_coinbase();
        emit(
            RecordSet::Transactions,
            &[Field::Text(txid), Field::Boolean(coinbase)],
        )?;
        emit(RecordSet::RelBlockTx, &[Field::Text(hash), Field::Text(txid)])?;

        if !coinbase {
            for input in &tx.input {
                let spent = composite_key(&input.txid, input.vout);
                emit(RecordSet::RelInput, &[Field::Text(txid), Field::Text(&spent)])?;
            }
        }

        for output in &tx.output {
            let key = composite_key(txid, output.index);
            debug_assert_eq!(split_key(&key), Some((txid, output.index)));
            if !output_keys.insert(key.clone()) {
                return Err(OpError::KeyCollision { key });
            }
            emit(
                RecordSet::Outputs,
                &[
                    Field::Text(&key),
                    Field::Integer(output.index as i64),
                    Field::Decimal(output.value),
                    Field::Text(&output.script_type),
                ],
            )?;
            emit(RecordSet::RelTxOutput, &[Field::Text(txid), Field::Text(&key)])?;
            for address in &output.addresses {
                emit(RecordSet::Addresses, &[Field::Text(address)])?;
                emit(
                    RecordSet::RelOutputAddress,
                    &[Field::Text(&key), Field::Text(address)],
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::proto::simple_proto::{SBlockHeader, STransaction, STxIn, STxOut};
    use std::collections::HashMap;

    pub(crate) fn output(index: u32, value: f64, addresses: &[&str]) -> STxOut {
        STxOut {
            index,
            value,
            script_type: "p2pkh".to_owned(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub(crate) fn block(hash: &str, height: u32, txdata: Vec<STransaction>) -> SBlock {
        SBlock {
            header: SBlockHeader {
                block_hash: hash.to_owned(),
                height,
                time: 1231469665,
            },
            txdata,
        }
    }

    pub(crate) fn tx(txid: &str, input: &[(&str, u32)], output: Vec<STxOut>) -> STransaction {
        STransaction {
            txid: txid.to_owned(),
            input: input
                .iter()
                .map(|(txid, vout)| STxIn {
                    txid: txid.to_string(),
                    vout: *vout,
                })
                .collect(),
            output,
        }
    }

    /// the end-to-end block: one coinbase paying 5 BTC to A1
    pub(crate) fn coinbase_block() -> SBlock {
        block("B1", 1, vec![tx("T1", &[], vec![output(0, 5.0, &["A1"])])])
    }

    fn collect(block: &SBlock) -> OpResult<Vec<(RecordSet, Vec<String>)>> {
        let mut records: Vec<(RecordSet, Vec<String>)> = Vec::new();
        emit_block(block, |record_set, fields| {
            records.push((record_set, fields.iter().map(|f| f.to_string()).collect()));
            Ok(())
        })?;
        Ok(records)
    }

    fn count(records: &[(RecordSet, Vec<String>)], record_set: RecordSet) -> usize {
        records.iter().filter(|(r, _)| *r == record_set).count()
    }

    #[test]
    fn test_field_display() {
        assert_eq!(Field::Decimal(5.0).to_string(), "5.0");
        assert_eq!(Field::Decimal(0.00000001).to_string(), "0.00000001");
        assert_eq!(Field::Decimal(12.5).to_string(), "12.5");
        assert_eq!(Field::Boolean(true).to_string(), "true");
        assert_eq!(Field::Integer(-3).to_string(), "-3");
    }

    #[test]
    fn test_emission_order() {
        let records = collect(&coinbase_block()).unwrap();
        let order: Vec<RecordSet> = records.iter().map(|(r, _)| *r).collect();
        assert_eq!(
            order,
            vec![
                RecordSet::Blocks,
                RecordSet::Transactions,
                RecordSet::RelBlockTx,
                RecordSet::Outputs,
                RecordSet::RelTxOutput,
                RecordSet::Addresses,
                RecordSet::RelOutputAddress,
            ]
        );
        assert_eq!(records[3].1, vec!["T1_0", "0", "5.0", "p2pkh"]);
    }

    #[test]
    fn test_inputs_only_for_non_coinbase() {
        let spending = block(
            "B2",
            2,
            vec![
                tx("C", &[], vec![output(0, 50.0, &[])]),
                tx("S1", &[("T1", 0), ("T0", 3)], vec![output(0, 1.0, &[])]),
                tx("S2", &[("S1", 0)], vec![]),
            ],
        );
        let records = collect(&spending).unwrap();
        let inputs: Vec<&Vec<String>> = records
            .iter()
            .filter(|(r, _)| *r == RecordSet::RelInput)
            .map(|(_, fields)| fields)
            .collect();
        assert_eq!(
            inputs,
            vec![
                &vec!["S1".to_owned(), "T1_0".to_owned()],
                &vec!["S1".to_owned(), "T0_3".to_owned()],
                &vec!["S2".to_owned(), "S1_0".to_owned()],
            ]
        );
    }

    #[test]
    fn test_repeated_addresses_not_deduplicated() {
        let repeated = block("B", 0, vec![tx("T", &[], vec![output(0, 1.0, &["A", "A", "B"])])]);
        let records = collect(&repeated).unwrap();
        assert_eq!(count(&records, RecordSet::Addresses), 3);
        assert_eq!(count(&records, RecordSet::RelOutputAddress), 3);
    }

    #[test]
    fn test_key_collision() {
        let dup_index = block(
            "B",
            0,
            vec![tx("T", &[], vec![output(0, 1.0, &[]), output(0, 2.0, &[])])],
        );
        match collect(&dup_index) {
            Err(OpError::KeyCollision { key }) => assert_eq!(key, "T_0"),
            other => panic!("expected key collision, got {:?}", other),
        }

        let dup_txid = block(
            "B",
            0,
            vec![
                tx("T", &[], vec![output(0, 1.0, &[])]),
                tx("T", &[], vec![output(0, 1.0, &[])]),
            ],
        );
        assert!(matches!(collect(&dup_txid), Err(OpError::KeyCollision { .. })));
    }

    #[test]
    fn test_output_keys_split_back() {
        let odd_txid = block(
            "B",
            0,
            vec![tx("T_x", &[], vec![output(0, 1.0, &[]), output(7, 2.0, &[])])],
        );
        let records = collect(&odd_txid).unwrap();
        let keys: Vec<(&str, u32)> = records
            .iter()
            .filter(|(r, _)| *r == RecordSet::Outputs)
            .map(|(_, fields)| split_key(&fields[0]).unwrap())
            .collect();
        assert_eq!(keys, vec![("T_x", 0), ("T_x", 7)]);
    }

    #[test]
    fn test_relationships_resolve_within_block() {
        let mixed = block(
            "B3",
            3,
            vec![
                tx("C", &[], vec![output(0, 50.0, &["A1"]), output(1, 0.5, &["A2", "A3"])]),
                tx("S", &[("C", 1), ("OLD", 7)], vec![output(0, 0.4, &["A1"])]),
            ],
        );
        let records = collect(&mixed).unwrap();

        let mut ids: HashMap<&str, Vec<&str>> = HashMap::new();
        for (record_set, fields) in &records {
            if record_set.is_entity() {
                let label = match record_set.schema().kind {
                    schema::RecordKind::Entity(label) => label,
                    schema::RecordKind::Relationship => unreachable!(),
                };
                ids.entry(label).or_default().push(&fields[0]);
            }
        }
        for (i, (record_set, fields)) in records.iter().enumerate() {
            if record_set.is_entity() {
                continue;
            }
            for (attribute, value) in record_set.schema().attributes.iter().zip(fields) {
                let label = match attribute.role {
                    schema::Role::Start(label) | schema::Role::End(label) => label,
                    _ => unreachable!(),
                };
                // spent outputs may come from earlier blocks
                if *record_set == RecordSet::RelInput && label == "Output" {
                    continue;
                }
                // the entity must have been emitted before the relationship
                let emitted_before = records[..i].iter().any(|(r, f)| {
                    r.is_entity() && r.schema().identifier().is_some() && f[0] == *value
                });
                assert!(ids[label].contains(&value.as_str()), "{} not emitted", value);
                assert!(emitted_before, "{} emitted after its relationship", value);
            }
        }
        assert_eq!(count(&records, RecordSet::RelInput), 2);
    }
}
