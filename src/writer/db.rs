//!
//! Relational writer inserting every record as one row.
//!
//! Tables mirror the record-sets of the csv export. Entity tables carry a
//! primary key on their identifier column, relationship tables carry no
//! constraint so repeated edges are kept. Each insert stands alone: no
//! transaction spans a block, so readers may see half of a block.
//!

use crate::errors::{OpError, OpResult, StoreOp};
use crate::parser::proto::simple_proto::SBlock;
use crate::writer::schema::{AttrType, RecordSchema, RecordSet, Role};
use crate::writer::{emit_block, BlockWriter, Field};
use log::{debug, info};
use serde::Deserialize;
use std::error::Error as StdError;

///
/// What an entity insert does when its identifier already exists.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Surface the constraint violation as a store error
    #[default]
    Fail,
    /// Keep the existing row
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DbDumpOptions {
    pub on_conflict: OnConflict,
}

///
/// A relational store able to create the export tables and insert rows.
///
/// Errors are handed back to the caller unchanged, wrapped only with the
/// record-set and operation that failed.
///
pub trait RelationalStore {
    type Error: StdError + Send + Sync + 'static;

    /// Create the table of `schema` unless it exists.
    fn create_table(&mut self, schema: &RecordSchema) -> Result<(), Self::Error>;

    /// Run `statement` on one row, fields in schema column order.
    fn insert(&mut self, statement: &InsertStatement, row: &[Field]) -> Result<(), Self::Error>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for &mut S {
    type Error = S::Error;

    fn create_table(&mut self, schema: &RecordSchema) -> Result<(), Self::Error> {
        (**self).create_table(schema)
    }

    fn insert(&mut self, statement: &InsertStatement, row: &[Field]) -> Result<(), Self::Error> {
        (**self).insert(statement, row)
    }
}

///
/// Insert of one record-set under a conflict policy, rendered once per writer.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub record_set: RecordSet,
    pub on_conflict: OnConflict,
    pub sql: String,
}

impl InsertStatement {
    pub fn new(record_set: RecordSet, on_conflict: OnConflict) -> Self {
        InsertStatement {
            record_set,
            on_conflict,
            sql: insert_sql(record_set.schema(), on_conflict),
        }
    }
}

fn sql_type(attr_type: AttrType) -> &'static str {
    match attr_type {
        AttrType::Identifier | AttrType::String => "TEXT",
        AttrType::Integer | AttrType::Boolean => "INTEGER",
        AttrType::Decimal => "REAL",
    }
}

///
/// `CREATE TABLE IF NOT EXISTS` statement for `schema`.
///
pub fn create_table_sql(schema: &RecordSchema) -> String {
    let columns: Vec<String> = schema
        .attributes
        .iter()
        .map(|a| {
            let primary_key = if let Role::Id(_) = a.role {
                " PRIMARY KEY"
            } else {
                ""
            };
            format!("\"{}\" {}{}", a.name, sql_type(a.attr_type), primary_key)
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
        schema.name,
        columns.join(", ")
    )
}

///
/// Parameterised insert for `schema`, `?1 .. ?n` in column order.
///
pub fn insert_sql(schema: &RecordSchema, on_conflict: OnConflict) -> String {
    let verb = match on_conflict {
        OnConflict::Fail => "INSERT",
        OnConflict::Ignore => "INSERT OR IGNORE",
    };
    let columns: Vec<String> = schema
        .attributes
        .iter()
        .map(|a| format!("\"{}\"", a.name))
        .collect();
    let params: Vec<String> = (1..=schema.attributes.len())
        .map(|i| format!("?{}", i))
        .collect();
    format!(
        "{} INTO \"{}\" ({}) VALUES ({})",
        verb,
        schema.name,
        columns.join(", "),
        params.join(", ")
    )
}

pub struct DbDumpWriter<S: RelationalStore> {
    store: S,
    options: DbDumpOptions,
    /// One statement per record-set, indexed by `RecordSet::index`
    inserts: Vec<InsertStatement>,
}

impl<S: RelationalStore> DbDumpWriter<S> {
    pub fn new(store: S) -> OpResult<DbDumpWriter<S>> {
        DbDumpWriter::with_options(store, DbDumpOptions::default())
    }

    ///
    /// Create every export table in `store` and render the inserts.
    ///
    /// Only entity inserts follow `options.on_conflict`.
    ///
    pub fn with_options(mut store: S, options: DbDumpOptions) -> OpResult<DbDumpWriter<S>> {
        for record_set in RecordSet::ALL.iter().copied() {
            store
                .create_table(record_set.schema())
                .map_err(|e| OpError::Store {
                    record_set,
                    operation: StoreOp::CreateTable,
                    source: Box::new(e),
                })?;
        }
        info!(
            "relational export ready, {} tables (on conflict: {:?})",
            RecordSet::ALL.len(),
            options.on_conflict
        );
        let inserts = RecordSet::ALL
            .iter()
            .map(|record_set| {
                let on_conflict = if record_set.is_entity() {
                    options.on_conflict
                } else {
                    OnConflict::Fail
                };
                InsertStatement::new(*record_set, on_conflict)
            })
            .collect();
        Ok(DbDumpWriter {
            store,
            options,
            inserts,
        })
    }

    pub fn options(&self) -> DbDumpOptions {
        self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: RelationalStore> BlockWriter for DbDumpWriter<S> {
    /// The store owns its connection lifecycle.
    fn open(&mut self) -> OpResult<()> {
        Ok(())
    }

    fn write(&mut self, block: &SBlock) -> OpResult<()> {
        let store = &mut self.store;
        let inserts = &self.inserts;
        debug!("inserting block {} ({})", block.header.height, block.header.block_hash);
        emit_block(block, |record_set, fields| {
            store
                .insert(&inserts[record_set.index()], fields)
                .map_err(|e| OpError::Store {
                    record_set,
                    operation: StoreOp::Insert,
                    source: Box::new(e),
                })
        })
    }

    fn close(&mut self) -> OpResult<()> {
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::{create_table_sql, InsertStatement, RelationalStore};
    use crate::writer::schema::RecordSchema;
    use crate::writer::Field;
    use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
    use rusqlite::{params_from_iter, Connection};

    impl ToSql for Field<'_> {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(match *self {
                Field::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
                Field::Integer(i) => ToSqlOutput::Owned(Value::Integer(i)),
                Field::Decimal(d) => ToSqlOutput::Owned(Value::Real(d)),
                Field::Boolean(b) => ToSqlOutput::Owned(Value::Integer(b as i64)),
            })
        }
    }

    impl RelationalStore for Connection {
        type Error = rusqlite::Error;

        fn create_table(&mut self, schema: &RecordSchema) -> rusqlite::Result<()> {
            self.execute_batch(&create_table_sql(schema))
        }

        fn insert(&mut self, statement: &InsertStatement, row: &[Field]) -> rusqlite::Result<()> {
            let mut prepared = self.prepare_cached(&statement.sql)?;
            prepared.execute(params_from_iter(row.iter()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::tests::coinbase_block;
    use std::io;

    /// Records statements, fails on demand.
    #[derive(Default)]
    struct ScriptedStore {
        tables: Vec<&'static str>,
        rows: Vec<(&'static str, Vec<String>, OnConflict)>,
        fail_create: Option<&'static str>,
        fail_insert_after: Option<usize>,
    }

    impl RelationalStore for ScriptedStore {
        type Error = io::Error;

        fn create_table(&mut self, schema: &RecordSchema) -> Result<(), io::Error> {
            if self.fail_create == Some(schema.name) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.tables.push(schema.name);
            Ok(())
        }

        fn insert(&mut self, statement: &InsertStatement, row: &[Field]) -> Result<(), io::Error> {
            if self.fail_insert_after == Some(self.rows.len()) {
                return Err(io::Error::new(io::ErrorKind::Other, "connection lost"));
            }
            let row = row.iter().map(|f| f.to_string()).collect();
            self.rows.push((statement.record_set.name(), row, statement.on_conflict));
            Ok(())
        }
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(RecordSet::Blocks.schema()),
            "CREATE TABLE IF NOT EXISTS \"blocks\" (\"hash\" TEXT PRIMARY KEY, \"height\" INTEGER, \"timestamp\" INTEGER)"
        );
        assert_eq!(
            create_table_sql(RecordSet::RelInput.schema()),
            "CREATE TABLE IF NOT EXISTS \"rel_input\" (\"txid\" TEXT, \"txid_n\" TEXT)"
        );
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql(RecordSet::Outputs.schema(), OnConflict::Fail),
            "INSERT INTO \"outputs\" (\"txid_n\", \"n\", \"value\", \"type\") VALUES (?1, ?2, ?3, ?4)"
        );
        assert_eq!(
            insert_sql(RecordSet::Addresses.schema(), OnConflict::Ignore),
            "INSERT OR IGNORE INTO \"addresses\" (\"address\") VALUES (?1)"
        );
    }

    #[test]
    fn test_inserts_rendered_once() {
        let options = DbDumpOptions {
            on_conflict: OnConflict::Ignore,
        };
        let writer = DbDumpWriter::with_options(ScriptedStore::default(), options).unwrap();
        assert_eq!(writer.inserts.len(), RecordSet::ALL.len());
        for (record_set, statement) in RecordSet::ALL.iter().zip(&writer.inserts) {
            let expected = if record_set.is_entity() {
                OnConflict::Ignore
            } else {
                OnConflict::Fail
            };
            assert_eq!(*statement, InsertStatement::new(*record_set, expected));
        }
        assert_eq!(
            writer.inserts[RecordSet::Addresses.index()].sql,
            "INSERT OR IGNORE INTO \"addresses\" (\"address\") VALUES (?1)"
        );
        assert_eq!(
            writer.inserts[RecordSet::RelInput.index()].sql,
            "INSERT INTO \"rel_input\" (\"txid\", \"txid_n\") VALUES (?1, ?2)"
        );
    }

    #[test]
    fn test_tables_created_in_schema_order() {
        let writer = DbDumpWriter::new(ScriptedStore::default()).unwrap();
        let names: Vec<&str> = RecordSet::ALL.iter().map(|r| r.name()).collect();
        assert_eq!(writer.store().tables, names);
    }

    #[test]
    fn test_create_failure_is_fatal() {
        let store = ScriptedStore {
            fail_create: Some("outputs"),
            ..Default::default()
        };
        match DbDumpWriter::new(store) {
            Err(OpError::Store {
                record_set,
                operation,
                ..
            }) => {
                assert_eq!(record_set, RecordSet::Outputs);
                assert_eq!(operation, StoreOp::CreateTable);
            }
            _ => panic!("expected create table failure"),
        }
    }

    #[test]
    fn test_same_records_as_csv() {
        let options = DbDumpOptions {
            on_conflict: OnConflict::Ignore,
        };
        let mut writer = DbDumpWriter::with_options(ScriptedStore::default(), options).unwrap();
        writer.open().unwrap();
        writer.write(&coinbase_block()).unwrap();
        writer.close().unwrap();

        let rows = &writer.store().rows;
        let flat: Vec<(&str, String)> = rows
            .iter()
            .map(|(table, row, _)| (*table, row.join(",")))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("blocks", "B1,1,1231469665".to_owned()),
                ("transactions", "T1,true".to_owned()),
                ("rel_block_tx", "B1,T1".to_owned()),
                ("outputs", "T1_0,0,5.0,p2pkh".to_owned()),
                ("rel_tx_output", "T1,T1_0".to_owned()),
                ("addresses", "A1".to_owned()),
                ("rel_output_address", "T1_0,A1".to_owned()),
            ]
        );
        // only entity inserts use the conflict policy
        for (table, _, on_conflict) in rows {
            let expected = if table.starts_with("rel_") {
                OnConflict::Fail
            } else {
                OnConflict::Ignore
            };
            assert_eq!(*on_conflict, expected, "{}", table);
        }
    }

    #[test]
    fn test_insert_failure_keeps_earlier_rows() {
        let store = ScriptedStore {
            fail_insert_after: Some(3),
            ..Default::default()
        };
        let mut writer = DbDumpWriter::new(store).unwrap();
        match writer.write(&coinbase_block()) {
            Err(err @ OpError::Store { .. }) => {
                assert_eq!(err.record_set(), Some(RecordSet::Outputs));
                assert!(err.to_string().contains("connection lost"));
            }
            _ => panic!("expected insert failure"),
        }
        assert_eq!(writer.into_inner().rows.len(), 3);
    }

    #[test]
    fn test_options_from_json() {
        let options: DbDumpOptions = serde_json::from_str(r#"{"on_conflict": "ignore"}"#).unwrap();
        assert_eq!(options.on_conflict, OnConflict::Ignore);
        let options: DbDumpOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.on_conflict, OnConflict::Fail);
    }
}
