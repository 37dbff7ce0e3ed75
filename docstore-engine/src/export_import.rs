//! `export({tables?})` / `import(data, mode)`: whole-table snapshot and
//! restore, keyed by table name, each record a flat map with its
//! primary-key field populated alongside the rest.

use std::collections::BTreeMap;

use docstore_core::errors::DocstoreResult;
use docstore_core::record::{Record, Value};

use crate::Engine;

/// `data` shape both `export` and `import` agree on: table name -> every
/// record in it, primary key included as a regular field.
pub type ExportData = BTreeMap<String, Vec<Record>>;

/// How `import` reconciles incoming records against what a table already
/// holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Upsert every incoming record; records already present (by primary
    /// key) are overwritten, everything else is left alone.
    Merge,
    /// Delete every existing record in the table first, then insert the
    /// incoming set.
    Replace,
}

impl Engine {
    /// Snapshot `tables` (or every table, if `None`) as flat records with
    /// the primary key folded back in as an ordinary field.
    pub fn export(&self, tables: Option<&[String]>) -> DocstoreResult<ExportData> {
        let names = match tables {
            Some(names) => names.to_vec(),
            None => self.table_names(),
        };

        let mut out = ExportData::new();
        for name in names {
            let schema = self.active_storage().schema_for(&name)?;
            let rows = self.get_all(&name, None)?;
            let records = rows
                .into_iter()
                .map(|stored| {
                    let mut fields = stored.fields;
                    fields.insert(schema.primary_key.clone(), Value::Number(stored.id as f64));
                    fields
                })
                .collect();
            out.insert(name, records);
        }
        Ok(out)
    }

    /// Restore `data` into this engine. `Replace` clears each named table
    /// before inserting; `Merge` upserts on top of whatever is already
    /// there. The lexical posting lists and raw vector table are kept
    /// current incrementally, one write at a time, by the same path a
    /// direct `insert`/`upsert` call takes; the ANN structures built over
    /// them (IVF centroids, the HNSW graph) are batch artifacts, so each
    /// affected table's vector index is rebuilt once import finishes
    /// rather than once per inserted record.
    pub fn import(&self, data: ExportData, mode: ImportMode) -> DocstoreResult<()> {
        for (table, records) in data {
            if mode == ImportMode::Replace {
                let existing = self.get_all(&table, None)?;
                for stored in existing {
                    self.delete(&table, stored.id)?;
                }
            }

            for record in records {
                self.upsert(&table, record)?;
            }

            let schema = self.active_storage().schema_for(&table)?;
            if schema.vector.is_some() {
                self.0.vector_index_cache.force_build(self.active_storage(), &schema, &self.0.config.vector)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::schema::{ColumnDef, Schema, TableSchema};

    fn engine() -> Engine {
        let schema = Schema::new().table(
            TableSchema::new("notes")
                .column(ColumnDef::new("body", ColumnType::String))
                .searchable("body"),
        );
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    fn record(body: &str) -> Record {
        let mut r = Record::new();
        r.insert("body".into(), Value::Text(body.into()));
        r
    }

    #[test]
    fn export_includes_the_primary_key_as_a_field() {
        let engine = engine();
        let id = engine.insert("notes", record("hello")).unwrap();
        let data = engine.export(None).unwrap();
        let row = &data["notes"][0];
        assert_eq!(row.get("id"), Some(&Value::Number(id as f64)));
    }

    #[test]
    fn merge_import_upserts_without_touching_other_records() {
        let engine = engine();
        engine.insert("notes", record("kept")).unwrap();

        let mut incoming = ExportData::new();
        incoming.insert("notes".to_string(), vec![record("new")]);
        engine.import(incoming, ImportMode::Merge).unwrap();

        let all = engine.get_all("notes", None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn replace_import_clears_the_table_first() {
        let engine = engine();
        engine.insert("notes", record("old")).unwrap();

        let mut incoming = ExportData::new();
        incoming.insert("notes".to_string(), vec![record("new")]);
        engine.import(incoming, ImportMode::Replace).unwrap();

        let all = engine.get_all("notes", None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields.get("body"), Some(&Value::Text("new".into())));
    }

    #[test]
    fn round_trip_export_then_replace_import_preserves_content() {
        let engine = engine();
        engine.insert("notes", record("a")).unwrap();
        engine.insert("notes", record("b")).unwrap();

        let data = engine.export(None).unwrap();
        engine.import(data, ImportMode::Replace).unwrap();

        let all = engine.get_all("notes", None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
