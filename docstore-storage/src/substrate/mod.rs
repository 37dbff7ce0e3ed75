//! DDL generation: turning a `docstore_core::TableSchema` into the SQLite
//! tables that back it (the record table, its posting-list table for
//! searchable fields, and its vector table when the schema declares one),
//! plus the global metadata tables every database carries regardless of
//! user schema.

pub mod ddl;
pub mod meta;

pub use ddl::TableDdl;
