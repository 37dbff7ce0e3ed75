use docstore_core::column::ColumnType;
use docstore_core::schema::{ColumnDef, Schema, TableSchema};

#[test]
fn default_primary_key_is_id() {
    let table = TableSchema::new("messages").column(ColumnDef::new("message", ColumnType::String));
    assert_eq!(table.primary_key, "id");
}

#[test]
fn searchable_fields_default_to_all_strings() {
    let table = TableSchema::new("messages")
        .column(ColumnDef::new("message", ColumnType::String))
        .column(ColumnDef::new("user_id", ColumnType::Number))
        .column(ColumnDef::new("title", ColumnType::String));

    let mut fields = table.effective_searchable_fields();
    fields.sort();
    assert_eq!(fields, vec!["message".to_string(), "title".to_string()]);
}

#[test]
fn explicit_searchable_fields_override_default() {
    let table = TableSchema::new("messages")
        .column(ColumnDef::new("message", ColumnType::String))
        .column(ColumnDef::new("title", ColumnType::String))
        .searchable("title");

    assert_eq!(table.effective_searchable_fields(), vec!["title".to_string()]);
}

#[test]
fn schema_holds_multiple_tables_by_name() {
    let schema = Schema::new()
        .table(TableSchema::new("messages"))
        .table(TableSchema::new("users"));

    let mut names = schema.table_names();
    names.sort();
    assert_eq!(names, vec!["messages".to_string(), "users".to_string()]);
}
