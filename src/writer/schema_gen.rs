use serde::Serialize;
use tracing::{info, warn};

use super::sqlite::{quote_ident, Store};
use crate::error::SchemaError;
use crate::schema::TableSchema;

/// Outcome of preparing a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableState {
    Created,
    /// Table was present and has been truncated
    Existed,
}

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(schema.name));
    let mut columns = Vec::new();

    for col in schema.columns {
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        columns.push(format!(
            "    {} {}{}",
            quote_ident(col.name),
            col.col_type.sql_type(),
            null_constraint
        ));
    }

    columns.push(format!("    PRIMARY KEY ({})", quote_ident(schema.primary_key)));

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Make sure `schema` exists and is empty.
///
/// A missing table is created. An existing one keeps its definition and
/// loses its rows, so repeated runs never need DDL beyond the first.
pub fn ensure_table(store: &impl Store, schema: &TableSchema) -> Result<TableState, SchemaError> {
    match store.table_columns(schema.name) {
        Ok(found) => {
            if !schema.matches_columns(&found) {
                return Err(SchemaError::ColumnMismatch {
                    table: schema.name,
                    found,
                });
            }

            info!(table = schema.name, "Table exists, truncating");
            store
                .execute(&format!("DELETE FROM {}", quote_ident(schema.name)), &[])
                .map_err(|source| SchemaError::Truncate {
                    table: schema.name,
                    source,
                })?;
            Ok(TableState::Existed)
        }
        Err(probe) => {
            info!(table = schema.name, reason = %probe, "Creating table");
            store
                .execute(&generate_create_table(schema), &[])
                .map_err(|source| {
                    warn!(table = schema.name, error = %source, "CREATE TABLE failed");
                    SchemaError::Create {
                        table: schema.name,
                        source,
                    }
                })?;
            Ok(TableState::Created)
        }
    }
}
