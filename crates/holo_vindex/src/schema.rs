//! Schema facts used to validate lookup configurations.
//!
//! Vindex construction does not consult the schema. Validation is a separate
//! step that callers run once the keyspace schema is known.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};

use crate::config::LookupConfig;

/// Read-only view of table and column existence.
pub trait SchemaFacts {
    fn has_table(&self, table: &str) -> bool;

    fn has_column(&self, table: &str, column: &str) -> bool;
}

/// Schema built by hand, with case-insensitive names.
#[derive(Debug, Clone, Default)]
pub struct DeclarativeSchema {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl DeclarativeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `table` with `columns`, merging into an existing entry.
    pub fn add_table<I, S>(&mut self, table: &str, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.tables.entry(table.to_ascii_lowercase()).or_default();
        for column in columns {
            entry.insert(column.as_ref().to_ascii_lowercase());
        }
        self
    }

    /// Adds one column, creating the table if needed.
    pub fn add_column(&mut self, table: &str, column: &str) -> &mut Self {
        self.add_table(table, [column])
    }
}

impl SchemaFacts for DeclarativeSchema {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_ascii_lowercase())
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(&table.to_ascii_lowercase())
            .map(|columns| columns.contains(&column.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl LookupConfig {
    /// Checks that the backing table and every from/to column exist.
    ///
    /// The keyspace qualifier is stripped: facts describe one keyspace.
    pub fn validate_against(&self, schema: &dyn SchemaFacts) -> Result<()> {
        let table = self.table_name();
        if !schema.has_table(table) {
            return Err(anyhow!("lookup table '{}' does not exist", self.table));
        }
        let missing: Vec<&str> = self
            .from_columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.to.as_str()))
            .filter(|column| !schema.has_column(table, column))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "lookup table '{}' is missing columns: {}",
                self.table,
                missing.join(", ")
            ));
        }
        Ok(())
    }
}
