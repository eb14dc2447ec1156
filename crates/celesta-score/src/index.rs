//! Secondary indices.

use celesta_error::{CelestaError, CelestaResult};

use crate::ident::validate_identifier;
use crate::table::Table;

/// An index over an ordered list of columns of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    grain_name: String,
    name: String,
    table_name: String,
    columns: Vec<String>,
}

impl Index {
    pub fn new(grain_name: &str, name: &str, table_name: &str) -> CelestaResult<Self> {
        validate_identifier(grain_name)?;
        validate_identifier(name)?;
        validate_identifier(table_name)?;
        Ok(Self {
            grain_name: grain_name.to_owned(),
            name: name.to_owned(),
            table_name: table_name.to_owned(),
            columns: Vec::new(),
        })
    }

    /// Append a column, checked against the indexed table.
    pub fn add_column(&mut self, table: &Table, column_name: &str) -> CelestaResult<()> {
        if !table.has_column(column_name) {
            return Err(CelestaError::UnknownColumn {
                element: self.table_name.clone(),
                column: column_name.to_owned(),
            });
        }
        if self.columns.iter().any(|c| c == column_name) {
            return Err(CelestaError::DuplicateColumn {
                element: self.name.clone(),
                column: column_name.to_owned(),
            });
        }
        self.columns.push(column_name.to_owned());
        Ok(())
    }

    #[must_use]
    pub fn grain_name(&self) -> &str {
        &self.grain_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Indexed columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}
