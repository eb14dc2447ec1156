//! Foreign keys.
//!
//! A foreign key starts empty, accumulates local columns checked against the
//! parent table, and is handed to the parent with
//! [`ForeignKey::set_referenced_table`]. At that point the parent's FK set
//! grows by one, but the referenced table stays unresolved until the score
//! runs reference resolution, which also requires the referenced column list
//! to be exactly the referenced table's primary key.

use celesta_error::{CelestaError, CelestaResult};

use crate::ident::validate_identifier;
use crate::table::Table;

/// A foreign key of one parent table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    constraint_name: Option<String>,
    parent_table: String,
    columns: Vec<String>,
    referenced_grain: String,
    referenced_table: String,
    referenced_columns: Vec<String>,
    resolved: bool,
}

impl ForeignKey {
    /// A foreign key under construction, not yet attached to its parent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constraint_name: None,
            parent_table: String::new(),
            columns: Vec::new(),
            referenced_grain: String::new(),
            referenced_table: String::new(),
            referenced_columns: Vec::new(),
            resolved: false,
        }
    }

    /// Set an explicit constraint name; otherwise one is synthesized when
    /// the key is attached to its parent.
    pub fn set_constraint_name(&mut self, name: &str) -> CelestaResult<()> {
        validate_identifier(name)?;
        self.constraint_name = Some(name.to_owned());
        Ok(())
    }

    /// Append a local column by name. The column must exist on the parent
    /// table and must not repeat.
    pub fn add_column(&mut self, parent: &Table, column_name: &str) -> CelestaResult<()> {
        if !parent.has_column(column_name) {
            return Err(CelestaError::UnknownColumn {
                element: parent.name().to_owned(),
                column: column_name.to_owned(),
            });
        }
        if self.columns.iter().any(|c| c == column_name) {
            return Err(CelestaError::DuplicateColumn {
                element: format!("foreign key on {}", parent.name()),
                column: column_name.to_owned(),
            });
        }
        self.columns.push(column_name.to_owned());
        Ok(())
    }

    /// Append a referenced column by name, in primary-key order.
    pub fn add_referenced_column(&mut self, column_name: &str) -> CelestaResult<()> {
        validate_identifier(column_name)?;
        if self.referenced_columns.iter().any(|c| c == column_name) {
            return Err(CelestaError::DuplicateColumn {
                element: format!("referenced columns of fk to {}", self.referenced_table),
                column: column_name.to_owned(),
            });
        }
        self.referenced_columns.push(column_name.to_owned());
        Ok(())
    }

    /// Name the referenced table and register this key with its parent.
    ///
    /// An empty `grain_name` means the parent's own grain. The referenced
    /// table is deliberately left unresolved here; resolution happens later
    /// over the whole score.
    pub fn set_referenced_table(
        mut self,
        parent: &mut Table,
        grain_name: &str,
        table_name: &str,
    ) -> CelestaResult<()> {
        validate_identifier(table_name)?;
        self.referenced_grain = if grain_name.is_empty() {
            parent.grain_name().to_owned()
        } else {
            validate_identifier(grain_name)?;
            grain_name.to_owned()
        };
        self.referenced_table = table_name.to_owned();
        self.parent_table = parent.name().to_owned();
        if self.constraint_name.is_none() {
            self.constraint_name = Some(format!(
                "fk_{}_{}",
                parent.name(),
                parent.foreign_keys().len() + 1
            ));
        }
        parent.push_foreign_key(self)
    }

    /// The constraint name; synthesized at attachment if not set explicitly.
    #[must_use]
    pub fn constraint_name(&self) -> &str {
        self.constraint_name.as_deref().unwrap_or("")
    }

    /// The parent table name; empty until the key is attached.
    #[must_use]
    pub fn parent_table(&self) -> &str {
        &self.parent_table
    }

    /// Local columns, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Referenced columns, in declaration order.
    #[must_use]
    pub fn referenced_columns(&self) -> &[String] {
        &self.referenced_columns
    }

    /// The declared `(grain, table)` target, whether or not it resolved yet.
    #[must_use]
    pub fn declared_target(&self) -> (&str, &str) {
        (&self.referenced_grain, &self.referenced_table)
    }

    /// The resolved referenced table, or `None` before resolution.
    #[must_use]
    pub fn referenced_table(&self) -> Option<(&str, &str)> {
        if self.resolved {
            Some((&self.referenced_grain, &self.referenced_table))
        } else {
            None
        }
    }

    /// Check this key against the referenced table's column set and primary
    /// key, and mark it resolved. Idempotent.
    pub(crate) fn resolve(
        &mut self,
        target_columns: &[String],
        target_pk: &[String],
    ) -> CelestaResult<()> {
        for c in &self.referenced_columns {
            if !target_columns.contains(c) {
                return Err(CelestaError::UnknownColumn {
                    element: self.referenced_table.clone(),
                    column: c.clone(),
                });
            }
        }
        if self.referenced_columns != target_pk {
            return Err(CelestaError::FkReferencedColumnsNotPk {
                table: self.parent_table.clone(),
                referenced_table: self.referenced_table.clone(),
            });
        }
        self.resolved = true;
        Ok(())
    }
}

impl Default for ForeignKey {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    fn parent() -> Table {
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::identity("ida").unwrap()).unwrap();
        t.add_pk("ida").unwrap();
        t.finalize_pk().unwrap();
        t.add_column(Column::integer("intcol").unwrap()).unwrap();
        t.add_column(Column::datetime("datecol").unwrap()).unwrap();
        t
    }

    #[test]
    fn test_fails_on_unknown_column() {
        let t1 = parent();
        let mut fk = ForeignKey::new();
        assert!(matches!(
            fk.add_column(&t1, "abracadabra"),
            Err(CelestaError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_fails_on_duplicated_column() {
        let t1 = parent();
        let mut fk = ForeignKey::new();
        fk.add_column(&t1, "intcol").unwrap();
        assert!(matches!(
            fk.add_column(&t1, "intcol"),
            Err(CelestaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_set_referenced_table_registers_without_resolving() {
        for grain_name in ["", "g"] {
            let mut t1 = parent();
            let mut fk = ForeignKey::new();
            fk.add_column(&t1, "intcol").unwrap();
            fk.set_referenced_table(&mut t1, grain_name, "t2").unwrap();

            assert_eq!(t1.foreign_keys().len(), 1);
            let attached = &t1.foreign_keys()[0];
            assert_eq!(attached.columns(), ["intcol"]);
            assert_eq!(attached.declared_target(), ("g", "t2"));
            assert_eq!(attached.referenced_table(), None);
        }
    }

    #[test]
    fn test_constraint_name_synthesized() {
        let mut t1 = parent();
        let mut fk = ForeignKey::new();
        fk.add_column(&t1, "intcol").unwrap();
        fk.set_referenced_table(&mut t1, "", "t2").unwrap();
        assert_eq!(t1.foreign_keys()[0].constraint_name(), "fk_t1_1");
    }

    #[test]
    fn test_resolve_requires_pk_match() {
        let mut fk = ForeignKey::new();
        let t1 = parent();
        fk.add_column(&t1, "intcol").unwrap();
        fk.referenced_table = "t2".to_owned();
        fk.parent_table = "t1".to_owned();

        let columns = vec!["idb".to_owned(), "intcol".to_owned()];
        let pk = vec!["idb".to_owned()];

        // No referenced columns at all.
        assert!(matches!(
            fk.resolve(&columns, &pk),
            Err(CelestaError::FkReferencedColumnsNotPk { .. })
        ));

        // Existing but non-PK referenced column.
        fk.add_referenced_column("intcol").unwrap();
        assert!(matches!(
            fk.resolve(&columns, &pk),
            Err(CelestaError::FkReferencedColumnsNotPk { .. })
        ));

        // Nonexistent referenced column.
        let mut fk2 = ForeignKey::new();
        fk2.add_referenced_column("blahblah").unwrap();
        assert!(matches!(
            fk2.resolve(&columns, &pk),
            Err(CelestaError::UnknownColumn { .. })
        ));

        // The primary key itself, in order.
        let mut fk3 = ForeignKey::new();
        fk3.add_referenced_column("idb").unwrap();
        fk3.resolve(&columns, &pk).unwrap();
        assert!(fk3.resolved);
        // Idempotent.
        fk3.resolve(&columns, &pk).unwrap();
    }
}
