//! Tables and the table-like element contract.
//!
//! A [`Table`] is built in phases: columns and primary-key parts are added
//! during construction, [`Table::finalize_pk`] seals the key exactly once,
//! and reference resolution freezes the whole element. Structural mutations
//! after the corresponding phase fail with an illegal-state error.

use indexmap::IndexMap;

use celesta_error::{CelestaError, CelestaResult};

use crate::column::{Column, ColumnKind};
use crate::fk::ForeignKey;
use crate::ident::validate_identifier;

/// Name of the implicit row-version column on versioned tables.
pub const REC_VERSION: &str = "recversion";

/// Anything the DDL layer treats as a physical table: real tables and
/// materialized views.
pub trait TableElement {
    fn grain_name(&self) -> &str;
    fn name(&self) -> &str;
    /// Columns in declaration order.
    fn columns(&self) -> &IndexMap<String, Column>;
    /// Primary-key column names in key order.
    fn pk(&self) -> &[String];
    /// Name of the primary-key constraint.
    fn pk_constraint_name(&self) -> String;
}

/// A user table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    grain_name: String,
    name: String,
    columns: IndexMap<String, Column>,
    pk: Vec<String>,
    pk_finalized: bool,
    pk_constraint_name: Option<String>,
    foreign_keys: Vec<ForeignKey>,
    autoupdate: bool,
    versioned: bool,
    frozen: bool,
}

impl Table {
    /// Create an empty table inside the named grain.
    pub fn new(grain_name: &str, name: &str) -> CelestaResult<Self> {
        validate_identifier(grain_name)?;
        validate_identifier(name)?;
        Ok(Self {
            grain_name: grain_name.to_owned(),
            name: name.to_owned(),
            columns: IndexMap::new(),
            pk: Vec::new(),
            pk_finalized: false,
            pk_constraint_name: None,
            foreign_keys: Vec::new(),
            autoupdate: true,
            versioned: false,
            frozen: false,
        })
    }

    #[must_use]
    pub fn grain_name(&self) -> &str {
        &self.grain_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    /// Primary-key column names in key order.
    #[must_use]
    pub fn pk(&self) -> &[String] {
        &self.pk
    }

    /// Name of the primary-key constraint, `pk_<table>` unless overridden.
    #[must_use]
    pub fn pk_constraint_name(&self) -> String {
        self.pk_constraint_name
            .clone()
            .unwrap_or_else(|| format!("pk_{}", self.name))
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Append a column. Duplicates are rejected; so are additions after the
    /// table has been frozen by reference resolution.
    pub fn add_column(&mut self, column: Column) -> CelestaResult<&mut Self> {
        self.check_not_frozen("add a column")?;
        if column.name() == REC_VERSION {
            return Err(CelestaError::IllegalState {
                detail: format!("column name '{REC_VERSION}' is reserved"),
            });
        }
        if self.columns.contains_key(column.name()) {
            return Err(CelestaError::DuplicateColumn {
                element: self.name.clone(),
                column: column.name().to_owned(),
            });
        }
        self.columns.insert(column.name().to_owned(), column);
        Ok(self)
    }

    /// Append a column to the primary key. Fails once the key is finalized.
    pub fn add_pk(&mut self, column_name: &str) -> CelestaResult<&mut Self> {
        if self.pk_finalized {
            return Err(CelestaError::IllegalState {
                detail: format!(
                    "primary key of table '{}' is finalized and cannot be extended",
                    self.name
                ),
            });
        }
        if !self.columns.contains_key(column_name) {
            return Err(CelestaError::UnknownColumn {
                element: self.name.clone(),
                column: column_name.to_owned(),
            });
        }
        if self.pk.iter().any(|c| c == column_name) {
            return Err(CelestaError::DuplicateColumn {
                element: format!("primary key of {}", self.name),
                column: column_name.to_owned(),
            });
        }
        self.pk.push(column_name.to_owned());
        Ok(self)
    }

    /// Seal the primary key; exactly one call is allowed, and the key must
    /// be non-empty by then.
    pub fn finalize_pk(&mut self) -> CelestaResult<()> {
        if self.pk_finalized {
            return Err(CelestaError::IllegalState {
                detail: format!(
                    "primary key of table '{}' is already finalized",
                    self.name
                ),
            });
        }
        if self.pk.is_empty() {
            return Err(CelestaError::MissingPk {
                table: self.name.clone(),
            });
        }
        self.pk_finalized = true;
        Ok(())
    }

    #[must_use]
    pub fn is_pk_finalized(&self) -> bool {
        self.pk_finalized
    }

    /// Override the default `pk_<table>` constraint name.
    pub fn set_pk_constraint_name(&mut self, name: &str) -> CelestaResult<()> {
        validate_identifier(name)?;
        self.pk_constraint_name = Some(name.to_owned());
        Ok(())
    }

    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub(crate) fn foreign_keys_mut(&mut self) -> &mut Vec<ForeignKey> {
        &mut self.foreign_keys
    }

    pub(crate) fn push_foreign_key(&mut self, fk: ForeignKey) -> CelestaResult<()> {
        self.check_not_frozen("add a foreign key")?;
        self.foreign_keys.push(fk);
        Ok(())
    }

    #[must_use]
    pub fn is_autoupdate(&self) -> bool {
        self.autoupdate
    }

    /// `WITH NO AUTOUPDATE` tables are left untouched by the updater.
    pub fn set_autoupdate(&mut self, autoupdate: bool) {
        self.autoupdate = autoupdate;
    }

    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    pub fn set_versioned(&mut self, versioned: bool) {
        self.versioned = versioned;
    }

    /// The implicit `recversion` column of versioned tables.
    #[must_use]
    pub fn rec_version_column(&self) -> Column {
        let mut c = Column::new(
            REC_VERSION,
            ColumnKind::Integer {
                identity: false,
                default: Some(1),
            },
        )
        .expect("reserved name is a legal identifier");
        c.set_nullable(false);
        c
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    fn check_not_frozen(&self, action: &str) -> CelestaResult<()> {
        if self.frozen {
            Err(CelestaError::IllegalState {
                detail: format!(
                    "cannot {action}: table '{}' is frozen after reference resolution",
                    self.name
                ),
            })
        } else {
            Ok(())
        }
    }
}

impl TableElement for Table {
    fn grain_name(&self) -> &str {
        &self.grain_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    fn pk(&self) -> &[String] {
        &self.pk
    }

    fn pk_constraint_name(&self) -> String {
        Self::pk_constraint_name(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_pk() -> Table {
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::identity("ida").unwrap()).unwrap();
        t.add_pk("ida").unwrap();
        t.finalize_pk().unwrap();
        t
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::integer("a").unwrap()).unwrap();
        assert!(matches!(
            t.add_column(Column::integer("a").unwrap()),
            Err(CelestaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_pk_lifecycle() {
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::identity("ida").unwrap()).unwrap();

        assert!(matches!(
            t.add_pk("nope"),
            Err(CelestaError::UnknownColumn { .. })
        ));
        t.add_pk("ida").unwrap();
        assert!(matches!(
            t.add_pk("ida"),
            Err(CelestaError::DuplicateColumn { .. })
        ));
        t.finalize_pk().unwrap();
        assert!(t.is_pk_finalized());

        // Finalized exactly once; no further parts.
        assert!(matches!(
            t.finalize_pk(),
            Err(CelestaError::IllegalState { .. })
        ));
        assert!(matches!(
            t.add_pk("ida"),
            Err(CelestaError::IllegalState { .. })
        ));
    }

    #[test]
    fn test_empty_pk_cannot_finalize() {
        let mut t = Table::new("g", "t1").unwrap();
        assert!(matches!(
            t.finalize_pk(),
            Err(CelestaError::MissingPk { .. })
        ));
    }

    #[test]
    fn test_columns_allowed_after_pk_finalization() {
        let mut t = table_with_pk();
        t.add_column(Column::integer("intcol").unwrap()).unwrap();
        t.add_column(Column::datetime("datecol").unwrap()).unwrap();
        assert_eq!(t.columns().len(), 3);
    }

    #[test]
    fn test_frozen_table_rejects_mutation() {
        let mut t = table_with_pk();
        t.freeze();
        assert!(matches!(
            t.add_column(Column::integer("x").unwrap()),
            Err(CelestaError::IllegalState { .. })
        ));
    }

    #[test]
    fn test_recversion_reserved() {
        let mut t = table_with_pk();
        assert!(t.add_column(Column::integer(REC_VERSION).unwrap()).is_err());

        let rv = t.rec_version_column();
        assert_eq!(rv.name(), REC_VERSION);
        assert!(!rv.is_nullable());
        assert_eq!(rv.default_value_text(), "1");
    }

    #[test]
    fn test_pk_constraint_name_defaults() {
        let t = table_with_pk();
        assert_eq!(t.pk_constraint_name(), "pk_t1");
    }
}
