//! Introspected database metadata.
//!
//! Each `Db*Info` value describes the live shape of one database object, as
//! reported by a [`crate::adaptor::DbAdaptor`]. Its `reflects` predicate is
//! the sole oracle for "no DDL needed": it holds when the live shape is
//! equivalent to the declared model entity up to dialect normalization.
//! Adaptors fill these DTOs with canonical CelestaSQL text (defaults
//! uppercase-keyworded, identity reported as `IDENTITY` regardless of the
//! dialect's sequence mechanics), so the comparison here stays
//! dialect-neutral.

use celesta_score::{
    Column, ColumnKind, ForeignKey, Index, Sequence, StringLength, TableElement,
};

/// Column type discriminant as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DbColumnType {
    Int,
    Real,
    Varchar,
    Blob,
    Bit,
    Datetime,
}

impl DbColumnType {
    /// The introspection type a model column maps to.
    #[must_use]
    pub fn of(column: &Column) -> Self {
        match column.kind() {
            ColumnKind::Integer { .. } => Self::Int,
            ColumnKind::Floating { .. } => Self::Real,
            ColumnKind::String { .. } => Self::Varchar,
            ColumnKind::Binary { .. } => Self::Blob,
            ColumnKind::Boolean { .. } => Self::Bit,
            ColumnKind::DateTime { .. } => Self::Datetime,
        }
    }
}

/// Live shape of one table column.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DbColumnInfo {
    pub table_name: String,
    pub name: String,
    pub ty: DbColumnType,
    pub nullable: bool,
    /// Canonical default text, empty when the column has no default.
    pub default_value: String,
    /// Declared length for `Varchar` columns; 0 otherwise.
    pub length: u32,
    /// `varchar(max)` flag.
    pub max: bool,
    pub identity: bool,
}

impl DbColumnInfo {
    /// Whether the live column matches the declared one.
    #[must_use]
    pub fn reflects(&self, column: &Column) -> bool {
        if self.ty != DbColumnType::of(column) {
            return false;
        }
        if self.identity != column.is_identity() {
            return false;
        }
        if self.nullable != column.is_nullable() {
            return false;
        }
        if canonical_default(&self.default_value) != canonical_default(&column.default_value_text())
        {
            return false;
        }
        if let ColumnKind::String { length, .. } = column.kind() {
            match length {
                StringLength::Max => {
                    if !self.max {
                        return false;
                    }
                }
                StringLength::Chars(n) => {
                    if self.max || self.length != *n {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Snapshot of a model column, as a conforming adaptor would report it.
    #[must_use]
    pub fn of_column(table_name: &str, column: &Column) -> Self {
        let (length, max) = match column.kind() {
            ColumnKind::String {
                length: StringLength::Chars(n),
                ..
            } => (*n, false),
            ColumnKind::String {
                length: StringLength::Max,
                ..
            } => (0, true),
            _ => (0, false),
        };
        Self {
            table_name: table_name.to_owned(),
            name: column.name().to_owned(),
            ty: DbColumnType::of(column),
            nullable: column.is_nullable(),
            default_value: column.default_value_text(),
            length,
            max,
            identity: column.is_identity(),
        }
    }
}

/// Keyword defaults compare case-insensitively; literal text is exact.
fn canonical_default(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("GETDATE()") || trimmed.eq_ignore_ascii_case("IDENTITY") {
        trimmed.to_ascii_uppercase()
    } else {
        trimmed.to_owned()
    }
}

/// Live shape of a table's primary key. An empty column list means the table
/// currently has no primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DbPkInfo {
    pub name: String,
    pub column_names: Vec<String>,
}

impl DbPkInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column_names.is_empty()
    }

    /// Whether the live key matches the declared one, name included.
    #[must_use]
    pub fn reflects(&self, table: &dyn TableElement) -> bool {
        self.name == table.pk_constraint_name() && self.column_names == table.pk()
    }
}

/// Live shape of one foreign key.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DbFkInfo {
    /// Table the constraint is declared on.
    pub table_name: String,
    /// Constraint name, the match key against the model.
    pub name: String,
    pub column_names: Vec<String>,
    pub ref_grain_name: String,
    pub ref_table_name: String,
}

impl DbFkInfo {
    /// Whether the live constraint matches the declared key.
    #[must_use]
    pub fn reflects(&self, fk: &ForeignKey) -> bool {
        let (ref_grain, ref_table) = fk.declared_target();
        self.table_name == fk.parent_table()
            && self.ref_grain_name == ref_grain
            && self.ref_table_name == ref_table
            && self.column_names == fk.columns()
    }
}

/// Live shape of one index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DbIndexInfo {
    pub table_name: String,
    pub index_name: String,
    pub column_names: Vec<String>,
}

impl DbIndexInfo {
    #[must_use]
    pub fn reflects(&self, index: &Index) -> bool {
        self.table_name == index.table_name() && self.column_names == index.columns()
    }
}

/// Live shape of one sequence. The start value is not introspectable after
/// creation and is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DbSequenceInfo {
    pub increment_by: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub is_cycle: bool,
}

impl DbSequenceInfo {
    #[must_use]
    pub fn reflects(&self, sequence: &Sequence) -> bool {
        self.increment_by == sequence.increment_by()
            && self.min_value == sequence.min_value()
            && self.max_value == sequence.max_value()
            && self.is_cycle == sequence.is_cycle()
    }

    #[must_use]
    pub fn of_sequence(sequence: &Sequence) -> Self {
        Self {
            increment_by: sequence.increment_by(),
            min_value: sequence.min_value(),
            max_value: sequence.max_value(),
            is_cycle: sequence.is_cycle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celesta_score::Table;

    fn sample_table() -> Table {
        let mut t = Table::new("g", "t1").unwrap();
        t.add_column(Column::identity("ida").unwrap()).unwrap();
        t.add_pk("ida").unwrap();
        t.finalize_pk().unwrap();
        t.add_column(Column::integer("intcol").unwrap()).unwrap();
        t.add_column(Column::string("scol", 5).unwrap()).unwrap();
        t
    }

    #[test]
    fn test_column_info_reflects_snapshot() {
        let t = sample_table();
        for column in t.columns().values() {
            let info = DbColumnInfo::of_column("t1", column);
            assert!(info.reflects(column), "{}", column.name());
        }
    }

    #[test]
    fn test_column_info_detects_divergence() {
        let t = sample_table();
        let intcol = t.column("intcol").unwrap();
        let mut info = DbColumnInfo::of_column("t1", intcol);
        info.nullable = !info.nullable;
        assert!(!info.reflects(intcol));

        let scol = t.column("scol").unwrap();
        let mut info = DbColumnInfo::of_column("t1", scol);
        info.length = 10;
        assert!(!info.reflects(scol));
        let mut info = DbColumnInfo::of_column("t1", scol);
        info.max = true;
        assert!(!info.reflects(scol));
    }

    #[test]
    fn test_default_canonicalization() {
        let mut c = Column::datetime("d").unwrap();
        c.set_kind(ColumnKind::DateTime {
            default: None,
            get_date: true,
        })
        .unwrap();
        let mut info = DbColumnInfo::of_column("t1", &c);
        info.default_value = "getdate()".to_owned();
        assert!(info.reflects(&c));
    }

    #[test]
    fn test_pk_info_reflects() {
        let t = sample_table();
        let pk = DbPkInfo {
            name: "pk_t1".to_owned(),
            column_names: vec!["ida".to_owned()],
        };
        assert!(pk.reflects(&t));
        assert!(!pk.is_empty());

        let renamed = DbPkInfo {
            name: "pk_other".to_owned(),
            column_names: vec!["ida".to_owned()],
        };
        assert!(!renamed.reflects(&t));
        assert!(DbPkInfo::default().is_empty());
    }

    #[test]
    fn test_sequence_info_reflects() {
        let mut s = Sequence::new("g", "s1").unwrap();
        s.set_increment_by(2).unwrap();
        let info = DbSequenceInfo::of_sequence(&s);
        assert!(info.reflects(&s));

        let mut other = info.clone();
        other.is_cycle = true;
        assert!(!other.reflects(&s));
    }
}
