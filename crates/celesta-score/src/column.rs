//! Table column variants.
//!
//! Six column kinds exist in CelestaSQL: integer, floating, string (with an
//! explicit length or `MAX`), binary, boolean and datetime. Every column has
//! a nullability flag and an optional default. Integer columns may instead
//! carry `IDENTITY`, and datetime columns may default to `GETDATE()`.

use std::fmt;

use celesta_error::{CelestaError, CelestaResult};

use crate::expr::ExprType;
use crate::ident::validate_identifier;

/// Declared length of a string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StringLength {
    /// `varchar(n)`.
    Chars(u32),
    /// `text` / `varchar(max)`.
    Max,
}

/// Kind-specific column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Integer {
        /// `IDENTITY` columns draw values from an implicit sequence and are
        /// mutually exclusive with an explicit default.
        identity: bool,
        default: Option<i32>,
    },
    Floating {
        default: Option<f64>,
    },
    String {
        length: StringLength,
        default: Option<String>,
    },
    Binary {
        /// Hex literal text, e.g. `0xFFAAFF`.
        default: Option<String>,
    },
    Boolean {
        default: Option<bool>,
    },
    DateTime {
        /// `'YYYYMMDD'` literal text.
        default: Option<String>,
        /// `GETDATE()` default; mutually exclusive with a literal default.
        get_date: bool,
    },
}

/// A single table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    nullable: bool,
    kind: ColumnKind,
}

impl Column {
    /// Create a column; the name must be a legal identifier.
    pub fn new(name: &str, kind: ColumnKind) -> CelestaResult<Self> {
        validate_identifier(name)?;
        Ok(Self {
            name: name.to_owned(),
            nullable: true,
            kind,
        })
    }

    /// A nullable integer column with no default.
    pub fn integer(name: &str) -> CelestaResult<Self> {
        Self::new(
            name,
            ColumnKind::Integer {
                identity: false,
                default: None,
            },
        )
    }

    /// A `NOT NULL IDENTITY` integer column.
    pub fn identity(name: &str) -> CelestaResult<Self> {
        let mut c = Self::new(
            name,
            ColumnKind::Integer {
                identity: true,
                default: None,
            },
        )?;
        c.nullable = false;
        Ok(c)
    }

    /// A nullable floating column with no default.
    pub fn floating(name: &str) -> CelestaResult<Self> {
        Self::new(name, ColumnKind::Floating { default: None })
    }

    /// A nullable `varchar(length)` column with no default.
    pub fn string(name: &str, length: u32) -> CelestaResult<Self> {
        Self::new(
            name,
            ColumnKind::String {
                length: StringLength::Chars(length),
                default: None,
            },
        )
    }

    /// A nullable `varchar(max)` column with no default.
    pub fn text(name: &str) -> CelestaResult<Self> {
        Self::new(
            name,
            ColumnKind::String {
                length: StringLength::Max,
                default: None,
            },
        )
    }

    /// A nullable binary column with no default.
    pub fn binary(name: &str) -> CelestaResult<Self> {
        Self::new(name, ColumnKind::Binary { default: None })
    }

    /// A nullable boolean column with no default.
    pub fn boolean(name: &str) -> CelestaResult<Self> {
        Self::new(name, ColumnKind::Boolean { default: None })
    }

    /// A nullable datetime column with no default.
    pub fn datetime(name: &str) -> CelestaResult<Self> {
        Self::new(
            name,
            ColumnKind::DateTime {
                default: None,
                get_date: false,
            },
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Set nullability in place.
    pub fn set_nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    /// Replace the kind payload (default value, length, identity flag).
    ///
    /// The replacement must keep the column's kind; changing an integer
    /// column into a string column in place is rejected.
    pub fn set_kind(&mut self, kind: ColumnKind) -> CelestaResult<&mut Self> {
        if std::mem::discriminant(&self.kind) != std::mem::discriminant(&kind) {
            return Err(CelestaError::IllegalState {
                detail: format!(
                    "cannot change the type of column '{}' in place",
                    self.name
                ),
            });
        }
        self.kind = kind;
        Ok(self)
    }

    /// Whether this is an `IDENTITY` integer column.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Integer { identity: true, .. }
        )
    }

    /// The expression type this column contributes to field references.
    #[must_use]
    pub fn expr_type(&self) -> ExprType {
        match self.kind {
            ColumnKind::Integer { .. } | ColumnKind::Floating { .. } => ExprType::Numeric,
            ColumnKind::String { .. } => ExprType::Text,
            ColumnKind::Boolean { .. } => ExprType::Bit,
            ColumnKind::DateTime { .. } => ExprType::Date,
            ColumnKind::Binary { .. } => ExprType::Blob,
        }
    }

    /// The default value as canonical CelestaSQL text, empty when absent.
    ///
    /// This is the dialect-neutral form introspection DTOs are compared
    /// against: `IDENTITY` and `GETDATE()` keywords uppercase, string
    /// defaults single-quoted, booleans as `'TRUE'`/`'FALSE'`.
    #[must_use]
    pub fn default_value_text(&self) -> String {
        match &self.kind {
            ColumnKind::Integer { identity: true, .. } => "IDENTITY".to_owned(),
            ColumnKind::Integer {
                default: Some(n), ..
            } => n.to_string(),
            ColumnKind::Floating { default: Some(x) } => x.to_string(),
            ColumnKind::String {
                default: Some(s), ..
            } => format!("'{s}'"),
            ColumnKind::Binary { default: Some(h) } => h.clone(),
            ColumnKind::Boolean { default: Some(b) } => {
                if *b { "'TRUE'".to_owned() } else { "'FALSE'".to_owned() }
            }
            ColumnKind::DateTime { get_date: true, .. } => "GETDATE()".to_owned(),
            ColumnKind::DateTime {
                default: Some(d), ..
            } => format!("'{d}'"),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match &self.kind {
            ColumnKind::Integer { .. } => "INT".to_owned(),
            ColumnKind::Floating { .. } => "REAL".to_owned(),
            ColumnKind::String {
                length: StringLength::Chars(n),
                ..
            } => format!("VARCHAR({n})"),
            ColumnKind::String {
                length: StringLength::Max,
                ..
            } => "TEXT".to_owned(),
            ColumnKind::Binary { .. } => "BLOB".to_owned(),
            ColumnKind::Boolean { .. } => "BIT".to_owned(),
            ColumnKind::DateTime { .. } => "DATETIME".to_owned(),
        };
        write!(f, "{} {}", self.name, ty)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        let default = self.default_value_text();
        if !default.is_empty() {
            write!(f, " DEFAULT {default}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_type_mapping() {
        assert_eq!(Column::integer("a").unwrap().expr_type(), ExprType::Numeric);
        assert_eq!(Column::floating("a").unwrap().expr_type(), ExprType::Numeric);
        assert_eq!(Column::string("a", 10).unwrap().expr_type(), ExprType::Text);
        assert_eq!(Column::boolean("a").unwrap().expr_type(), ExprType::Bit);
        assert_eq!(Column::datetime("a").unwrap().expr_type(), ExprType::Date);
        assert_eq!(Column::binary("a").unwrap().expr_type(), ExprType::Blob);
    }

    #[test]
    fn test_identity_column() {
        let c = Column::identity("ida").unwrap();
        assert!(c.is_identity());
        assert!(!c.is_nullable());
        assert_eq!(c.default_value_text(), "IDENTITY");
    }

    #[test]
    fn test_kind_change_rejected() {
        let mut c = Column::integer("a").unwrap();
        assert!(c
            .set_kind(ColumnKind::Boolean { default: None })
            .is_err());
        assert!(c
            .set_kind(ColumnKind::Integer {
                identity: false,
                default: Some(5),
            })
            .is_ok());
        assert_eq!(c.default_value_text(), "5");
    }

    #[test]
    fn test_bad_name_rejected() {
        assert!(Column::integer("1abc").is_err());
    }
}
