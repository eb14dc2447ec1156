//! The CelestaSQL scalar expression tree.
//!
//! One tagged enum, [`Expr`], covers the whole expression subset used inside
//! views and check-like predicates. Dispatch is by `match`; traversal is the
//! [`Expr::walk`] fold. Three operations run over a tree after construction:
//!
//! 1. [`Expr::resolve_field_refs`] binds every [`Expr::FieldRef`] to a column
//!    of one of the declared table references;
//! 2. [`Expr::validate_types`] enforces the typing rules bottom-up;
//! 3. `Display` renders canonical CelestaSQL, the form the grain checksum is
//!    computed over; operator spacing is exactly `" op "` and must not
//!    change.

use std::fmt;

use celesta_error::{CelestaError, CelestaResult};

use crate::table::Table;

/// Type of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExprType {
    Logic,
    Numeric,
    Text,
    Date,
    Bit,
    Blob,
    Undefined,
}

impl ExprType {
    /// Types that may appear on either side of a comparison.
    #[must_use]
    pub const fn is_comparable(self) -> bool {
        matches!(self, Self::Date | Self::Numeric | Self::Text)
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Logic => "LOGIC",
            Self::Numeric => "NUMERIC",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Bit => "BIT",
            Self::Blob => "BLOB",
            Self::Undefined => "UNDEFINED",
        })
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelopKind {
    Gt,
    Ls,
    GtEq,
    LsEq,
    NtEq,
    Eq,
    Like,
}

impl RelopKind {
    /// Canonical rendering, spaces included.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Gt => " > ",
            Self::Ls => " < ",
            Self::GtEq => " >= ",
            Self::LsEq => " <= ",
            Self::NtEq => " <> ",
            Self::Eq => " = ",
            Self::Like => " LIKE ",
        }
    }
}

/// `AND` / `OR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Arithmetic and concatenation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOp {
    Plus,
    Minus,
    Times,
    Over,
    Concat,
}

impl TermOp {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Plus => " + ",
            Self::Minus => " - ",
            Self::Times => " * ",
            Self::Over => " / ",
            Self::Concat => " || ",
        }
    }
}

/// A resolved field reference: lookup keys into the owning score plus the
/// column's mapped expression type. No borrowed handles, so the binding stays
/// valid however the model is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub grain: String,
    pub table: String,
    pub column: String,
    pub ty: ExprType,
}

/// A declared table visible to field resolution: the table itself plus the
/// alias it was introduced under.
pub struct TableRef<'a> {
    pub table: &'a Table,
    pub alias: String,
}

impl<'a> TableRef<'a> {
    #[must_use]
    pub fn new(table: &'a Table, alias: impl Into<String>) -> Self {
        Self {
            table,
            alias: alias.into(),
        }
    }
}

/// A scalar CelestaSQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `( inner )`; parentheses are preserved through round-trips.
    Parenthesized(Box<Expr>),
    /// `left op right` for a comparison operator.
    Relop {
        left: Box<Expr>,
        right: Box<Expr>,
        op: RelopKind,
    },
    /// `left IN (op1, op2, …)`.
    In {
        left: Box<Expr>,
        operands: Vec<Expr>,
    },
    /// `left BETWEEN lo AND hi`.
    Between {
        left: Box<Expr>,
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    /// `operand IS NULL`.
    IsNull(Box<Expr>),
    /// `NOT operand`.
    Not(Box<Expr>),
    /// `op1 AND op2 AND …` / `op1 OR op2 OR …`; the list is never empty.
    Logical { op: LogicalOp, operands: Vec<Expr> },
    /// `op1 + op2 + …` and friends; the list is never empty.
    Term { op: TermOp, operands: Vec<Expr> },
    /// `-operand`.
    UnaryMinus(Box<Expr>),
    /// A numeric literal kept as its lexical text.
    NumericLiteral(String),
    /// A text literal kept as its lexical text, quotes included.
    TextLiteral(String),
    /// A possibly-qualified column reference.
    FieldRef {
        grain_name: Option<String>,
        table_or_alias: Option<String>,
        column_name: String,
        binding: Option<FieldBinding>,
    },
}

impl Expr {
    /// `IS NULL` over a term; rejects logical conditions at build time.
    pub fn is_null(operand: Expr) -> CelestaResult<Self> {
        if operand.expr_type() == ExprType::Logic {
            return Err(CelestaError::parse(format!(
                "expression '{operand}' is a logical condition and cannot be \
                 an argument of the IS NULL operator"
            )));
        }
        Ok(Self::IsNull(Box::new(operand)))
    }

    /// `NOT` over a condition; rejects non-logical operands at build time.
    pub fn not(operand: Expr) -> CelestaResult<Self> {
        operand.assert_type(ExprType::Logic)?;
        Ok(Self::Not(Box::new(operand)))
    }

    /// `AND`/`OR` chain; the operand list must be non-empty and all-logical.
    pub fn logical(op: LogicalOp, operands: Vec<Expr>) -> CelestaResult<Self> {
        if operands.is_empty() {
            return Err(CelestaError::EmptyOperandList {
                operator: op.sql().trim().to_owned(),
            });
        }
        for operand in &operands {
            operand.assert_type(ExprType::Logic)?;
        }
        Ok(Self::Logical { op, operands })
    }

    /// Arithmetic/concatenation chain; the operand list must be non-empty.
    pub fn term(op: TermOp, operands: Vec<Expr>) -> CelestaResult<Self> {
        if operands.is_empty() {
            return Err(CelestaError::EmptyOperandList {
                operator: op.sql().trim().to_owned(),
            });
        }
        Ok(Self::Term { op, operands })
    }

    /// An unqualified or qualified field reference. A grain qualifier
    /// requires a table qualifier.
    pub fn field_ref(
        grain_name: Option<&str>,
        table_or_alias: Option<&str>,
        column_name: &str,
    ) -> CelestaResult<Self> {
        if grain_name.is_some() && table_or_alias.is_none() {
            return Err(CelestaError::parse(format!(
                "field reference '{}' has a grain qualifier but no table qualifier",
                column_name
            )));
        }
        Ok(Self::FieldRef {
            grain_name: grain_name.map(str::to_owned),
            table_or_alias: table_or_alias.map(str::to_owned),
            column_name: column_name.to_owned(),
            binding: None,
        })
    }

    /// The type of this node. Field references are `Undefined` until
    /// resolution binds them to a column.
    #[must_use]
    pub fn expr_type(&self) -> ExprType {
        match self {
            Self::Parenthesized(inner) => inner.expr_type(),
            Self::Relop { .. }
            | Self::In { .. }
            | Self::Between { .. }
            | Self::IsNull(_)
            | Self::Not(_)
            | Self::Logical { .. } => ExprType::Logic,
            Self::Term { op, .. } => {
                if *op == TermOp::Concat {
                    ExprType::Text
                } else {
                    ExprType::Numeric
                }
            }
            Self::UnaryMinus(_) | Self::NumericLiteral(_) => ExprType::Numeric,
            Self::TextLiteral(_) => ExprType::Text,
            Self::FieldRef { binding, .. } => {
                binding.as_ref().map_or(ExprType::Undefined, |b| b.ty)
            }
        }
    }

    /// Canonical CelestaSQL text of this expression.
    #[must_use]
    pub fn csql(&self) -> String {
        self.to_string()
    }

    pub(crate) fn assert_type(&self, expected: ExprType) -> CelestaResult<()> {
        let actual = self.expr_type();
        if actual == expected {
            Ok(())
        } else {
            Err(CelestaError::TypeMismatch {
                expr: self.csql(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Bind every field reference against the declared table list.
    ///
    /// Matching rules, applied per reference:
    /// - grain and table both given: the table's grain and name must match
    ///   exactly;
    /// - only a table-or-alias: matched against each declared alias;
    /// - bare column name: matched against every referenced table that
    ///   contains the column.
    ///
    /// Exactly one candidate must remain; zero is
    /// [`CelestaError::UnresolvedField`], several are
    /// [`CelestaError::AmbiguousField`]. Already-bound references are left
    /// untouched, which makes resolution idempotent.
    pub fn resolve_field_refs(&mut self, tables: &[TableRef<'_>]) -> CelestaResult<()> {
        match self {
            Self::Parenthesized(inner) | Self::IsNull(inner) | Self::Not(inner)
            | Self::UnaryMinus(inner) => inner.resolve_field_refs(tables),
            Self::Relop { left, right, .. } => {
                left.resolve_field_refs(tables)?;
                right.resolve_field_refs(tables)
            }
            Self::In { left, operands } => {
                left.resolve_field_refs(tables)?;
                for operand in operands {
                    operand.resolve_field_refs(tables)?;
                }
                Ok(())
            }
            Self::Between { left, lo, hi } => {
                left.resolve_field_refs(tables)?;
                lo.resolve_field_refs(tables)?;
                hi.resolve_field_refs(tables)
            }
            Self::Logical { operands, .. } | Self::Term { operands, .. } => {
                for operand in operands {
                    operand.resolve_field_refs(tables)?;
                }
                Ok(())
            }
            Self::NumericLiteral(_) | Self::TextLiteral(_) => Ok(()),
            Self::FieldRef {
                grain_name,
                table_or_alias,
                column_name,
                binding,
            } => {
                if binding.is_some() {
                    return Ok(());
                }
                let reference = render_field_ref(grain_name, table_or_alias, column_name);
                let mut found: Option<FieldBinding> = None;
                let mut found_counter = 0usize;
                for table_ref in tables {
                    let matched = match (grain_name.as_deref(), table_or_alias.as_deref()) {
                        (Some(g), Some(t)) => {
                            g == table_ref.table.grain_name() && t == table_ref.table.name()
                        }
                        (None, Some(alias)) => alias == table_ref.alias,
                        (None, None) => table_ref.table.has_column(column_name),
                        // A grain qualifier without a table qualifier is
                        // rejected at construction; treat it as no match.
                        (Some(_), None) => false,
                    };
                    if !matched {
                        continue;
                    }
                    let column = table_ref.table.column(column_name).ok_or_else(|| {
                        CelestaError::UnknownColumn {
                            element: table_ref.table.name().to_owned(),
                            column: column_name.clone(),
                        }
                    })?;
                    found = Some(FieldBinding {
                        grain: table_ref.table.grain_name().to_owned(),
                        table: table_ref.table.name().to_owned(),
                        column: column_name.clone(),
                        ty: column.expr_type(),
                    });
                    found_counter += 1;
                }
                match found_counter {
                    0 => Err(CelestaError::UnresolvedField { reference }),
                    1 => {
                        *binding = found;
                        Ok(())
                    }
                    _ => Err(CelestaError::AmbiguousField { reference }),
                }
            }
        }
    }

    /// Enforce the typing rules bottom-up.
    ///
    /// Comparisons and `IN`/`BETWEEN` admit `DATE`, `NUMERIC` and `TEXT`
    /// operands of one common type; `LIKE` requires `TEXT`; `||` requires
    /// all-`TEXT`, the other term operators all-`NUMERIC`; unary minus
    /// requires `NUMERIC`.
    pub fn validate_types(&self) -> CelestaResult<()> {
        match self {
            Self::Parenthesized(inner) => inner.validate_types(),
            Self::Relop { left, right, op } => {
                left.validate_types()?;
                right.validate_types()?;
                let t = left.expr_type();
                if !t.is_comparable() {
                    return Err(CelestaError::TypeNotComparable {
                        expr: self.csql(),
                        actual: t.to_string(),
                        operator: "comparisons".to_owned(),
                    });
                }
                right.assert_type(t)?;
                if *op == RelopKind::Like {
                    left.assert_type(ExprType::Text)?;
                }
                Ok(())
            }
            Self::In { left, operands } => {
                left.validate_types()?;
                for operand in operands {
                    operand.validate_types()?;
                }
                let t = left.expr_type();
                if !t.is_comparable() {
                    return Err(CelestaError::TypeNotComparable {
                        expr: self.csql(),
                        actual: t.to_string(),
                        operator: "...IN(...)".to_owned(),
                    });
                }
                for operand in operands {
                    operand.assert_type(t)?;
                }
                Ok(())
            }
            Self::Between { left, lo, hi } => {
                left.validate_types()?;
                lo.validate_types()?;
                hi.validate_types()?;
                let t = left.expr_type();
                if !t.is_comparable() {
                    return Err(CelestaError::TypeNotComparable {
                        expr: self.csql(),
                        actual: t.to_string(),
                        operator: "...BETWEEN...AND...".to_owned(),
                    });
                }
                lo.assert_type(t)?;
                hi.assert_type(t)
            }
            // Construction already checked the operand; only recurse.
            Self::IsNull(inner) | Self::Not(inner) => inner.validate_types(),
            Self::Logical { operands, .. } => {
                for operand in operands {
                    operand.validate_types()?;
                }
                Ok(())
            }
            Self::Term { op, operands } => {
                for operand in operands {
                    operand.validate_types()?;
                }
                let t = if *op == TermOp::Concat {
                    ExprType::Text
                } else {
                    ExprType::Numeric
                };
                for operand in operands {
                    operand.assert_type(t)?;
                }
                Ok(())
            }
            Self::UnaryMinus(inner) => {
                inner.validate_types()?;
                inner.assert_type(ExprType::Numeric)
            }
            Self::NumericLiteral(_) | Self::TextLiteral(_) | Self::FieldRef { .. } => Ok(()),
        }
    }

    /// Post-order fold: children first, then the node itself.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        match self {
            Self::Parenthesized(inner)
            | Self::IsNull(inner)
            | Self::Not(inner)
            | Self::UnaryMinus(inner) => inner.walk(f),
            Self::Relop { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Self::In { left, operands } => {
                left.walk(f);
                for operand in operands {
                    operand.walk(f);
                }
            }
            Self::Between { left, lo, hi } => {
                left.walk(f);
                lo.walk(f);
                hi.walk(f);
            }
            Self::Logical { operands, .. } | Self::Term { operands, .. } => {
                for operand in operands {
                    operand.walk(f);
                }
            }
            Self::NumericLiteral(_) | Self::TextLiteral(_) | Self::FieldRef { .. } => {}
        }
        f(self);
    }
}

fn render_field_ref(
    grain_name: &Option<String>,
    table_or_alias: &Option<String>,
    column_name: &str,
) -> String {
    let mut out = String::new();
    if let Some(g) = grain_name {
        out.push_str(g);
        out.push('.');
    }
    if let Some(t) = table_or_alias {
        out.push_str(t);
        out.push('.');
    }
    out.push_str(column_name);
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parenthesized(inner) => write!(f, "({inner})"),
            Self::Relop { left, right, op } => {
                write!(f, "{left}{}{right}", op.sql())
            }
            Self::In { left, operands } => {
                write!(f, "{left} IN (")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                f.write_str(")")
            }
            Self::Between { left, lo, hi } => {
                write!(f, "{left} BETWEEN {lo} AND {hi}")
            }
            Self::IsNull(inner) => write!(f, "{inner} IS NULL"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::Logical { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op.sql())?;
                    }
                    write!(f, "{operand}")?;
                }
                Ok(())
            }
            Self::Term { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op.sql())?;
                    }
                    write!(f, "{operand}")?;
                }
                Ok(())
            }
            Self::UnaryMinus(inner) => write!(f, "-{inner}"),
            Self::NumericLiteral(text) | Self::TextLiteral(text) => f.write_str(text),
            Self::FieldRef {
                grain_name,
                table_or_alias,
                column_name,
                ..
            } => f.write_str(&render_field_ref(grain_name, table_or_alias, column_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Expr {
        Expr::NumericLiteral(text.to_owned())
    }

    fn text(t: &str) -> Expr {
        Expr::TextLiteral(format!("'{t}'"))
    }

    fn relop(left: Expr, op: RelopKind, right: Expr) -> Expr {
        Expr::Relop {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    #[test]
    fn test_csql_operator_spacing() {
        let e = relop(num("1"), RelopKind::GtEq, num("2"));
        assert_eq!(e.csql(), "1 >= 2");

        let e = Expr::term(TermOp::Concat, vec![text("a"), text("b")]).unwrap();
        assert_eq!(e.csql(), "'a' || 'b'");

        let e = Expr::In {
            left: Box::new(num("1")),
            operands: vec![num("1"), num("2"), num("3")],
        };
        assert_eq!(e.csql(), "1 IN (1, 2, 3)");

        let e = Expr::Between {
            left: Box::new(num("5")),
            lo: Box::new(num("1")),
            hi: Box::new(num("10")),
        };
        assert_eq!(e.csql(), "5 BETWEEN 1 AND 10");
    }

    #[test]
    fn test_parenthesized_preserved() {
        let e = Expr::Parenthesized(Box::new(relop(num("1"), RelopKind::Eq, num("1"))));
        assert_eq!(e.csql(), "(1 = 1)");
        assert_eq!(e.expr_type(), ExprType::Logic);
    }

    #[test]
    fn test_logical_construction_rejects_non_logic() {
        assert!(matches!(
            Expr::logical(LogicalOp::And, vec![num("1")]),
            Err(CelestaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_logical_construction_rejects_empty() {
        assert!(matches!(
            Expr::logical(LogicalOp::And, vec![]),
            Err(CelestaError::EmptyOperandList { .. })
        ));
        assert!(matches!(
            Expr::term(TermOp::Plus, vec![]),
            Err(CelestaError::EmptyOperandList { .. })
        ));
    }

    #[test]
    fn test_is_null_rejects_logic() {
        let cond = relop(num("1"), RelopKind::Eq, num("1"));
        assert!(Expr::is_null(cond).is_err());
        assert!(Expr::is_null(num("1")).is_ok());
    }

    #[test]
    fn test_not_requires_logic() {
        assert!(Expr::not(num("1")).is_err());
        let cond = relop(num("1"), RelopKind::Eq, num("1"));
        let not = Expr::not(cond).unwrap();
        assert_eq!(not.csql(), "NOT 1 = 1");
    }

    #[test]
    fn test_like_requires_text() {
        let ok = relop(text("abc"), RelopKind::Like, text("a%"));
        assert!(ok.validate_types().is_ok());

        let bad = relop(num("1"), RelopKind::Like, num("2"));
        assert!(bad.validate_types().is_err());
    }

    #[test]
    fn test_relop_rejects_mixed_types() {
        let bad = relop(num("1"), RelopKind::Eq, text("x"));
        assert!(matches!(
            bad.validate_types(),
            Err(CelestaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_concat_requires_all_text() {
        let bad = Expr::term(TermOp::Concat, vec![text("a"), num("1")]).unwrap();
        assert!(bad.validate_types().is_err());

        let plus = Expr::term(TermOp::Plus, vec![num("1"), num("2"), num("3")]).unwrap();
        assert!(plus.validate_types().is_ok());
        assert_eq!(plus.csql(), "1 + 2 + 3");
        assert_eq!(plus.expr_type(), ExprType::Numeric);
    }

    #[test]
    fn test_unary_minus_requires_numeric() {
        let ok = Expr::UnaryMinus(Box::new(num("5")));
        assert!(ok.validate_types().is_ok());
        assert_eq!(ok.csql(), "-5");

        let bad = Expr::UnaryMinus(Box::new(text("x")));
        assert!(bad.validate_types().is_err());
    }

    #[test]
    fn test_field_ref_requires_table_with_grain() {
        assert!(Expr::field_ref(Some("g"), None, "c").is_err());
        let e = Expr::field_ref(Some("g"), Some("t"), "c").unwrap();
        assert_eq!(e.csql(), "g.t.c");
        assert_eq!(e.expr_type(), ExprType::Undefined);
    }

    #[test]
    fn test_walk_is_post_order() {
        let e = relop(num("1"), RelopKind::Eq, num("2"));
        let mut seen = Vec::new();
        e.walk(&mut |node| seen.push(node.csql()));
        assert_eq!(seen, vec!["1", "2", "1 = 2"]);
    }

    mod resolution {
        use super::*;
        use crate::column::Column;

        fn table(grain: &str, name: &str, columns: &[&str]) -> Table {
            let mut t = Table::new(grain, name).unwrap();
            for column in columns {
                t.add_column(Column::integer(column).unwrap()).unwrap();
            }
            t.add_column(Column::string("label", 10).unwrap()).unwrap();
            t
        }

        #[test]
        fn test_unqualified_unique_column_resolves() {
            let t1 = table("g", "t1", &["a"]);
            let t2 = table("g", "t2", &["b"]);
            let refs = [TableRef::new(&t1, "t1"), TableRef::new(&t2, "t2")];

            let mut e = Expr::field_ref(None, None, "a").unwrap();
            e.resolve_field_refs(&refs).unwrap();
            assert_eq!(e.expr_type(), ExprType::Numeric);
            match &e {
                Expr::FieldRef { binding: Some(b), .. } => {
                    assert_eq!(b.table, "t1");
                    assert_eq!(b.column, "a");
                }
                other => panic!("{other:?}"),
            }
        }

        #[test]
        fn test_unqualified_shared_column_is_ambiguous() {
            let t1 = table("g", "t1", &["a"]);
            let t2 = table("g", "t2", &["b"]);
            let refs = [TableRef::new(&t1, "t1"), TableRef::new(&t2, "t2")];

            let mut e = Expr::field_ref(None, None, "label").unwrap();
            assert!(matches!(
                e.resolve_field_refs(&refs),
                Err(CelestaError::AmbiguousField { .. })
            ));
        }

        #[test]
        fn test_unknown_column_is_unresolved() {
            let t1 = table("g", "t1", &["a"]);
            let refs = [TableRef::new(&t1, "t1")];

            let mut e = Expr::field_ref(None, None, "ghost").unwrap();
            assert!(matches!(
                e.resolve_field_refs(&refs),
                Err(CelestaError::UnresolvedField { .. })
            ));
        }

        #[test]
        fn test_alias_disambiguates() {
            let t1 = table("g", "t1", &["a"]);
            let t2 = table("g", "t2", &["b"]);
            let refs = [TableRef::new(&t1, "x"), TableRef::new(&t2, "y")];

            let mut e = Expr::field_ref(None, Some("y"), "label").unwrap();
            e.resolve_field_refs(&refs).unwrap();
            match &e {
                Expr::FieldRef { binding: Some(b), .. } => assert_eq!(b.table, "t2"),
                other => panic!("{other:?}"),
            }

            // Alias matches, but the column is not there.
            let mut e = Expr::field_ref(None, Some("x"), "b").unwrap();
            assert!(matches!(
                e.resolve_field_refs(&refs),
                Err(CelestaError::UnknownColumn { .. })
            ));
        }

        #[test]
        fn test_grain_qualified_matches_table_name() {
            let t1 = table("g", "t1", &["a"]);
            // Alias differs from the table name; the grain-qualified form
            // matches by name, not alias.
            let refs = [TableRef::new(&t1, "x")];

            let mut e = Expr::field_ref(Some("g"), Some("t1"), "a").unwrap();
            e.resolve_field_refs(&refs).unwrap();
            assert_eq!(e.expr_type(), ExprType::Numeric);

            let mut e = Expr::field_ref(Some("other"), Some("t1"), "a").unwrap();
            assert!(matches!(
                e.resolve_field_refs(&refs),
                Err(CelestaError::UnresolvedField { .. })
            ));
        }

        #[test]
        fn test_resolution_is_idempotent() {
            let t1 = table("g", "t1", &["a"]);
            let refs = [TableRef::new(&t1, "t1")];
            let mut e = Expr::field_ref(None, None, "a").unwrap();
            e.resolve_field_refs(&refs).unwrap();
            let bound = e.clone();
            // A second pass, even against an empty list, changes nothing.
            e.resolve_field_refs(&[]).unwrap();
            assert_eq!(e, bound);
        }
    }
}
