//! Views, parameterized views and materialized views.
//!
//! A [`View`] is a named column list over declared table references with an
//! optional logical `WHERE` expression. A [`ParameterizedView`] adds declared
//! parameters. A [`MaterializedView`] behaves as a physical table fed from a
//! source table by triggers; its freshness is detected through a checksum
//! marker embedded in the source table's post-insert trigger body.

use std::fmt;

use indexmap::IndexMap;

use celesta_error::{CelestaError, CelestaResult};

use crate::column::Column;
use crate::expr::{Expr, ExprType, TableRef};
use crate::ident::validate_identifier;
use crate::table::TableElement;

/// Trigger kinds the updater maintains on source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    PostInsert,
    PostUpdate,
    PostDelete,
}

impl TriggerType {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::PostInsert => "insert",
            Self::PostUpdate => "update",
            Self::PostDelete => "delete",
        }
    }
}

/// One output column of a view: an alias and its defining expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewColumn {
    pub alias: String,
    pub expr: Expr,
}

/// A table reference in a view's `FROM` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromRef {
    pub grain: String,
    pub table: String,
    pub alias: String,
}

/// An ordinary (non-materialized) view.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    grain_name: String,
    name: String,
    columns: Vec<ViewColumn>,
    tables: Vec<FromRef>,
    where_clause: Option<Expr>,
}

impl View {
    pub fn new(grain_name: &str, name: &str) -> CelestaResult<Self> {
        validate_identifier(grain_name)?;
        validate_identifier(name)?;
        Ok(Self {
            grain_name: grain_name.to_owned(),
            name: name.to_owned(),
            columns: Vec::new(),
            tables: Vec::new(),
            where_clause: None,
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

    /// Add an output column under the given alias.
    pub fn add_column(&mut self, alias: &str, expr: Expr) -> CelestaResult<()> {
        validate_identifier(alias)?;
        if self.columns.iter().any(|c| c.alias == alias) {
            return Err(CelestaError::DuplicateColumn {
                element: self.name.clone(),
                column: alias.to_owned(),
            });
        }
        self.columns.push(ViewColumn {
            alias: alias.to_owned(),
            expr,
        });
        Ok(())
    }

    /// Add a table to the `FROM` list. An empty grain means the view's own
    /// grain; an empty alias defaults to the table name.
    pub fn add_table_ref(&mut self, grain: &str, table: &str, alias: &str) -> CelestaResult<()> {
        validate_identifier(table)?;
        let grain = if grain.is_empty() {
            self.grain_name.clone()
        } else {
            validate_identifier(grain)?.to_owned()
        };
        let alias = if alias.is_empty() {
            table.to_owned()
        } else {
            validate_identifier(alias)?.to_owned()
        };
        if self.tables.iter().any(|t| t.alias == alias) {
            return Err(CelestaError::DuplicateElement {
                grain: self.grain_name.clone(),
                name: alias,
            });
        }
        self.tables.push(FromRef {
            grain,
            table: table.to_owned(),
            alias,
        });
        Ok(())
    }

    pub fn set_where_clause(&mut self, expr: Expr) {
        self.where_clause = Some(expr);
    }

    #[must_use]
    pub fn columns(&self) -> &[ViewColumn] {
        &self.columns
    }

    #[must_use]
    pub fn table_refs(&self) -> &[FromRef] {
        &self.tables
    }

    #[must_use]
    pub fn where_clause(&self) -> Option<&Expr> {
        self.where_clause.as_ref()
    }

    /// Resolve all field references against the given declared tables, then
    /// type-check every expression. The `WHERE` clause must be logical.
    pub(crate) fn resolve_and_validate(&mut self, refs: &[TableRef<'_>]) -> CelestaResult<()> {
        for column in &mut self.columns {
            column.expr.resolve_field_refs(refs)?;
        }
        if let Some(where_clause) = &mut self.where_clause {
            where_clause.resolve_field_refs(refs)?;
        }
        for column in &self.columns {
            column.expr.validate_types()?;
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.validate_types()?;
            where_clause.assert_type(ExprType::Logic)?;
        }
        Ok(())
    }
}

impl fmt::Display for View {
    /// Canonical CelestaSQL `SELECT` text; part of the grain source the
    /// checksum is computed over.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} AS {}", column.expr, column.alias)?;
        }
        f.write_str(" FROM ")?;
        for (i, t) in self.tables.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}.{} AS {}", t.grain, t.table, t.alias)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {where_clause}")?;
        }
        Ok(())
    }
}

/// A declared parameter of a parameterized view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: ExprType,
}

/// A view taking declared parameters, dropped and recreated like a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedView {
    view: View,
    parameters: Vec<Parameter>,
}

impl ParameterizedView {
    pub fn new(grain_name: &str, name: &str) -> CelestaResult<Self> {
        Ok(Self {
            view: View::new(grain_name, name)?,
            parameters: Vec::new(),
        })
    }

    pub fn add_parameter(&mut self, name: &str, ty: ExprType) -> CelestaResult<()> {
        validate_identifier(name)?;
        if self.parameters.iter().any(|p| p.name == name) {
            return Err(CelestaError::DuplicateColumn {
                element: self.view.name.clone(),
                column: name.to_owned(),
            });
        }
        self.parameters.push(Parameter {
            name: name.to_owned(),
            ty,
        });
        Ok(())
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    #[must_use]
    pub fn grain_name(&self) -> &str {
        self.view.grain_name()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.view.name()
    }
}

/// A materialized view: a physical table fed from one source table.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedView {
    grain_name: String,
    name: String,
    ref_table: String,
    columns: IndexMap<String, Column>,
    pk: Vec<String>,
    query_text: String,
    checksum: u32,
}

impl MaterializedView {
    #[must_use]
    pub fn grain_name(&self) -> &str {
        &self.grain_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    /// Grouping columns, which form the view's primary key.
    #[must_use]
    pub fn pk(&self) -> &[String] {
        &self.pk
    }

    pub fn new(grain_name: &str, name: &str, ref_table: &str) -> CelestaResult<Self> {
        validate_identifier(grain_name)?;
        validate_identifier(name)?;
        validate_identifier(ref_table)?;
        Ok(Self {
            grain_name: grain_name.to_owned(),
            name: name.to_owned(),
            ref_table: ref_table.to_owned(),
            columns: IndexMap::new(),
            pk: Vec::new(),
            query_text: String::new(),
            checksum: 0,
        })
    }

    /// The source table (same grain) whose triggers feed this view.
    #[must_use]
    pub fn ref_table(&self) -> &str {
        &self.ref_table
    }

    /// Add an output column; `in_pk` marks grouping columns, which form the
    /// view's primary key.
    pub fn add_column(&mut self, column: Column, in_pk: bool) -> CelestaResult<()> {
        if self.columns.contains_key(column.name()) {
            return Err(CelestaError::DuplicateColumn {
                element: self.name.clone(),
                column: column.name().to_owned(),
            });
        }
        if in_pk {
            self.pk.push(column.name().to_owned());
        }
        self.columns.insert(column.name().to_owned(), column);
        Ok(())
    }

    /// Record the defining query text and derive the checksum from it.
    pub fn set_query_text(&mut self, text: &str) {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(text.as_bytes());
        self.checksum = hasher.finalize();
        self.query_text = text.to_owned();
    }

    #[must_use]
    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// CRC-32 of the defining query text.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// The marker comment the updater looks for inside the source table's
    /// post-insert trigger body.
    #[must_use]
    pub fn checksum_comment(&self) -> String {
        format!("/*MATERIALIZED VIEW CHECKSUM {:08X}*/", self.checksum)
    }

    /// Name of the trigger of the given kind on the source table.
    #[must_use]
    pub fn trigger_name(&self, trigger: TriggerType) -> String {
        format!("{}_on_{}", self.name, trigger.suffix())
    }
}

impl TableElement for MaterializedView {
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
        format!("pk_{}", self.name)
    }
}
