//! In-memory schema model for the Celesta schema-update engine.
//!
//! A [`Score`] is the process-wide collection of grains. Each [`Grain`] is a
//! named schema carrying tables, columns, keys, indices, sequences, views,
//! parameterized views and materialized views, together with a comparable
//! [`VersionString`] and a CRC-32 checksum of its CelestaSQL source. The
//! CelestaSQL expression subset used inside views lives in [`expr`], with a
//! lexer/parser pair for it in [`lex`] and [`parse`].
//!
//! The model is populated by an external grammar front end, then validated
//! and frozen via [`Score::resolve_references`], after which the updater
//! walks it to derive DDL.

pub mod column;
pub mod expr;
pub mod fk;
pub mod grain;
pub mod ident;
pub mod index;
pub mod lex;
pub mod parse;
pub mod score;
pub mod sequence;
pub mod table;
pub mod version;
pub mod view;

pub use column::{Column, ColumnKind, StringLength};
pub use expr::{Expr, ExprType, FieldBinding, LogicalOp, RelopKind, TableRef, TermOp};
pub use fk::ForeignKey;
pub use grain::{ElementKind, Grain, GrainElementReference};
pub use ident::{validate_identifier, MAX_IDENTIFIER_LENGTH};
pub use index::Index;
pub use parse::parse_expr;
pub use score::{element_update_order, Score, DEFAULT_SYS_SCHEMA_NAME};
pub use sequence::Sequence;
pub use table::{Table, TableElement, REC_VERSION};
pub use version::{VersionOrdering, VersionString};
pub use view::{
    FromRef, MaterializedView, Parameter, ParameterizedView, TriggerType, View, ViewColumn,
};
