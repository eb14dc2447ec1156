//! The database adaptor capability contract.
//!
//! The updater is dialect-agnostic: every piece of DDL and every metadata
//! query goes through [`DbAdaptor`]. An implementation exists per supported
//! backend; connections are opaque to the core and flow from a
//! [`ConnectionPool`], whose `commit` is the only way catalog status writes
//! become durable.

use std::collections::{HashMap, HashSet};

use celesta_error::CelestaResult;
use celesta_score::{
    Column, ForeignKey, Grain, Index, MaterializedView, ParameterizedView, Sequence, Table,
    TableElement, TriggerType, View,
};

use crate::meta::{DbColumnInfo, DbFkInfo, DbIndexInfo, DbPkInfo, DbSequenceInfo};

/// Identifies one trigger for [`DbAdaptor::get_trigger_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerQuery {
    pub schema: String,
    pub table_name: String,
    pub name: String,
}

impl TriggerQuery {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: String::new(),
            table_name: String::new(),
            name: String::new(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_owned();
        self
    }

    #[must_use]
    pub fn with_table_name(mut self, table_name: &str) -> Self {
        self.table_name = table_name.to_owned();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// The query for the trigger of the given kind feeding `mv`.
    #[must_use]
    pub fn for_materialized_view(mv: &MaterializedView, trigger: TriggerType) -> Self {
        Self::new()
            .with_schema(mv.grain_name())
            .with_table_name(mv.ref_table())
            .with_name(&mv.trigger_name(trigger))
    }
}

impl Default for TriggerQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out and finalizes connections. `commit` makes everything written
/// through the connection durable; `rollback` discards uncommitted work.
pub trait ConnectionPool {
    type Conn;

    fn get(&self) -> CelestaResult<Self::Conn>;
    fn commit(&self, conn: &mut Self::Conn) -> CelestaResult<()>;
    fn rollback(&self, conn: &mut Self::Conn) -> CelestaResult<()>;
}

/// Dialect-specific DDL and metadata capabilities the updater relies on.
#[allow(clippy::missing_errors_doc)]
pub trait DbAdaptor {
    type Conn;

    // --- Schemas ---
    fn table_exists(&self, conn: &mut Self::Conn, schema: &str, name: &str)
        -> CelestaResult<bool>;
    fn user_tables_exist(&self, conn: &mut Self::Conn) -> CelestaResult<bool>;
    fn create_schema_if_not_exists(&self, conn: &mut Self::Conn, name: &str) -> CelestaResult<()>;

    // --- Tables and columns ---
    fn create_table(&self, conn: &mut Self::Conn, table: &dyn TableElement) -> CelestaResult<()>;
    fn drop_table(&self, conn: &mut Self::Conn, table: &dyn TableElement) -> CelestaResult<()>;
    fn get_columns(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
    ) -> CelestaResult<HashSet<String>>;
    fn create_column(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
        column: &Column,
    ) -> CelestaResult<()>;
    fn update_column(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
        column: &Column,
        db_info: &DbColumnInfo,
    ) -> CelestaResult<()>;
    fn get_column_info(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
        column: &Column,
    ) -> CelestaResult<Option<DbColumnInfo>>;
    /// Re-align the identity/sequence machinery after column changes.
    fn manage_auto_increment(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
    ) -> CelestaResult<()>;

    // --- Keys ---
    fn get_pk_info(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
    ) -> CelestaResult<DbPkInfo>;
    fn create_pk(&self, conn: &mut Self::Conn, table: &dyn TableElement) -> CelestaResult<()>;
    fn drop_pk(
        &self,
        conn: &mut Self::Conn,
        table: &dyn TableElement,
        pk_name: &str,
    ) -> CelestaResult<()>;
    fn get_fk_info(&self, conn: &mut Self::Conn, grain: &Grain) -> CelestaResult<Vec<DbFkInfo>>;
    fn create_fk(&self, conn: &mut Self::Conn, schema: &str, fk: &ForeignKey) -> CelestaResult<()>;
    fn drop_fk(
        &self,
        conn: &mut Self::Conn,
        schema: &str,
        table_name: &str,
        fk_name: &str,
    ) -> CelestaResult<()>;

    // --- Indices ---
    fn get_indices(
        &self,
        conn: &mut Self::Conn,
        grain: &Grain,
    ) -> CelestaResult<HashMap<String, DbIndexInfo>>;
    fn create_index(&self, conn: &mut Self::Conn, index: &Index) -> CelestaResult<()>;
    fn drop_index(
        &self,
        conn: &mut Self::Conn,
        schema: &str,
        index: &DbIndexInfo,
    ) -> CelestaResult<()>;

    // --- Sequences ---
    fn sequence_exists(
        &self,
        conn: &mut Self::Conn,
        schema: &str,
        name: &str,
    ) -> CelestaResult<bool>;
    fn get_sequence_info(
        &self,
        conn: &mut Self::Conn,
        sequence: &Sequence,
    ) -> CelestaResult<DbSequenceInfo>;
    fn create_sequence(&self, conn: &mut Self::Conn, sequence: &Sequence) -> CelestaResult<()>;
    fn alter_sequence(&self, conn: &mut Self::Conn, sequence: &Sequence) -> CelestaResult<()>;

    // --- Views ---
    fn get_view_list(&self, conn: &mut Self::Conn, grain: &Grain) -> CelestaResult<Vec<String>>;
    fn create_view(&self, conn: &mut Self::Conn, view: &View) -> CelestaResult<()>;
    fn drop_view(&self, conn: &mut Self::Conn, schema: &str, name: &str) -> CelestaResult<()>;
    fn get_parameterized_view_list(
        &self,
        conn: &mut Self::Conn,
        grain: &Grain,
    ) -> CelestaResult<Vec<String>>;
    fn create_parameterized_view(
        &self,
        conn: &mut Self::Conn,
        view: &ParameterizedView,
    ) -> CelestaResult<()>;
    fn drop_parameterized_view(
        &self,
        conn: &mut Self::Conn,
        schema: &str,
        name: &str,
    ) -> CelestaResult<()>;

    // --- Triggers and materialized views ---
    fn get_trigger_body(
        &self,
        conn: &mut Self::Conn,
        query: &TriggerQuery,
    ) -> CelestaResult<Option<String>>;
    fn drop_table_triggers_for_materialized_views(
        &self,
        conn: &mut Self::Conn,
        table: &Table,
        views: &[&MaterializedView],
    ) -> CelestaResult<()>;
    fn create_table_triggers_for_materialized_views(
        &self,
        conn: &mut Self::Conn,
        table: &Table,
        views: &[&MaterializedView],
    ) -> CelestaResult<()>;
    fn update_versioning_trigger(&self, conn: &mut Self::Conn, table: &Table)
        -> CelestaResult<()>;
    /// Populate a freshly created materialized view from its source table.
    fn init_data_for_materialized_view(
        &self,
        conn: &mut Self::Conn,
        view: &MaterializedView,
    ) -> CelestaResult<()>;

    // --- System bootstrap ---
    /// Create auxiliary system objects after the system schema and the
    /// `grains` table exist.
    fn create_sys_objects(&self, conn: &mut Self::Conn, sys_schema_name: &str)
        -> CelestaResult<()>;
}
