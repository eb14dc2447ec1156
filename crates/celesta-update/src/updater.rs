//! The updater state machine.
//!
//! [`DbUpdater::update_db`] reconciles a live database with the declared
//! score, one grain per transaction, in ascending dependency order. Upgrade
//! status is recorded per grain in `celesta.grains`: a grain is marked
//! `UPGRADING` (committed before any DDL), then either `READY` on success or
//! `ERROR` with a diagnostic message on failure. A failed grain rolls its
//! DDL back and the run proceeds with the remaining grains; the final result
//! reports whether any grain failed.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use celesta_error::{CelestaError, CelestaResult};
use celesta_score::{
    element_update_order, ElementKind, ForeignKey, Grain, GrainElementReference,
    MaterializedView, Score, Table, TriggerType, VersionOrdering, VersionString, REC_VERSION,
};

use crate::adaptor::{ConnectionPool, DbAdaptor, TriggerQuery};
use crate::meta::DbFkInfo;
use crate::syscursor::{GrainsState, SchemaCursor, TableType, TablesCursor};

/// Name of the master catalog table inside the system schema.
pub const SCHEMAS_TABLE_NAME: &str = "grains";

/// Hook points around each grain upgrade, for hosts that maintain their own
/// per-grain artifacts (row-cursor generators and the like).
pub trait UpdaterHooks<Conn> {
    fn before_grain_updating(&mut self, _conn: &mut Conn, _grain: &Grain) -> CelestaResult<()> {
        Ok(())
    }

    fn after_grain_updating(&mut self, _conn: &mut Conn, _grain: &Grain) -> CelestaResult<()> {
        Ok(())
    }
}

struct NoopHooks;

impl<Conn> UpdaterHooks<Conn> for NoopHooks {}

/// Buffered catalog row of one grain.
struct GrainInfo {
    recover: bool,
    lock: bool,
    length: u32,
    checksum: u32,
    version: VersionString,
}

/// Drives a full database schema upgrade against one score.
pub struct DbUpdater<A, P>
where
    A: DbAdaptor,
    P: ConnectionPool<Conn = A::Conn>,
{
    adaptor: A,
    pool: P,
    score: Score,
    force_dd_initialize: bool,
    schema_cursor: Box<dyn SchemaCursor<Conn = A::Conn>>,
    tables_cursor: Option<Box<dyn TablesCursor<Conn = A::Conn>>>,
    hooks: Box<dyn UpdaterHooks<A::Conn>>,
}

impl<A, P> DbUpdater<A, P>
where
    A: DbAdaptor,
    P: ConnectionPool<Conn = A::Conn>,
{
    pub fn new(
        pool: P,
        adaptor: A,
        score: Score,
        force_dd_initialize: bool,
        schema_cursor: Box<dyn SchemaCursor<Conn = A::Conn>>,
    ) -> Self {
        Self {
            adaptor,
            pool,
            score,
            force_dd_initialize,
            schema_cursor,
            tables_cursor: None,
            hooks: Box::new(NoopHooks),
        }
    }

    /// Maintain the `celesta.tables` inventory during upgrades.
    #[must_use]
    pub fn with_tables_cursor(mut self, cursor: Box<dyn TablesCursor<Conn = A::Conn>>) -> Self {
        self.tables_cursor = Some(cursor);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Box<dyn UpdaterHooks<A::Conn>>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn score(&self) -> &Score {
        &self.score
    }

    /// Ensure the system schema and its catalog exist, bootstrapping them in
    /// an empty database.
    pub fn update_system_schema(&mut self) -> CelestaResult<()> {
        let mut conn = self.pool.get()?;
        self.ensure_system_schema(&mut conn)
    }

    /// Perform the full upgrade: every declared grain, in dependency order.
    pub fn update_db(&mut self) -> CelestaResult<()> {
        let mut conn = self.pool.get()?;
        self.ensure_system_schema(&mut conn)?;
        let sys_schema = self.score.sys_schema_name().to_owned();

        // Snapshot the catalog. Only READY, RECOVER, LOCK and UPGRADING rows
        // are acceptable; an interrupted run left UPGRADING behind, which is
        // treated as RECOVER. ERROR rows demand manual intervention.
        let mut db_grains: HashMap<String, GrainInfo> = HashMap::new();
        while self.schema_cursor.next_in_set(&mut conn)? {
            let state = self.schema_cursor.state();
            if state == GrainsState::Error {
                return Err(CelestaError::UnexpectedState {
                    table: SCHEMAS_TABLE_NAME.to_owned(),
                });
            }
            let checksum =
                u32::from_str_radix(self.schema_cursor.checksum(), 16).map_err(|_| {
                    CelestaError::parse(format!(
                        "error while scanning {sys_schema}.{SCHEMAS_TABLE_NAME} table: \
                         bad checksum '{}'",
                        self.schema_cursor.checksum()
                    ))
                })?;
            let version = VersionString::new(self.schema_cursor.version()).map_err(|e| {
                CelestaError::parse(format!(
                    "error while scanning {sys_schema}.{SCHEMAS_TABLE_NAME} table: {e}"
                ))
            })?;
            db_grains.insert(
                self.schema_cursor.id().to_owned(),
                GrainInfo {
                    recover: matches!(state, GrainsState::Recover | GrainsState::Upgrading),
                    lock: state == GrainsState::Lock,
                    length: self.schema_cursor.length(),
                    checksum,
                    version,
                },
            );
        }

        let grain_names: Vec<String> = self
            .score
            .grains_in_dependency_order()
            .iter()
            .map(|g| g.name().to_owned())
            .collect();

        let mut success = true;
        for name in grain_names {
            let grain = self.score.grain(&name).expect("declared grain").clone();
            match db_grains.get(&name) {
                None => {
                    // First sight of this grain: registered dirty, then
                    // upgraded unconditionally.
                    self.insert_grain_rec(&mut conn, &grain)?;
                }
                Some(info) => {
                    if !self.need_to_upgrade(&grain, info)? {
                        debug!(grain = name.as_str(), "grain is up to date, skipping");
                        continue;
                    }
                }
            }
            success = self.update_grain(&mut conn, &grain)? && success;
        }

        if success {
            Ok(())
        } else {
            Err(CelestaError::UpgradeIncomplete {
                schema: sys_schema,
                table: SCHEMAS_TABLE_NAME.to_owned(),
            })
        }
    }

    fn ensure_system_schema(&mut self, conn: &mut A::Conn) -> CelestaResult<()> {
        let sys_schema = self.score.sys_schema_name().to_owned();
        if self
            .adaptor
            .table_exists(conn, &sys_schema, SCHEMAS_TABLE_NAME)?
        {
            return Ok(());
        }
        // No master catalog. A populated database without one is refused
        // unless the host explicitly forces initialization.
        if self.adaptor.user_tables_exist(conn)? && !self.force_dd_initialize {
            return Err(CelestaError::NonEmptyDb {
                schema: sys_schema,
                table: SCHEMAS_TABLE_NAME.to_owned(),
            });
        }
        self.update_sys_grain(conn)
    }

    /// Bootstrap the system grain: create its schema and master table, then
    /// run the ordinary single-grain upgrade on it.
    fn update_sys_grain(&mut self, conn: &mut A::Conn) -> CelestaResult<()> {
        let sys_schema = self.score.sys_schema_name().to_owned();
        info!(schema = sys_schema.as_str(), "bootstrapping system schema");
        let sys = self
            .score
            .grain(&sys_schema)
            .cloned()
            .ok_or_else(|| CelestaError::UnknownGrain {
                name: sys_schema.clone(),
            })?;

        self.adaptor.create_schema_if_not_exists(conn, &sys_schema)?;
        let grains_table =
            sys.table(SCHEMAS_TABLE_NAME)
                .ok_or_else(|| CelestaError::UnknownElement {
                    grain: sys_schema.clone(),
                    name: SCHEMAS_TABLE_NAME.to_owned(),
                })?;
        self.adaptor.create_table(conn, grains_table)?;
        self.adaptor.create_sys_objects(conn, &sys_schema)?;

        self.insert_grain_rec(conn, &sys)?;
        if self.update_grain(conn, &sys)? {
            Ok(())
        } else {
            Err(CelestaError::UpgradeIncomplete {
                schema: sys_schema,
                table: SCHEMAS_TABLE_NAME.to_owned(),
            })
        }
    }

    fn insert_grain_rec(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        self.schema_cursor.init();
        self.schema_cursor.set_id(grain.name());
        self.schema_cursor.set_version(&grain.version().to_string());
        self.schema_cursor.set_length(grain.length());
        self.schema_cursor
            .set_checksum(&format!("{:08X}", grain.checksum()));
        self.schema_cursor.set_state(GrainsState::Recover);
        self.schema_cursor.set_lastmodified_now();
        self.schema_cursor.set_message("");
        self.schema_cursor.insert(conn)
    }

    /// Decide whether a grain with an existing catalog row needs DDL work.
    fn need_to_upgrade(&self, grain: &Grain, info: &GrainInfo) -> CelestaResult<bool> {
        if info.lock {
            return Ok(false);
        }
        if info.recover {
            return Ok(true);
        }
        match grain.version().compare(&info.version) {
            VersionOrdering::Lower => Err(CelestaError::VersionDowngrade {
                grain: grain.name().to_owned(),
                declared: grain.version().to_string(),
                stored: info.version.to_string(),
            }),
            VersionOrdering::Inconsistent => Err(CelestaError::VersionInconsistent {
                grain: grain.name().to_owned(),
                declared: grain.version().to_string(),
                stored: info.version.to_string(),
            }),
            VersionOrdering::Greater => Ok(true),
            VersionOrdering::Equals => {
                // Same version: upgrade only when the source changed.
                Ok(info.length != grain.length() || info.checksum != grain.checksum())
            }
        }
    }

    /// Upgrade one grain. `Ok(false)` means the grain failed and was parked
    /// in ERROR state; hard catalog failures propagate as errors.
    fn update_grain(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<bool> {
        info!(grain = grain.name(), "upgrading grain");
        if !self.schema_cursor.get(conn, grain.name())? {
            return Err(CelestaError::ddl(format!(
                "no catalog row for grain '{}'",
                grain.name()
            )));
        }
        // The UPGRADING mark is committed before any DDL so that it survives
        // a rollback of the grain's transaction.
        self.schema_cursor.set_state(GrainsState::Upgrading);
        self.schema_cursor.update(conn)?;
        self.pool.commit(conn)?;

        match self.upgrade_grain_schema(conn, grain) {
            Ok(()) => {
                self.schema_cursor.set_state(GrainsState::Ready);
                self.schema_cursor
                    .set_checksum(&format!("{:08X}", grain.checksum()));
                self.schema_cursor.set_length(grain.length());
                self.schema_cursor.set_lastmodified_now();
                self.schema_cursor.set_message("");
                self.schema_cursor
                    .set_version(&grain.version().to_string());
                self.schema_cursor.update(conn)?;
                self.pool.commit(conn)?;
                info!(grain = grain.name(), "grain is ready");
                Ok(true)
            }
            Err(e) => {
                error!(grain = grain.name(), error = %e, "grain upgrade failed");
                let mut rollback_note = String::new();
                if let Err(rollback_err) = self.pool.rollback(conn) {
                    rollback_note = format!(", {rollback_err}");
                }
                self.schema_cursor.set_state(GrainsState::Error);
                self.schema_cursor.set_message(&format!(
                    "{}/{}/{:08X}: {}{}",
                    grain.version(),
                    grain.length(),
                    grain.checksum(),
                    e,
                    rollback_note
                ));
                self.schema_cursor.update(conn)?;
                self.pool.commit(conn)?;
                Ok(false)
            }
        }
    }

    /// The fixed phase sequence of one grain upgrade.
    fn upgrade_grain_schema(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        self.adaptor.create_schema_if_not_exists(conn, grain.name())?;
        self.hooks.before_grain_updating(conn, grain)?;

        // Views go first: they would block column changes underneath them.
        for view_name in self.adaptor.get_view_list(conn, grain)? {
            self.adaptor.drop_view(conn, grain.name(), &view_name)?;
        }
        for view_name in self.adaptor.get_parameterized_view_list(conn, grain)? {
            self.adaptor
                .drop_parameterized_view(conn, grain.name(), &view_name)?;
        }

        self.drop_orphaned_grain_indices(conn, grain)?;
        let mut db_fkeys = self.drop_orphaned_grain_fkeys(conn, grain)?;

        self.update_sequences(conn, grain)?;

        let table_order = self.ordered_elements(grain, ElementKind::Table);
        let mut modified_tables: HashSet<String> = HashSet::new();
        for name in &table_order {
            let table = grain.table(name).expect("ordered from model");
            if self.update_table(conn, table, &mut db_fkeys)? {
                modified_tables.insert(name.clone());
            }
        }

        self.update_grain_indices(conn, grain)?;
        self.update_grain_fkeys(conn, grain)?;

        for name in &self.ordered_elements(grain, ElementKind::View) {
            let view = grain.views().get(name).expect("ordered from model");
            self.adaptor.create_view(conn, view)?;
        }
        for name in &self.ordered_elements(grain, ElementKind::ParameterizedView) {
            let view = grain
                .parameterized_views()
                .get(name)
                .expect("ordered from model");
            self.adaptor.create_parameterized_view(conn, view)?;
        }

        for mv in grain.materialized_views().values() {
            let ref_modified = modified_tables.contains(mv.ref_table());
            self.update_materialized_view(conn, grain, mv, ref_modified)?;
        }

        for name in &table_order {
            let table = grain.table(name).expect("ordered from model");
            let views = grain.materialized_views_of(table.name());
            self.adaptor
                .drop_table_triggers_for_materialized_views(conn, table, &views)?;
            self.adaptor
                .create_table_triggers_for_materialized_views(conn, table, &views)?;
        }

        self.process_grain_meta(conn, grain)?;
        self.hooks.after_grain_updating(conn, grain)?;
        Ok(())
    }

    /// Names of the grain's elements of one kind, referenced elements first.
    fn ordered_elements(&self, grain: &Grain, kind: ElementKind) -> Vec<String> {
        let names: Vec<String> = match kind {
            ElementKind::Table => grain.tables().keys().cloned().collect(),
            ElementKind::View => grain.views().keys().cloned().collect(),
            ElementKind::ParameterizedView => {
                grain.parameterized_views().keys().cloned().collect()
            }
            ElementKind::Sequence => grain.sequences().keys().cloned().collect(),
            ElementKind::Index => grain.indices().keys().cloned().collect(),
            ElementKind::MaterializedView => {
                grain.materialized_views().keys().cloned().collect()
            }
        };
        let refs = names
            .into_iter()
            .map(|name| GrainElementReference {
                grain_name: grain.name().to_owned(),
                element_name: name,
                kind,
            })
            .collect();
        element_update_order(&self.score, refs)
            .into_iter()
            .map(|r| r.element_name)
            .collect()
    }

    /// Bring one table up to date; `Ok(true)` when anything changed.
    fn update_table(
        &mut self,
        conn: &mut A::Conn,
        table: &Table,
        db_fkeys: &mut Vec<DbFkInfo>,
    ) -> CelestaResult<bool> {
        if !table.is_autoupdate() {
            debug!(table = table.name(), "table is NO AUTOUPDATE, skipping");
            return Ok(false);
        }

        if !self
            .adaptor
            .table_exists(conn, table.grain_name(), table.name())?
        {
            self.adaptor.create_table(conn, table)?;
            return Ok(true);
        }

        let db_columns = self.adaptor.get_columns(conn, table)?;
        let mut modified = self.update_columns(conn, table, &db_columns, db_fkeys)?;

        // Versioned tables carry the implicit recversion column.
        if table.is_versioned() {
            let rec_version = table.rec_version_column();
            if db_columns.contains(REC_VERSION) {
                match self.adaptor.get_column_info(conn, table, &rec_version)? {
                    Some(info) if !info.reflects(&rec_version) => {
                        self.adaptor
                            .update_column(conn, table, &rec_version, &info)?;
                        modified = true;
                    }
                    Some(_) => {}
                    None => {
                        self.adaptor.create_column(conn, table, &rec_version)?;
                        modified = true;
                    }
                }
            } else {
                self.adaptor.create_column(conn, table, &rec_version)?;
                modified = true;
            }
        }

        // The key may be missing or may have been dropped by the column
        // diff; recreate it from the model either way.
        let pk_info = self.adaptor.get_pk_info(conn, table)?;
        if pk_info.is_empty() {
            self.adaptor.create_pk(conn, table)?;
        }

        if modified {
            self.adaptor
                .manage_auto_increment(conn, table)
                .map_err(|e| {
                    CelestaError::ddl(format!(
                        "updating table {}.{} failed: {e}",
                        table.grain_name(),
                        table.name()
                    ))
                })?;
        }

        self.adaptor.update_versioning_trigger(conn, table)?;
        Ok(modified)
    }

    /// Diff the declared columns against the live ones.
    fn update_columns(
        &mut self,
        conn: &mut A::Conn,
        table: &Table,
        db_columns: &HashSet<String>,
        db_fkeys: &mut Vec<DbFkInfo>,
    ) -> CelestaResult<bool> {
        let pk_info = self.adaptor.get_pk_info(conn, table)?;
        let mut modified = false;
        let mut key_dropped = pk_info.is_empty();

        // A stale key is dropped up front, along with every FK aimed at it.
        if !(pk_info.reflects(table) || key_dropped) {
            self.drop_referenced_fks(conn, table, db_fkeys)?;
            self.adaptor.drop_pk(conn, table, &pk_info.name)?;
            key_dropped = true;
        }

        for (name, column) in table.columns() {
            if db_columns.contains(name) {
                let Some(info) = self.adaptor.get_column_info(conn, table, column)? else {
                    return Err(CelestaError::ddl(format!(
                        "no column info for {}.{}",
                        table.name(),
                        name
                    )));
                };
                if !info.reflects(column) {
                    // Altering a key column requires the key to be gone.
                    if table.pk().contains(name) && !key_dropped {
                        self.drop_referenced_fks(conn, table, db_fkeys)?;
                        self.adaptor.drop_pk(conn, table, &pk_info.name)?;
                        key_dropped = true;
                    }
                    self.adaptor.update_column(conn, table, column, &info)?;
                    modified = true;
                }
            } else {
                self.adaptor.create_column(conn, table, column)?;
                modified = true;
            }
        }
        Ok(modified)
    }

    /// Drop every live FK pointing at the given table, removing it from the
    /// remaining-FK list.
    fn drop_referenced_fks(
        &mut self,
        conn: &mut A::Conn,
        table: &Table,
        db_fkeys: &mut Vec<DbFkInfo>,
    ) -> CelestaResult<()> {
        let mut i = 0;
        while i < db_fkeys.len() {
            if db_fkeys[i].ref_grain_name == table.grain_name()
                && db_fkeys[i].ref_table_name == table.name()
            {
                let fk = db_fkeys.remove(i);
                self.adaptor
                    .drop_fk(conn, table.grain_name(), &fk.table_name, &fk.name)?;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Drop indices that are gone from the model, diverge from it, or touch
    /// a column that the upcoming column diff will alter. Clearing them
    /// first keeps them from blocking the column changes.
    fn drop_orphaned_grain_indices(
        &mut self,
        conn: &mut A::Conn,
        grain: &Grain,
    ) -> CelestaResult<()> {
        let db_indices = self.adaptor.get_indices(conn, grain)?;
        let my_indices = grain.indices();

        for db_index in db_indices.values() {
            if !my_indices.contains_key(&db_index.index_name) {
                warn!(
                    index = db_index.index_name.as_str(),
                    "dropping orphaned index"
                );
                self.adaptor.drop_index(conn, grain.name(), db_index)?;
            }
        }

        for (name, index) in my_indices {
            let Some(db_index) = db_indices.get(name) else {
                continue;
            };
            if !db_index.reflects(index) {
                self.adaptor.drop_index(conn, grain.name(), db_index)?;
                continue;
            }
            let table = grain
                .table(index.table_name())
                .ok_or_else(|| CelestaError::UnknownElement {
                    grain: grain.name().to_owned(),
                    name: index.table_name().to_owned(),
                })?;
            for column_name in index.columns() {
                let column =
                    table
                        .column(column_name)
                        .ok_or_else(|| CelestaError::UnknownColumn {
                            element: table.name().to_owned(),
                            column: column_name.clone(),
                        })?;
                let info = self.adaptor.get_column_info(conn, table, column)?;
                if info.map_or(true, |ci| !ci.reflects(column)) {
                    self.adaptor.drop_index(conn, grain.name(), db_index)?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Drop live FKs with no matching declared key, returning the survivors.
    fn drop_orphaned_grain_fkeys(
        &mut self,
        conn: &mut A::Conn,
        grain: &Grain,
    ) -> CelestaResult<Vec<DbFkInfo>> {
        let mut db_fkeys = self.adaptor.get_fk_info(conn, grain)?;
        let mut model_fks: HashMap<&str, &ForeignKey> = HashMap::new();
        for table in grain.tables().values() {
            for fk in table.foreign_keys() {
                model_fks.insert(fk.constraint_name(), fk);
            }
        }
        let mut i = 0;
        while i < db_fkeys.len() {
            let keep = model_fks
                .get(db_fkeys[i].name.as_str())
                .is_some_and(|fk| db_fkeys[i].reflects(fk));
            if keep {
                i += 1;
            } else {
                let db_fk = db_fkeys.remove(i);
                warn!(fk = db_fk.name.as_str(), "dropping orphaned foreign key");
                self.adaptor
                    .drop_fk(conn, grain.name(), &db_fk.table_name, &db_fk.name)?;
            }
        }
        Ok(db_fkeys)
    }

    fn update_sequences(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        for sequence in grain.sequences().values() {
            if self
                .adaptor
                .sequence_exists(conn, grain.name(), sequence.name())?
            {
                let info = self.adaptor.get_sequence_info(conn, sequence)?;
                if !info.reflects(sequence) {
                    self.adaptor.alter_sequence(conn, sequence)?;
                }
            } else {
                self.adaptor.create_sequence(conn, sequence)?;
            }
        }
        Ok(())
    }

    fn update_grain_indices(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        let db_indices = self.adaptor.get_indices(conn, grain)?;
        for (name, index) in grain.indices() {
            match db_indices.get(name) {
                Some(db_index) => {
                    if !db_index.reflects(index) {
                        self.adaptor.drop_index(conn, grain.name(), db_index)?;
                        self.adaptor.create_index(conn, index)?;
                    }
                }
                None => self.adaptor.create_index(conn, index)?,
            }
        }
        Ok(())
    }

    fn update_grain_fkeys(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        let db_fkeys: HashMap<String, DbFkInfo> = self
            .adaptor
            .get_fk_info(conn, grain)?
            .into_iter()
            .map(|fk| (fk.name.clone(), fk))
            .collect();
        for table in grain.tables().values() {
            if !table.is_autoupdate() {
                continue;
            }
            for fk in table.foreign_keys() {
                match db_fkeys.get(fk.constraint_name()) {
                    Some(db_fk) => {
                        if !db_fk.reflects(fk) {
                            self.adaptor.drop_fk(
                                conn,
                                grain.name(),
                                &db_fk.table_name,
                                &db_fk.name,
                            )?;
                            self.adaptor.create_fk(conn, grain.name(), fk)?;
                        }
                    }
                    None => self.adaptor.create_fk(conn, grain.name(), fk)?,
                }
            }
        }
        Ok(())
    }

    /// Refresh one materialized view unless it is provably up to date: the
    /// view exists, its source table was untouched this run, and the source
    /// table's post-insert trigger still carries the view's checksum marker.
    fn update_materialized_view(
        &mut self,
        conn: &mut A::Conn,
        grain: &Grain,
        view: &MaterializedView,
        ref_table_modified: bool,
    ) -> CelestaResult<()> {
        let exists = self
            .adaptor
            .table_exists(conn, grain.name(), view.name())?;
        if exists {
            if !ref_table_modified {
                let query = TriggerQuery::for_materialized_view(view, TriggerType::PostInsert);
                let body = self.adaptor.get_trigger_body(conn, &query)?;
                if body.is_some_and(|b| b.contains(&view.checksum_comment())) {
                    debug!(view = view.name(), "materialized view is fresh, skipping");
                    return Ok(());
                }
            }
            self.adaptor.drop_table(conn, view)?;
        }
        self.adaptor.create_table(conn, view)?;
        self.adaptor.init_data_for_materialized_view(conn, view)
    }

    /// Maintain the `celesta.tables` inventory: upsert every declared table
    /// and materialized view, and flag rows whose object left the model.
    fn process_grain_meta(&mut self, conn: &mut A::Conn, grain: &Grain) -> CelestaResult<()> {
        let Some(cursor) = self.tables_cursor.as_mut() else {
            return Ok(());
        };

        let mut model_names: HashSet<&str> = HashSet::new();
        let mut entries: Vec<(&str, TableType)> = Vec::new();
        for name in grain.tables().keys() {
            model_names.insert(name);
            entries.push((name, TableType::Table));
        }
        for name in grain.materialized_views().keys() {
            model_names.insert(name);
            entries.push((name, TableType::MaterializedView));
        }

        for (name, table_type) in entries {
            if cursor.get(conn, grain.name(), name)? {
                cursor.set_tabletype(table_type);
                cursor.set_orphaned(false);
                cursor.update(conn)?;
            } else {
                cursor.init();
                cursor.set_grainid(grain.name());
                cursor.set_tablename(name);
                cursor.set_tabletype(table_type);
                cursor.set_orphaned(false);
                cursor.insert(conn)?;
            }
        }

        let mut orphans: Vec<String> = Vec::new();
        while cursor.next_in_grain(conn, grain.name())? {
            if !model_names.contains(cursor.tablename()) {
                orphans.push(cursor.tablename().to_owned());
            }
        }
        for name in orphans {
            if cursor.get(conn, grain.name(), &name)? {
                cursor.set_orphaned(true);
                cursor.update(conn)?;
            }
        }
        Ok(())
    }
}
