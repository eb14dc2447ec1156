//! The dependency-ordered database updater.
//!
//! [`updater::DbUpdater`] compares the declared schema model against
//! introspected database metadata (the `Db*Info` DTOs of [`meta`]) and issues
//! the safe DDL sequence through a dialect-specific [`adaptor::DbAdaptor`],
//! recording per-grain status in the `celesta.grains` system catalog table
//! through the cursor contracts of [`syscursor`].

pub mod adaptor;
pub mod meta;
pub mod syscursor;
pub mod updater;

pub use adaptor::{ConnectionPool, DbAdaptor, TriggerQuery};
pub use meta::{DbColumnInfo, DbColumnType, DbFkInfo, DbIndexInfo, DbPkInfo, DbSequenceInfo};
pub use syscursor::{system_grain, GrainsState, SchemaCursor, TableType, TablesCursor};
pub use updater::{DbUpdater, UpdaterHooks, SCHEMAS_TABLE_NAME};
