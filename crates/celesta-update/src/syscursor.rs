//! System catalog cursor contracts.
//!
//! The updater records per-grain upgrade status in `celesta.grains` and the
//! table inventory in `celesta.tables`. Access goes through the typed cursor
//! traits here; concrete cursors are provided by the data-access layer. The
//! catalog tables themselves are part of the system grain, built
//! programmatically by [`system_grain`].

use celesta_error::{CelestaError, CelestaResult};
use celesta_score::{Column, ColumnKind, Grain, StringLength, Table};

/// Grain upgrade status, as stored in `celesta.grains.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum GrainsState {
    /// Upgraded and consistent.
    Ready = 0,
    /// An upgrade is in progress (or was cut short by a crash).
    Upgrading = 1,
    /// The last upgrade failed; see the `message` column.
    Error = 2,
    /// Row exists but the physical schema is presumed dirty; upgrade
    /// unconditionally next run.
    Recover = 3,
    /// Do not touch this grain.
    Lock = 4,
}

impl GrainsState {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for GrainsState {
    type Error = CelestaError;

    fn try_from(value: i32) -> Result<Self, CelestaError> {
        match value {
            0 => Ok(Self::Ready),
            1 => Ok(Self::Upgrading),
            2 => Ok(Self::Error),
            3 => Ok(Self::Recover),
            4 => Ok(Self::Lock),
            other => Err(CelestaError::parse(format!(
                "illegal grain state code {other}"
            ))),
        }
    }
}

/// Typed row access to `celesta.grains`.
///
/// A cursor is a one-row buffer plus navigation: `init` clears the buffer,
/// `get` fetches by primary key, `next_in_set` iterates all rows (and resets
/// once exhausted, so a fresh iteration can start), `insert`/`update` write
/// the buffer out. Writes become durable only at
/// [`crate::adaptor::ConnectionPool::commit`].
pub trait SchemaCursor {
    type Conn;

    /// Clear the row buffer.
    fn init(&mut self);
    /// Fetch the row with the given id into the buffer.
    fn get(&mut self, conn: &mut Self::Conn, id: &str) -> CelestaResult<bool>;
    /// Step to the next row of the table; `false` when exhausted.
    fn next_in_set(&mut self, conn: &mut Self::Conn) -> CelestaResult<bool>;
    /// Insert the buffer as a new row.
    fn insert(&mut self, conn: &mut Self::Conn) -> CelestaResult<()>;
    /// Write the buffer over the row with the buffer's id.
    fn update(&mut self, conn: &mut Self::Conn) -> CelestaResult<()>;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: &str);
    fn version(&self) -> &str;
    fn set_version(&mut self, version: &str);
    fn length(&self) -> u32;
    fn set_length(&mut self, length: u32);
    /// Checksum as uppercase 8-hex-digit text.
    fn checksum(&self) -> &str;
    fn set_checksum(&mut self, checksum: &str);
    fn state(&self) -> GrainsState;
    fn set_state(&mut self, state: GrainsState);
    /// Stamp the row with the current time.
    fn set_lastmodified_now(&mut self);
    fn message(&self) -> &str;
    fn set_message(&mut self, message: &str);
}

/// Value of the `tabletype` column of `celesta.tables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TableType {
    #[default]
    Table,
    MaterializedView,
}

impl TableType {
    /// The code stored in the catalog.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Table => "T",
            Self::MaterializedView => "M",
        }
    }
}

/// Typed row access to `celesta.tables`.
pub trait TablesCursor {
    type Conn;

    fn init(&mut self);
    /// Fetch the row with the given key into the buffer.
    fn get(
        &mut self,
        conn: &mut Self::Conn,
        grainid: &str,
        tablename: &str,
    ) -> CelestaResult<bool>;
    /// Step through the rows of one grain; `false` when exhausted.
    fn next_in_grain(&mut self, conn: &mut Self::Conn, grainid: &str) -> CelestaResult<bool>;
    fn insert(&mut self, conn: &mut Self::Conn) -> CelestaResult<()>;
    fn update(&mut self, conn: &mut Self::Conn) -> CelestaResult<()>;

    fn grainid(&self) -> &str;
    fn set_grainid(&mut self, grainid: &str);
    fn tablename(&self) -> &str;
    fn set_tablename(&mut self, tablename: &str);
    fn tabletype(&self) -> TableType;
    fn set_tabletype(&mut self, tabletype: TableType);
    /// Whether the table exists in the database but not in the grain's
    /// current metadata.
    fn orphaned(&self) -> bool;
    fn set_orphaned(&mut self, orphaned: bool);
}

/// CelestaSQL source of the system grain; the system grain's length and
/// checksum are computed over this text.
pub const SYSTEM_GRAIN_SOURCE: &str = "\
create grain celesta version 'celesta 1.0';\n\
create table grains(\n\
  id varchar(30) not null primary key,\n\
  version varchar(2000) not null,\n\
  length int not null,\n\
  checksum varchar(8) not null,\n\
  state int not null default 3,\n\
  lastmodified datetime not null default getdate(),\n\
  message text not null\n\
);\n\
create table tables(\n\
  grainid varchar(30) not null,\n\
  tablename varchar(30) not null,\n\
  tabletype varchar(2) not null default 'T',\n\
  orphaned bit not null default 'FALSE',\n\
  primary key (grainid, tablename)\n\
);\n";

/// Build the `celesta` system grain: the `grains` and `tables` catalog
/// tables, exactly the layout the cursors above expect.
pub fn system_grain() -> CelestaResult<Grain> {
    let mut grain = Grain::new("celesta")?;
    grain.set_version("celesta 1.0")?;
    grain.set_source(SYSTEM_GRAIN_SOURCE);

    let mut grains = Table::new("celesta", "grains")?;
    let mut id = Column::string("id", 30)?;
    id.set_nullable(false);
    grains.add_column(id)?;
    grains.add_pk("id")?;
    grains.finalize_pk()?;
    let mut version = Column::string("version", 2000)?;
    version.set_nullable(false);
    grains.add_column(version)?;
    let mut length = Column::integer("length")?;
    length.set_nullable(false);
    grains.add_column(length)?;
    let mut checksum = Column::string("checksum", 8)?;
    checksum.set_nullable(false);
    grains.add_column(checksum)?;
    let mut state = Column::integer("state")?;
    state.set_nullable(false);
    state.set_kind(ColumnKind::Integer {
        identity: false,
        default: Some(GrainsState::Recover.as_i32()),
    })?;
    grains.add_column(state)?;
    let mut lastmodified = Column::datetime("lastmodified")?;
    lastmodified.set_nullable(false);
    lastmodified.set_kind(ColumnKind::DateTime {
        default: None,
        get_date: true,
    })?;
    grains.add_column(lastmodified)?;
    let mut message = Column::text("message")?;
    message.set_nullable(false);
    message.set_kind(ColumnKind::String {
        length: StringLength::Max,
        default: Some(String::new()),
    })?;
    grains.add_column(message)?;
    grain.add_table(grains)?;

    let mut tables = Table::new("celesta", "tables")?;
    let mut grainid = Column::string("grainid", 30)?;
    grainid.set_nullable(false);
    tables.add_column(grainid)?;
    let mut tablename = Column::string("tablename", 30)?;
    tablename.set_nullable(false);
    tables.add_column(tablename)?;
    tables.add_pk("grainid")?;
    tables.add_pk("tablename")?;
    tables.finalize_pk()?;
    let mut tabletype = Column::string("tabletype", 2)?;
    tabletype.set_nullable(false);
    tabletype.set_kind(ColumnKind::String {
        length: StringLength::Chars(2),
        default: Some("T".to_owned()),
    })?;
    tables.add_column(tabletype)?;
    let mut orphaned = Column::boolean("orphaned")?;
    orphaned.set_nullable(false);
    orphaned.set_kind(ColumnKind::Boolean {
        default: Some(false),
    })?;
    tables.add_column(orphaned)?;
    grain.add_table(tables)?;

    Ok(grain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(GrainsState::Ready.as_i32(), 0);
        assert_eq!(GrainsState::Upgrading.as_i32(), 1);
        assert_eq!(GrainsState::Error.as_i32(), 2);
        assert_eq!(GrainsState::Recover.as_i32(), 3);
        assert_eq!(GrainsState::Lock.as_i32(), 4);
        assert_eq!(GrainsState::try_from(3).unwrap(), GrainsState::Recover);
        assert!(GrainsState::try_from(9).is_err());
    }

    #[test]
    fn test_system_grain_layout() {
        let grain = system_grain().unwrap();
        assert_eq!(grain.name(), "celesta");
        assert_ne!(grain.checksum(), 0);
        assert!(grain.length() > 0);

        let grains = grain.table("grains").unwrap();
        assert_eq!(grains.pk(), ["id"]);
        let names: Vec<&str> = grains.columns().keys().map(String::as_str).collect();
        assert_eq!(
            names,
            ["id", "version", "length", "checksum", "state", "lastmodified", "message"]
        );

        let tables = grain.table("tables").unwrap();
        assert_eq!(tables.pk(), ["grainid", "tablename"]);
        let names: Vec<&str> = tables.columns().keys().map(String::as_str).collect();
        assert_eq!(names, ["grainid", "tablename", "tabletype", "orphaned"]);
    }
}
