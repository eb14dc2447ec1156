//! Error types for the Celesta schema-update engine.
//!
//! A single domain error, [`CelestaError`], covers both schema-time
//! (parse/validation) failures and upgrade-time (DDL) failures. Schema-time
//! variants correspond to what the CelestaSQL front end and the model
//! validation raise; upgrade-time variants are raised by the updater while it
//! reconciles a live database with the declared model. The
//! [`CelestaError::is_parse`] predicate tells the two families apart where a
//! caller cares (a parse error aborts the whole run, an upgrade error is
//! recorded per grain).

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type CelestaResult<T> = Result<T, CelestaError>;

/// Primary error type for Celesta operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CelestaError {
    // === Schema-time (parse/validation) errors ===
    /// A name does not satisfy the identifier rules.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Malformed source text (version string, expression, literal).
    #[error("parse error: {detail}")]
    Parse { detail: String },

    /// A field reference matched no declared table.
    #[error("cannot resolve field reference '{reference}'")]
    UnresolvedField { reference: String },

    /// A field reference matched more than one declared table.
    #[error("ambiguous field reference '{reference}'")]
    AmbiguousField { reference: String },

    /// An expression has the wrong type for its position.
    #[error("expression '{expr}' is expected to be of {expected} type, but it is {actual}")]
    TypeMismatch {
        expr: String,
        expected: String,
        actual: String,
    },

    /// A type that cannot appear in the given operator at all.
    #[error("wrong expression '{expr}': type {actual} cannot be used in {operator}")]
    TypeNotComparable {
        expr: String,
        actual: String,
        operator: String,
    },

    /// An operand list that must be non-empty was empty.
    #[error("operator {operator} requires at least one operand")]
    EmptyOperandList { operator: String },

    /// A column name already present where uniqueness is required.
    #[error("duplicate column '{column}' in '{element}'")]
    DuplicateColumn { element: String, column: String },

    /// A column name that does not exist in the named element.
    #[error("no such column '{column}' in '{element}'")]
    UnknownColumn { element: String, column: String },

    /// An element name already taken within its grain.
    #[error("grain '{grain}' already contains element '{name}'")]
    DuplicateElement { grain: String, name: String },

    /// A grain absent from the score.
    #[error("no such grain: '{name}'")]
    UnknownGrain { name: String },

    /// A grain element absent from its grain.
    #[error("no such element '{name}' in grain '{grain}'")]
    UnknownElement { grain: String, name: String },

    /// A table's primary key is empty or was never finalized.
    #[error("table '{table}' has no finalized primary key")]
    MissingPk { table: String },

    /// FK referenced columns do not form the referenced table's primary key.
    #[error(
        "foreign key from '{table}' to '{referenced_table}': referenced columns \
         do not match the primary key of the referenced table"
    )]
    FkReferencedColumnsNotPk {
        table: String,
        referenced_table: String,
    },

    /// Grains reference each other in a cycle.
    #[error("cyclic reference between grains: {path}")]
    CyclicGrainDependency { path: String },

    /// A structural mutation arrived after the element was frozen.
    #[error("illegal state: {detail}")]
    IllegalState { detail: String },

    // === Upgrade-time errors ===
    /// The declared grain version is below the stored one.
    #[error(
        "grain '{grain}' version '{declared}' is lower than database grain \
         version '{stored}', will not proceed with auto-upgrade"
    )]
    VersionDowngrade {
        grain: String,
        declared: String,
        stored: String,
    },

    /// Declared and stored versions disagree between tags.
    #[error(
        "grain '{grain}' version '{declared}' is inconsistent with database \
         grain version '{stored}', will not proceed with auto-upgrade"
    )]
    VersionInconsistent {
        grain: String,
        declared: String,
        stored: String,
    },

    /// The system table is absent but user tables exist.
    #[error("no {schema}.{table} table found in non-empty database")]
    NonEmptyDb { schema: String, table: String },

    /// A catalog row is in a state the updater does not accept.
    #[error(
        "cannot proceed with database upgrade: there are {table} records not \
         in 'ready', 'recover' or 'lock' state"
    )]
    UnexpectedState { table: String },

    /// A DDL operation failed in the database adaptor.
    #[error("DDL failed: {detail}")]
    DdlFailed { detail: String },

    /// At least one grain ended the run in ERROR state.
    #[error(
        "not all grains were updated successfully, see {schema}.{table} \
         table data for details"
    )]
    UpgradeIncomplete { schema: String, table: String },
}

impl CelestaError {
    /// `true` for the schema-time (parse/validation) family.
    ///
    /// Parse errors abort the whole run before any DDL is issued; the rest
    /// are raised while upgrading and are recorded per grain.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. }
                | Self::Parse { .. }
                | Self::UnresolvedField { .. }
                | Self::AmbiguousField { .. }
                | Self::TypeMismatch { .. }
                | Self::TypeNotComparable { .. }
                | Self::EmptyOperandList { .. }
                | Self::DuplicateColumn { .. }
                | Self::UnknownColumn { .. }
                | Self::DuplicateElement { .. }
                | Self::UnknownGrain { .. }
                | Self::UnknownElement { .. }
                | Self::MissingPk { .. }
                | Self::FkReferencedColumnsNotPk { .. }
                | Self::CyclicGrainDependency { .. }
                | Self::IllegalState { .. }
        )
    }

    /// Shorthand for a [`CelestaError::Parse`] with a formatted detail.
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse {
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`CelestaError::DdlFailed`] with a formatted detail.
    pub fn ddl(detail: impl Into<String>) -> Self {
        Self::DdlFailed {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_family_classification() {
        assert!(CelestaError::parse("bad token").is_parse());
        assert!(CelestaError::MissingPk {
            table: "t1".to_owned()
        }
        .is_parse());
        assert!(!CelestaError::DdlFailed {
            detail: "boom".to_owned()
        }
        .is_parse());
        assert!(!CelestaError::VersionDowngrade {
            grain: "g".to_owned(),
            declared: "app 1.1".to_owned(),
            stored: "app 1.2".to_owned(),
        }
        .is_parse());
    }

    #[test]
    fn test_message_formats() {
        let e = CelestaError::UnresolvedField {
            reference: "t.x".to_owned(),
        };
        assert_eq!(e.to_string(), "cannot resolve field reference 't.x'");

        let e = CelestaError::NonEmptyDb {
            schema: "celesta".to_owned(),
            table: "grains".to_owned(),
        };
        assert_eq!(
            e.to_string(),
            "no celesta.grains table found in non-empty database"
        );
    }
}
