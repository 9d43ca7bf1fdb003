//! Postgres error classification by constraint identity.
//!
//! "An IntegrityError occurred" is not enough to decide whether a saga step
//! succeeded: a unique violation on the membership constraint is a benign
//! retry race, while one on the schema-name constraint is a hard conflict.
//! Callers inspect which constraint fired and interpret accordingly.

use sqlx::postgres::PgDatabaseError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgViolation {
    /// Unique constraint, with the constraint name when Postgres reports it.
    Unique(String),
    /// Foreign-key constraint: the referenced row is absent. Never
    /// retryable.
    ForeignKey(String),
}

/// Extracts a constraint violation from a sqlx error, if that is what it is.
pub fn violation(err: &sqlx::Error) -> Option<PgViolation> {
    let db_err = match err {
        sqlx::Error::Database(db_err) => db_err.downcast_ref::<PgDatabaseError>(),
        _ => return None,
    };
    let constraint = db_err.constraint().unwrap_or_default().to_string();
    match db_err.code() {
        UNIQUE_VIOLATION => Some(PgViolation::Unique(constraint)),
        FOREIGN_KEY_VIOLATION => Some(PgViolation::ForeignKey(constraint)),
        _ => None,
    }
}

/// True when the error is a unique violation on the named constraint.
pub fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(violation(err), Some(PgViolation::Unique(c)) if c == constraint)
}
