//! Database repositories.
//!
//! Every repository borrows a [`sea_orm::ConnectionTrait`] implementor, so
//! services can run several repositories over one transaction.

#![allow(missing_docs)]

use fediseer_common::AppError;
use sea_orm::{DbErr, SqlErr};

pub mod flag;
pub mod guarantee;
pub mod instance;
pub mod rebuttal;
pub mod rejection;
pub mod report;
pub mod solicitation;
pub mod tag;
pub mod trust_edge;
pub mod user;

pub use flag::FlagRepository;
pub use guarantee::GuaranteeRepository;
pub use instance::InstanceRepository;
pub use rebuttal::RebuttalRepository;
pub use rejection::RejectionRepository;
pub use report::{MULTIPLE_TARGETS, REDACTED_TARGET, ReportFilter, ReportRepository};
pub use solicitation::SolicitationRepository;
pub use tag::TagRepository;
pub use trust_edge::{EdgeKind, TrustEdge, TrustEdgeRepository};
pub use user::UserRepository;

/// Map an insert failure. A unique violation means a concurrent writer got
/// there first and surfaces as [`AppError::Conflict`] with `conflict`.
pub(crate) fn insert_err(e: &DbErr, conflict: &str) -> AppError {
    unique_or_database(e.sql_err(), e, conflict)
}

fn unique_or_database(sql_err: Option<SqlErr>, e: &DbErr, conflict: &str) -> AppError {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict.to_string()),
        _ => AppError::Database(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = unique_or_database(
            Some(SqlErr::UniqueConstraintViolation("censure_source_id_target_id_key".to_string())),
            &DbErr::Custom("duplicate key".to_string()),
            "Censure was added concurrently",
        );

        match err {
            AppError::Conflict(msg) => assert_eq!(msg, "Censure was added concurrently"),
            other => panic!("Expected Conflict error, got {other:?}"),
        }
    }

    #[test]
    fn test_other_failures_stay_database_errors() {
        let e = DbErr::Custom("connection reset".to_string());

        assert!(matches!(
            unique_or_database(None, &e, "ignored"),
            AppError::Database(_)
        ));
        assert!(matches!(
            unique_or_database(
                Some(SqlErr::ForeignKeyConstraintViolation("instance".to_string())),
                &e,
                "ignored",
            ),
            AppError::Database(_)
        ));
    }
}
