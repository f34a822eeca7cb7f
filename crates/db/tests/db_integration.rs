//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p fediseer-db --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `fediseer_test`)
//!   `TEST_DB_PASSWORD` (default: `fediseer_test`)

#![allow(clippy::unwrap_used)]

use fediseer_db::entities::instance::{self, ListVisibility};
use fediseer_db::repositories::{EdgeKind, GuaranteeRepository, InstanceRepository, TrustEdgeRepository};
use fediseer_db::test_utils::TestDatabase;
use fediseer_common::AppError;
use sea_orm::{Set, TransactionTrait};

async fn create_instance(db: &TestDatabase, domain: &str) -> instance::Model {
    InstanceRepository::new(db.connection())
        .create(instance::ActiveModel {
            domain: Set(domain.to_string()),
            software: Set("lemmy".to_string()),
            open_registrations: Set(false),
            approval_required: Set(false),
            email_verify: Set(false),
            has_captcha: Set(false),
            visibility_endorsements: Set(ListVisibility::Open),
            visibility_censures: Set(ListVisibility::Open),
            visibility_hesitations: Set(ListVisibility::Open),
            poll_failures: Set(0),
            max_list_size: Set(1000),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        })
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_second_guarantor_conflicts() {
    let db = TestDatabase::create_unique().await.unwrap();
    let a = create_instance(&db, "a.example").await;
    let b = create_instance(&db, "b.example").await;
    let t = create_instance(&db, "t.example").await;

    let repo = GuaranteeRepository::new(db.connection());
    repo.create(a.id, t.id).await.unwrap();
    let second = repo.create(b.id, t.id).await;

    assert!(matches!(second, Err(AppError::Conflict(_))));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_rolled_back_transaction_leaves_no_edge() {
    let db = TestDatabase::create_unique().await.unwrap();
    let a = create_instance(&db, "a.example").await;
    let b = create_instance(&db, "b.example").await;

    {
        let txn = db.connection().begin().await.unwrap();
        TrustEdgeRepository::new(&txn)
            .create(EdgeKind::Censure, a.id, b.id, Some("spam".into()), None)
            .await
            .unwrap();
        txn.rollback().await.unwrap();
    }

    let found = TrustEdgeRepository::new(db.connection())
        .find(EdgeKind::Censure, a.id, b.id)
        .await
        .unwrap();
    assert!(found.is_none());
    db.drop_database().await.unwrap();
}
