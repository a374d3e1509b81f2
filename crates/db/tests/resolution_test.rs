//! Integration tests for the billing-resolution store.
//!
//! Require a migrated Postgres database; skipped when `DATABASE_URL` is
//! unset.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use andino_db::entities::companies;
use andino_db::repositories::resolution::CreateResolutionInput;
use andino_db::repositories::ResolutionRepository;

async fn connect() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };
    Some(andino_db::connect(&url, 5).await.expect("failed to connect"))
}

async fn seed_company(db: &DatabaseConnection) -> Uuid {
    let company_id = Uuid::new_v4();
    let now = Utc::now().into();
    companies::ActiveModel {
        id: Set(company_id),
        name: Set(format!("Resoluciones Test {company_id}")),
        nit: Set(format!("6{}", &company_id.simple().to_string()[..8])),
        address: Set(None),
        phone: Set(None),
        email: Set(None),
        status: Set("active".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
    company_id
}

fn resolution(company_id: Uuid, prefix: &str, active: bool, days_left: i64) -> CreateResolutionInput {
    let today = Utc::now().date_naive();
    CreateResolutionInput {
        company_id,
        resolution_number: "18764000000001".to_string(),
        prefix: prefix.to_string(),
        range_from: 990_000_000,
        range_to: 995_000_000,
        date_from: today - Duration::days(30),
        date_to: today + Duration::days(days_left),
        technical_key: "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c354673d3a603956897890cd"
            .to_string(),
        is_active: active,
    }
}

#[tokio::test]
async fn active_lookup_returns_the_valid_resolution() {
    let Some(db) = connect().await else { return };
    let company_id = seed_company(&db).await;
    let repo = ResolutionRepository::new(db.clone());

    repo.create(resolution(company_id, "SETP", true, 180))
        .await
        .unwrap();

    let found = repo
        .get_active_by_company_and_prefix(company_id, "SETP")
        .await
        .unwrap();
    assert!(found.is_some());
    let found = found.unwrap();
    assert_eq!(found.prefix, "SETP");
    assert!(!found.technical_key.is_empty());
}

#[tokio::test]
async fn missing_or_inactive_resolution_is_none_without_error() {
    let Some(db) = connect().await else { return };
    let company_id = seed_company(&db).await;
    let repo = ResolutionRepository::new(db.clone());

    // Nothing registered for the prefix.
    assert!(repo
        .get_active_by_company_and_prefix(company_id, "SETP")
        .await
        .unwrap()
        .is_none());

    // Inactive resolution does not count.
    repo.create(resolution(company_id, "SETP", false, 180))
        .await
        .unwrap();
    assert!(repo
        .get_active_by_company_and_prefix(company_id, "SETP")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn expired_resolution_is_ignored() {
    let Some(db) = connect().await else { return };
    let company_id = seed_company(&db).await;
    let repo = ResolutionRepository::new(db.clone());

    repo.create(resolution(company_id, "VENC", true, -1))
        .await
        .unwrap();
    assert!(repo
        .get_active_by_company_and_prefix(company_id, "VENC")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn second_active_resolution_per_prefix_is_rejected() {
    let Some(db) = connect().await else { return };
    let company_id = seed_company(&db).await;
    let repo = ResolutionRepository::new(db.clone());

    repo.create(resolution(company_id, "SETP", true, 180))
        .await
        .unwrap();
    let err = repo.create(resolution(company_id, "SETP", true, 365)).await;
    assert!(err.is_err(), "partial unique index must reject a second active resolution");

    // A different prefix is fine.
    repo.create(resolution(company_id, "FE", true, 180))
        .await
        .unwrap();
}
