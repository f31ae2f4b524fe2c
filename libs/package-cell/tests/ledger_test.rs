use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use uuid::Uuid;

use package_cell::models::{CreatePackageRequest, PackageError, PackageStatus};
use package_cell::services::LedgerService;
use package_cell::storage::InMemoryPackageStore;
use shared_models::auth::Capability;
use shared_utils::clock::clinic_today;
use shared_utils::test_utils::TestUser;

fn ledger() -> LedgerService {
    LedgerService::new(Arc::new(InMemoryPackageStore::new()))
}

fn request(child_id: Uuid, patient_id: Uuid, total: i32, valid_until: NaiveDate) -> CreatePackageRequest {
    CreatePackageRequest {
        child_id,
        patient_id,
        name: "Occupational 8".to_string(),
        category: Some("occupational".to_string()),
        total_sessions: total,
        valid_until,
    }
}

#[tokio::test]
async fn concurrent_consumers_never_oversell() {
    let ledger = Arc::new(ledger());
    let admin = TestUser::admin("admin@example.com").to_actor();
    let next_month = clinic_today() + Duration::days(30);

    let package = ledger
        .create_package(&admin, request(Uuid::new_v4(), Uuid::new_v4(), 3, next_month))
        .await
        .unwrap();

    let attempts = (0..10).map(|_| {
        let ledger = ledger.clone();
        async move { ledger.consume(package.id, "token").await }
    });
    let results = join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(PackageError::Exhausted(_))))
        .count();
    assert_eq!(succeeded, 3);
    assert_eq!(exhausted, 7);

    let stored = ledger.get_package(package.id, "token").await.unwrap();
    assert_eq!(stored.used_sessions, 3);
    assert_eq!(stored.status_on(clinic_today()), PackageStatus::Exhausted);
}

#[tokio::test]
async fn concurrent_consumers_on_spawned_tasks() {
    let ledger = Arc::new(ledger());
    let admin = TestUser::admin("admin@example.com").to_actor();
    let next_month = clinic_today() + Duration::days(30);
    let package = ledger
        .create_package(&admin, request(Uuid::new_v4(), Uuid::new_v4(), 1, next_month))
        .await
        .unwrap();

    let first = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.consume(package.id, "token").await }
    });
    let second = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.consume(package.id, "token").await }
    });

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(PackageError::Exhausted(_)))));
}

#[tokio::test]
async fn list_active_skips_expired_and_exhausted_and_orders_by_expiry() {
    let ledger = ledger();
    let admin = TestUser::admin("admin@example.com").to_actor();
    let today = clinic_today();
    let child = Uuid::new_v4();
    let parent = Uuid::new_v4();

    let later = ledger
        .create_package(&admin, request(child, parent, 5, today + Duration::days(60)))
        .await
        .unwrap();
    let sooner = ledger
        .create_package(&admin, request(child, parent, 5, today + Duration::days(10)))
        .await
        .unwrap();
    let exhausted = ledger
        .create_package(&admin, request(child, parent, 1, today + Duration::days(5)))
        .await
        .unwrap();
    ledger.consume(exhausted.id, "token").await.unwrap();
    ledger
        .create_package(&admin, request(child, parent, 5, today - Duration::days(1)))
        .await
        .unwrap();
    // Someone else's child
    ledger
        .create_package(&admin, request(Uuid::new_v4(), parent, 5, today + Duration::days(3)))
        .await
        .unwrap();

    let active = ledger.list_active(child, today, "token").await.unwrap();
    let ids: Vec<Uuid> = active.iter().map(|v| v.package.id).collect();
    assert_eq!(ids, vec![sooner.id, later.id]);
    assert!(active.iter().all(|v| v.status == PackageStatus::Active && v.remaining > 0));
}

#[tokio::test]
async fn only_admins_with_appointment_capability_create_packages() {
    let ledger = ledger();
    let valid_until = clinic_today() + Duration::days(30);

    let patient = TestUser::patient("parent@example.com").to_actor();
    assert_matches!(
        ledger.create_package(&patient, request(Uuid::new_v4(), patient.user_id, 5, valid_until)).await,
        Err(PackageError::Forbidden(_))
    );

    // Legacy bitmask 8 grants news only
    let news_admin = TestUser::admin_with_permissions("news@example.com", 8).to_actor();
    assert!(!news_admin.can(Capability::Appointments));
    assert_matches!(
        ledger.create_package(&news_admin, request(Uuid::new_v4(), Uuid::new_v4(), 5, valid_until)).await,
        Err(PackageError::Forbidden(_))
    );

    let admin = TestUser::admin("admin@example.com").to_actor();
    assert_matches!(
        ledger.create_package(&admin, request(Uuid::new_v4(), Uuid::new_v4(), 0, valid_until)).await,
        Err(PackageError::InvalidInput(_))
    );
}

#[tokio::test]
async fn patients_only_see_their_own_packages() {
    let ledger = ledger();
    let admin = TestUser::admin("admin@example.com").to_actor();
    let parent = TestUser::patient("parent@example.com");
    let child = Uuid::new_v4();
    let valid_until = clinic_today() + Duration::days(30);

    ledger.create_package(&admin, request(child, parent.uuid(), 5, valid_until)).await.unwrap();
    ledger.create_package(&admin, request(child, Uuid::new_v4(), 5, valid_until)).await.unwrap();

    let today = clinic_today();
    let seen_by_parent = ledger.list_for_child(&parent.to_actor(), child, today).await.unwrap();
    assert_eq!(seen_by_parent.len(), 1);

    let seen_by_admin = ledger.list_for_child(&admin, child, today).await.unwrap();
    assert_eq!(seen_by_admin.len(), 2);
}
