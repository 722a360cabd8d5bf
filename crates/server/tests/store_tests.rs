//! Idempotent get-or-create against a real schema.

mod common;

use common::TestApp;
use parliament_alerts::store::StoreError;

#[tokio::test]
async fn test_user_lookup_is_case_insensitive() {
    let app = TestApp::new().await;
    let store = app.resources.store();

    let (first, created) = store.get_or_create_user("Jane@Example.org").await.unwrap();
    assert!(created);
    assert_eq!(first.email, "jane@example.org");

    let (second, created) = store.get_or_create_user(" jane@example.ORG ").await.unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_subscription_get_or_create_is_idempotent() {
    let app = TestApp::new().await;
    let store = app.resources.store();
    let (user, _) = store.get_or_create_user("jane@example.org").await.unwrap();

    let (first, created) = store
        .get_or_create_by_query("carbon tax Province: \"AB\"", &user)
        .await
        .unwrap();
    assert!(created);
    assert!(first.active);
    assert_eq!(first.topic, "carbon tax (Province: AB)");

    let (second, created) = store
        .get_or_create_by_query("  carbon  tax   Province: \"AB\"", &user)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);
    assert_eq!(store.list_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_existing_inactive_subscription_is_returned_untouched() {
    let app = TestApp::new().await;
    let store = app.resources.store();
    let (user, _) = store.get_or_create_user("jane@example.org").await.unwrap();
    let (subscription, _) = store.get_or_create_by_query("pipelines", &user).await.unwrap();
    store.set_active(subscription, false).await.unwrap();

    let (again, created) = store.get_or_create_by_query("pipelines", &user).await.unwrap();

    assert!(!created);
    assert!(!again.active);
}

#[tokio::test]
async fn test_same_query_for_two_users_is_two_rows() {
    let app = TestApp::new().await;
    let store = app.resources.store();
    let (jane, _) = store.get_or_create_user("jane@example.org").await.unwrap();
    let (john, _) = store.get_or_create_user("john@example.org").await.unwrap();

    let (a, _) = store.get_or_create_by_query("pipelines", &jane).await.unwrap();
    let (b, _) = store.get_or_create_by_query("pipelines", &john).await.unwrap();

    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_invalid_query_is_rejected_before_insert() {
    let app = TestApp::new().await;
    let store = app.resources.store();
    let (user, _) = store.get_or_create_user("jane@example.org").await.unwrap();

    let err = store
        .get_or_create_by_query("   ", &user)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidQuery(_)));
    assert!(store.list_for_user(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_yield_one_row() {
    let app = TestApp::new().await;
    let store = app.resources.store();
    let (user, _) = store.get_or_create_user("jane@example.org").await.unwrap();

    let (a, b) = tokio::join!(
        store.get_or_create_by_query("pipelines", &user),
        store.get_or_create_by_query("pipelines", &user),
    );

    assert_eq!(a.unwrap().0.id, b.unwrap().0.id);
    assert_eq!(store.list_for_user(user.id).await.unwrap().len(), 1);
}
