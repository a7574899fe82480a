mod common;

use assert_matches::assert_matches;
use common::TestApp;
use storefront_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn add_one_counts_per_item_and_size() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("counts@shop.test").await;
    let cart = &app.state.services.cart;

    cart.add_one(user_id, "p1", "M").await.unwrap();
    cart.add_one(user_id, "p1", "M").await.unwrap();
    let latest = cart.add_one(user_id, "p1", "L").await.unwrap();

    assert_eq!(latest.quantity("p1", "M"), Some(2));
    assert_eq!(latest.quantity("p1", "L"), Some(1));
    assert_eq!(cart.read(user_id).await.unwrap(), latest);
}

#[tokio::test]
async fn new_user_reads_empty_cart() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("empty@shop.test").await;

    let cart = app.state.services.cart.read(user_id).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(serde_json::to_value(&cart).unwrap(), serde_json::json!({}));
}

#[tokio::test]
async fn set_quantity_overwrites_and_zero_removes() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("setqty@shop.test").await;
    let cart = &app.state.services.cart;

    cart.add_one(user_id, "p1", "M").await.unwrap();
    let updated = cart.set_quantity(user_id, "p1", "M", 5).await.unwrap();
    assert_eq!(updated.quantity("p1", "M"), Some(5));

    // Setting a quantity for a pair never added creates it.
    let created = cart.set_quantity(user_id, "p2", "S", 3).await.unwrap();
    assert_eq!(created.quantity("p2", "S"), Some(3));

    let removed = cart.set_quantity(user_id, "p1", "M", 0).await.unwrap();
    assert_eq!(removed.quantity("p1", "M"), None);
    assert!(!removed.items().contains_key("p1"));
}

#[tokio::test]
async fn invalid_updates_are_rejected_without_changes() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("invalid@shop.test").await;
    let cart = &app.state.services.cart;
    cart.add_one(user_id, "p1", "M").await.unwrap();

    assert_matches!(
        cart.set_quantity(user_id, "p1", "M", -1).await,
        Err(ServiceError::InvalidArgument(_))
    );
    assert_matches!(
        cart.set_quantity(user_id, "ghost", "M", 0).await,
        Err(ServiceError::InvalidArgument(_))
    );
    assert_eq!(cart.read(user_id).await.unwrap().quantity("p1", "M"), Some(1));
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let cart = &app.state.services.cart;
    let ghost = Uuid::new_v4();

    assert_matches!(cart.read(ghost).await, Err(ServiceError::NotFound(_)));
    assert_matches!(
        cart.add_one(ghost, "p1", "M").await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(cart.clear(ghost).await, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn clear_empties_cart() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("clear@shop.test").await;
    let cart = &app.state.services.cart;

    cart.add_one(user_id, "p1", "M").await.unwrap();
    cart.add_one(user_id, "p2", "L").await.unwrap();
    cart.clear(user_id).await.unwrap();

    assert!(cart.read(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_adds_never_lose_increments() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register_user("race@shop.test").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cart = app.state.services.cart.clone();
        handles.push(tokio::spawn(async move {
            cart.add_one(user_id, "p1", "M").await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            // A writer may give up after repeated conflicts, but never silently.
            Err(ServiceError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(succeeded > 0);
    let cart = app.state.services.cart.read(user_id).await.unwrap();
    assert_eq!(cart.quantity("p1", "M"), Some(succeeded));
}
