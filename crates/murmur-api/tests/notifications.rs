mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{TestApp, error_of};

#[tokio::test]
async fn follow_and_like_notify_the_target() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;
    let bob = app.signup("bob").await;
    let post_id = app.create_post(&ada, "notice me").await;

    app.post(&format!("/api/users/follow/{}", ada.id), &bob.cookie, json!({}))
        .await;
    app.post(&format!("/api/posts/like/{}", post_id), &bob.cookie, json!({}))
        .await;

    let res = app.get("/api/notifications", &ada.cookie).await;
    assert_eq!(res.status, StatusCode::OK);
    let items = res.body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["type"], "like");
    assert_eq!(items[1]["type"], "follow");
    assert_eq!(items[0]["from"]["username"], "bob");
    assert_eq!(items[0]["to"], ada.id.as_str());
    assert_eq!(items[0]["read"], false);

    // Listing marks everything read
    let res = app.get("/api/notifications", &ada.cookie).await;
    assert!(res.body.as_array().unwrap().iter().all(|n| n["read"] == true));

    // Nothing went to the actor
    let res = app.get("/api/notifications", &bob.cookie).await;
    assert_eq!(res.body, json!([]));
}

#[tokio::test]
async fn unlike_and_unfollow_do_not_notify() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;
    let bob = app.signup("bob").await;
    let post_id = app.create_post(&ada, "toggle").await;

    for _ in 0..2 {
        app.post(&format!("/api/users/follow/{}", ada.id), &bob.cookie, json!({}))
            .await;
        app.post(&format!("/api/posts/like/{}", post_id), &bob.cookie, json!({}))
            .await;
    }

    let res = app.get("/api/notifications", &ada.cookie).await;
    assert_eq!(res.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn liking_your_own_post_is_silent() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;
    let post_id = app.create_post(&ada, "self love").await;

    app.post(&format!("/api/posts/like/{}", post_id), &ada.cookie, json!({}))
        .await;

    let res = app.get("/api/notifications", &ada.cookie).await;
    assert_eq!(res.body, json!([]));
}

#[tokio::test]
async fn deleting_notifications() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;
    let bob = app.signup("bob").await;
    let cat = app.signup("cat").await;

    app.post(&format!("/api/users/follow/{}", ada.id), &bob.cookie, json!({}))
        .await;
    app.post(&format!("/api/users/follow/{}", ada.id), &cat.cookie, json!({}))
        .await;

    let res = app.get("/api/notifications", &ada.cookie).await;
    let first_id = res.body[0]["id"].as_str().unwrap().to_string();

    let res = app
        .delete(&format!("/api/notifications/{}", first_id), &bob.cookie)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .delete(&format!("/api/notifications/{}", first_id), &ada.cookie)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Notification deleted successfully");

    let res = app
        .delete(&format!("/api/notifications/{}", Uuid::new_v4()), &ada.cookie)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&res), "Notification not found");

    let res = app.get("/api/notifications", &ada.cookie).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app.delete("/api/notifications", &ada.cookie).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Notifications deleted successfully");

    let res = app.get("/api/notifications", &ada.cookie).await;
    assert_eq!(res.body, json!([]));
}
