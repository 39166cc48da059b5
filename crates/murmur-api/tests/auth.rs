mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{JWT_SECRET, PASSWORD, TestApp, error_of};

fn signup_body(username: &str, email: &str, password: &str) -> serde_json::Value {
    json!({
        "full_name": "Ada Lovelace",
        "username": username,
        "email": email,
        "password": password,
    })
}

#[tokio::test]
async fn signup_sets_cookie_and_hides_password() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("ada", "ada@example.com", PASSWORD)),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["username"], "ada");
    assert_eq!(res.body["email"], "ada@example.com");
    assert_eq!(res.body["full_name"], "Ada Lovelace");
    assert_eq!(res.body["followers"], json!([]));
    assert!(res.body.get("password").is_none());

    let set_cookie = res.set_cookie.unwrap();
    assert!(set_cookie.starts_with("jwt="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::new().await;
    app.signup("ada").await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("ada", "other@example.com", PASSWORD)),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&res), "Username is already taken");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new().await;
    app.signup("ada").await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("countess", "ada@example.com", PASSWORD)),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&res), "Email is already in use");
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("ada", "ada@example.com", "12345")),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&res), "Password must be at least 6 characters");
    assert!(res.cookie.is_none());
}

#[tokio::test]
async fn malformed_email_is_rejected() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("ada", "ada-at-example", PASSWORD)),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&res), "Invalid email format");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new().await;
    app.signup("ada").await;

    let wrong_password = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": "not-the-password" })),
        )
        .await;
    let unknown_user = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(error_of(&wrong_password), "Invalid username or password");
}

#[tokio::test]
async fn login_issues_a_working_session() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;

    let res = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": PASSWORD })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], ada.id.as_str());

    let cookie = res.cookie.unwrap();
    let me = app.get("/api/auth/me", &cookie).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "ada");
    assert!(me.body.get("password").is_none());
}

#[tokio::test]
async fn protected_routes_reject_missing_and_forged_tokens() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(&missing), "Unauthorized: No token provided");

    let forged = app.get("/api/posts/all", "jwt=not.a.token").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(&forged), "Unauthorized: Invalid token");

    let foreign = murmur_api::auth::create_token("some-other-secret", Uuid::new_v4(), "ada").unwrap();
    let res = app.get("/api/users/suggested", &format!("jwt={}", foreign)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(&res), "Unauthorized: Invalid token");
}

#[tokio::test]
async fn token_for_a_vanished_user_is_rejected() {
    let app = TestApp::new().await;

    let token = murmur_api::auth::create_token(JWT_SECRET, Uuid::new_v4(), "ghost").unwrap();
    let res = app.get("/api/auth/me", &format!("jwt={}", token)).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(&res), "User not found");
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = TestApp::new().await;
    let ada = app.signup("ada").await;

    let res = app
        .request(Method::POST, "/api/auth/logout", Some(&ada.cookie), None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Logged out successfully");
    let set_cookie = res.set_cookie.unwrap();
    assert!(set_cookie.starts_with("jwt=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}
