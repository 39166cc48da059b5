#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use murmur_api::AppStateInner;
use murmur_api::media::ImageStore;
use murmur_db::Database;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "password123";

/// 1x1 transparent PNG.
pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct TestApp {
    router: Router,
    media: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    /// `name=value` of the first Set-Cookie header, if any.
    pub cookie: Option<String>,
    pub set_cookie: Option<String>,
    pub body: Value,
}

/// A signed-up account and the cookie that authenticates it.
pub struct Session {
    pub id: String,
    pub username: String,
    pub cookie: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let images = ImageStore::new(media.path().to_path_buf(), "http://localhost:5000")
            .await
            .unwrap();
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: JWT_SECRET.to_string(),
            images,
            secure_cookies: false,
        });

        Self {
            router: murmur_api::router(state),
            media,
        }
    }

    pub fn media_dir(&self) -> &Path {
        self.media.path()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let cookie = set_cookie
            .as_deref()
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string());

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            cookie,
            set_cookie,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(cookie), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(cookie), None).await
    }

    pub async fn signup(&self, username: &str) -> Session {
        let res = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "full_name": format!("{} Example", username),
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {}", res.body);

        Session {
            id: res.body["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
            cookie: res.cookie.expect("signup sets a session cookie"),
        }
    }

    pub async fn create_post(&self, session: &Session, text: &str) -> String {
        let res = self
            .post("/api/posts/create", &session.cookie, json!({ "text": text }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create post failed: {}", res.body);
        res.body["id"].as_str().unwrap().to_string()
    }
}

pub fn error_of(res: &TestResponse) -> &str {
    res.body["error"].as_str().unwrap_or_default()
}

pub fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
