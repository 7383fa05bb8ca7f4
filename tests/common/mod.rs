#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use matcha_server::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    db,
    services::LogMailer,
};

pub const PASSWORD: &str = "Zq8!vkTr2m";

/// 1x1 transparent PNG.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct TestApp {
    pub base: String,
    pub client: Client,
    _dir: TempDir,
}

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestUser {
    pub id: i64,
    pub token: String,
}

/// Serve the full router on an ephemeral port backed by a throwaway database.
pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");

    let config = Config {
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        db_max_connections: 4,
        db_min_connections: 1,
        jwt_secret: "integration-test-secret".to_string(),
        upload_dir: dir.path().join("uploads").display().to_string(),
        auth_rate_limit: 1000,
        ..Config::default()
    };

    let pool = db::connect(&config).await.expect("database");
    let config = Arc::new(config);
    let limiter = Arc::new(RateLimiter::new(config.auth_rate_limit, config.auth_rate_window_secs));
    let app = create_router(AppState::new(pool, config, Arc::new(LogMailer)), limiter);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("server");
    });

    TestApp {
        base: format!("http://{}", addr),
        client: Client::new(),
        _dir: dir,
    }
}

impl TestApp {
    pub fn upload_dir(&self) -> PathBuf {
        self._dir.path().join("uploads")
    }

    /// Files currently stored under the upload directory.
    pub fn stored_uploads(&self) -> usize {
        std::fs::read_dir(self.upload_dir())
            .map(|entries| entries.filter_map(Result::ok).filter(|e| e.path().is_file()).count())
            .unwrap_or(0)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("request")
    }

    pub async fn register(&self, username: &str) -> Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "first_name": format!("{}-first", username),
                "last_name": "Tester",
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("request")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .expect("request")
    }

    /// Register, verify and log in a fresh account.
    pub async fn verified_user(&self, username: &str) -> TestUser {
        let res = self.register(username).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.expect("json");
        let verification = body["verification_token"].as_str().expect("token").to_string();

        let res = self
            .client
            .get(self.url(&format!("/api/auth/verify/{}", verification)))
            .send()
            .await
            .expect("request");
        assert_eq!(res.status(), StatusCode::OK);

        let res = self.login(username, PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.expect("json");

        TestUser {
            id: body["user"]["id"].as_i64().expect("id"),
            token: body["token"].as_str().expect("jwt").to_string(),
        }
    }

    pub async fn upload_photo(&self, user: &TestUser) -> Response {
        let part = reqwest::multipart::Part::bytes(PNG.to_vec())
            .file_name("photo.png")
            .mime_str("image/png")
            .expect("mime");
        let form = reqwest::multipart::Form::new().part("image", part);

        self.client
            .post(self.url("/api/profile/images"))
            .bearer_auth(&user.token)
            .multipart(form)
            .send()
            .await
            .expect("request")
    }

    pub async fn like(&self, from: &TestUser, to: &TestUser, like: bool) -> Response {
        self.post(&format!("/api/users/{}/like", to.id), &from.token, json!({"like": like}))
            .await
    }

    /// Open the realtime gateway as the bearer of `token`.
    pub async fn connect_ws(&self, token: &str) -> Result<Socket, tungstenite::Error> {
        let url = format!("{}/ws?token={}", self.base.replacen("http", "ws", 1), token);
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(socket)
    }

    /// Two users with photos who liked each other.
    pub async fn connected_pair(&self, a: &str, b: &str) -> (TestUser, TestUser) {
        let first = self.verified_user(a).await;
        let second = self.verified_user(b).await;
        assert_eq!(self.upload_photo(&first).await.status(), StatusCode::CREATED);
        assert_eq!(self.upload_photo(&second).await.status(), StatusCode::CREATED);
        assert_eq!(self.like(&first, &second, true).await.status(), StatusCode::OK);
        assert_eq!(self.like(&second, &first, true).await.status(), StatusCode::OK);
        (first, second)
    }
}

pub async fn json_body(res: Response) -> Value {
    res.json().await.expect("json body")
}

/// Next text frame as JSON, failing after a few seconds of silence.
pub async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("event within timeout")
            .expect("socket open")
            .expect("frame");
        if let tungstenite::Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("json frame");
        }
    }
}

/// Status of a refused WebSocket handshake.
pub fn rejected_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {}", other),
    }
}
