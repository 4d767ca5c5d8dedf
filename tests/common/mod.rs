//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use kilroy::configuration::SessionSettings;
use kilroy::identity::InMemoryMemberStore;
use kilroy::startup::run;

pub const SECRET: &str = "integration-secret-key-at-least-32-bytes";
pub const ISSUER: &str = "http://127.0.0.1";

pub struct TestApp {
    pub address: String,
    pub settings: SessionSettings,
    pub store: Arc<InMemoryMemberStore>,
    pub client: reqwest::Client,
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        issuer: ISSUER.to_string(),
        secret: SECRET.to_string(),
        refresh_max_age: 365 * 24 * 60 * 60,
        session_max_age: 60 * 60,
        session_early_refresh: 10 * 60,
        cookie_secure: false,
        store_timeout_ms: 2000,
        cache_capacity: 1_000,
    }
}

pub fn spawn_app() -> TestApp {
    kilroy::telemetry::init_telemetry("warn");

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let settings = test_settings();
    let store = Arc::new(InMemoryMemberStore::new());
    let server = run(listener, settings.clone(), store.clone()).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        settings,
        store,
        client: reqwest::Client::new(),
    }
}

/// Cookies a response asked the agent to set, as `(name, value)` pairs
pub fn set_cookies(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

/// An agent's cookie jar, kept by hand so tests can see exactly what is sent
#[derive(Default, Clone)]
pub struct Jar {
    pub refresh: Option<String>,
    pub session: Option<String>,
}

impl Jar {
    pub fn absorb(&mut self, response: &reqwest::Response) {
        for (name, value) in set_cookies(response) {
            match name.as_str() {
                "refresh.jwt" => self.refresh = Some(value),
                "session.jwt" => self.session = Some(value),
                _ => {}
            }
        }
    }

    pub fn header(&self) -> String {
        let mut parts = Vec::new();
        if let Some(refresh) = &self.refresh {
            parts.push(format!("refresh.jwt={}", refresh));
        }
        if let Some(session) = &self.session {
            parts.push(format!("session.jwt={}", session));
        }
        parts.join("; ")
    }
}

impl TestApp {
    pub fn get(&self, path: &str, jar: &Jar) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.address, path));
        with_cookies(request, jar)
    }

    pub fn post(&self, path: &str, jar: &Jar) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.address, path));
        with_cookies(request, jar)
    }

    /// Establish a session and return the agent's jar and tracker
    pub async fn establish(&self) -> (Jar, String) {
        let mut jar = Jar::default();
        let response = self
            .get("/api/refresh", &jar)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        jar.absorb(&response);
        let body: serde_json::Value = response.json().await.unwrap();
        let tracker = body["tracker"].as_str().unwrap().to_string();
        (jar, tracker)
    }
}

fn with_cookies(request: reqwest::RequestBuilder, jar: &Jar) -> reqwest::RequestBuilder {
    let header = jar.header();
    if header.is_empty() {
        request
    } else {
        request.header(reqwest::header::COOKIE, header)
    }
}
