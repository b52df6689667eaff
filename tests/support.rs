use std::sync::Arc;
use std::time::Duration;

use hh_vacancy_bot::infra::db::{self, Db};
use hh_vacancy_bot::oauth::coordinator::AuthCoordinator;
use hh_vacancy_bot::oauth::listener::{self, CallbackServerHandle};
use hh_vacancy_bot::oauth::provider::HhOAuthConfig;
use hh_vacancy_bot::oauth::registry::PendingAuthRegistry;
use tempfile::TempDir;

pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Canned hh.ru token endpoint response used by the happy-path tests.
pub fn token_success_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "stub-access-token",
        "refresh_token": "stub-refresh-token",
        "token_type": "bearer",
        "expires_in": 1209600
    })
}

/// Serve a stub OAuth token endpoint returning `status` + `body` for every POST.
pub async fn spawn_token_endpoint(
    status: u16,
    body: serde_json::Value,
) -> (String, tokio::task::JoinHandle<()>) {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    let status = StatusCode::from_u16(status).expect("valid status");
    let app = Router::new().route(
        "/token",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind token endpoint");
    let addr = listener.local_addr().expect("token endpoint addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("token endpoint");
    });

    (format!("http://{addr}/token"), task)
}

/// A full authorization stack on ephemeral ports: shared callback listener,
/// registry, coordinator, temp database, stub token endpoint.
pub struct AuthHarness {
    pub db: Db,
    pub registry: Arc<PendingAuthRegistry>,
    pub coordinator: AuthCoordinator,
    pub callback_base: String,
    server: Option<CallbackServerHandle>,
    token_task: tokio::task::JoinHandle<()>,
    _home: TempDir,
}

impl AuthHarness {
    pub async fn start(attempt_timeout: Duration, token_status: u16) -> Self {
        let home = tempfile::tempdir().expect("tempdir");
        let db = db::init(&home.path().join("bot.db")).expect("init db");

        let registry = Arc::new(PendingAuthRegistry::new(attempt_timeout));
        let bound = listener::bind("127.0.0.1", 0).expect("bind callback listener");
        let callback_base = format!("http://{}", bound.local_addr());
        let server =
            listener::serve(bound, CALLBACK_PATH, Arc::clone(&registry)).expect("serve callbacks");

        let token_body = if token_status < 400 {
            token_success_body()
        } else {
            serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code has expired"
            })
        };
        let (token_url, token_task) = spawn_token_endpoint(token_status, token_body).await;

        let provider = HhOAuthConfig {
            authorize_url: "https://hh.ru/oauth/authorize".to_string(),
            token_url,
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            scope: String::new(),
            redirect_uri: format!("{callback_base}{CALLBACK_PATH}"),
        };

        let coordinator =
            AuthCoordinator::new(Arc::clone(&registry), provider, db.clone()).expect("coordinator");

        Self {
            db,
            registry,
            coordinator,
            callback_base,
            server: Some(server),
            token_task,
            _home: home,
        }
    }

    /// Simulate the provider's browser redirect; returns (status, body).
    pub async fn redirect(&self, query: &str) -> (u16, String) {
        let url = format!("{}{CALLBACK_PATH}?{query}", self.callback_base);
        let response = reqwest::get(&url).await.expect("redirect request");
        let status = response.status().as_u16();
        let body = response.text().await.expect("redirect body");
        (status, body)
    }

    pub fn create_user(&self, telegram_user_id: i64) -> i64 {
        let conn = self.db.open_connection().expect("conn");
        hh_vacancy_bot::domain::users::get_or_create(&conn, telegram_user_id)
            .expect("user")
            .id
    }

    pub fn stored_credential(
        &self,
        user_id: i64,
    ) -> Option<hh_vacancy_bot::domain::credentials::HhCredential> {
        let conn = self.db.open_connection().expect("conn");
        hh_vacancy_bot::domain::credentials::get(&conn, user_id).expect("credential query")
    }

    pub async fn shutdown(mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().await;
        }
        self.token_task.abort();
    }
}

/// Extract the `state` query parameter from an authorize URL.
pub fn state_param(authorize_url: &str) -> String {
    let url = reqwest::Url::parse(authorize_url).expect("authorize url");
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state param present")
}
