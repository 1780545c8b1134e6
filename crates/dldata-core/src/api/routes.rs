//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Pages
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/filters", post(handlers::update_filters))

        // JSON
        .route("/api/dashboard", get(handlers::api_dashboard))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use crate::auth::credentials::tests::sample_store;
    use crate::auth::{SessionStore, PROMPT_MESSAGE, REJECTED_MESSAGE};
    use crate::config::DashboardConfig;
    use crate::db::InteractionSource;
    use crate::error::{Error, Result};
    use crate::models::{InteractionFilter, InteractionRecord};

    /// Serves canned rows and remembers the last query
    struct StubSource {
        records: Vec<InteractionRecord>,
        fail: bool,
        last_query: Mutex<Option<InteractionFilter>>,
    }

    #[async_trait]
    impl InteractionSource for StubSource {
        async fn fetch(&self, filter: &InteractionFilter) -> Result<Vec<InteractionRecord>> {
            *self.last_query.lock().unwrap() = Some(filter.clone());
            if self.fail {
                return Err(Error::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.records.clone())
        }
    }

    fn record(id: &str, email: &str, stars: Option<i32>) -> InteractionRecord {
        InteractionRecord {
            created_at: NaiveDate::from_ymd_opt(2024, 4, 2)
                .unwrap()
                .and_hms_opt(10, id.len() as u32, 0)
                .unwrap(),
            input: Some("Can I break my lease?".to_string()),
            output: Some("Usually, with notice.".to_string()),
            token_count: 310,
            total_cost_usd: 0.0123,
            email: email.to_string(),
            stars,
            text: None,
            id: id.to_string(),
        }
    }

    fn app_with(source: Arc<StubSource>) -> Router {
        let credentials = sample_store();
        let dashboard = DashboardConfig::default();
        let sessions = SessionStore::new(&credentials.cookie, dashboard.default_date_from, false);

        create_router(AppState {
            source,
            credentials: Arc::new(credentials),
            sessions: Arc::new(sessions),
            dashboard,
        })
    }

    fn stub(records: Vec<InteractionRecord>) -> Arc<StubSource> {
        Arc::new(StubSource {
            records,
            fail: false,
            last_query: Mutex::new(None),
        })
    }

    fn sample_rows() -> Vec<InteractionRecord> {
        vec![
            record("1", "alice@firm.com", Some(5)),
            record("22", "bob@firm.com", None),
            record("333", "alice@firm.com", Some(4)),
            record("4444", "bot@internal", Some(1)),
        ]
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, format!("dldata_session={cookie}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, format!("dldata_session={cookie}"));
        }
        builder.body(Body::from(form.to_string())).unwrap()
    }

    fn set_cookie(response: &Response<Body>) -> Option<String> {
        let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        let pair = value.split(';').next()?;
        pair.split_once('=').map(|(_, v)| v.to_string())
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Log in and return the authenticated session cookie
    async fn login(app: &Router) -> String {
        let anonymous = app.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = set_cookie(&anonymous).unwrap();

        let response = app
            .clone()
            .oneshot(post("/login", Some(&cookie), "username=jsmith&password=hunter22"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        set_cookie(&response).expect("login rotates the session cookie")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_with(stub(vec![]));
        let response = app.oneshot(get("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn first_visit_shows_prompt_and_issues_cookie() {
        let source = stub(sample_rows());
        let app = app_with(source.clone());

        let response = app.oneshot(get("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("dldata_session="));
        assert!(cookie.contains("HttpOnly"));

        let body = body_text(response).await;
        assert!(body.contains(PROMPT_MESSAGE));
        assert!(source.last_query.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = app_with(stub(sample_rows()));
        let anonymous = app.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = set_cookie(&anonymous).unwrap();

        let response = app
            .clone()
            .oneshot(post("/login", Some(&cookie), "username=jsmith&password=nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(set_cookie(&response).is_none());

        let page = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        let body = body_text(page).await;
        assert!(body.contains(&REJECTED_MESSAGE.replace('/', "&#x2f;")));
        assert!(!body.contains("Interactions"));
    }

    #[tokio::test]
    async fn login_shows_dashboard() {
        let source = stub(sample_rows());
        let app = app_with(source.clone());
        let cookie = login(&app).await;

        let response = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Welcome <em>John Smith</em>"));
        assert!(body.contains("Interaction and Evaluation Details - 4 Interactions"));
        assert!(body.contains("Plotly.newPlot(\"pie-chart\""));

        let query = source.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.email_contains, "");
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn pre_login_cookie_is_invalidated_by_login() {
        let app = app_with(stub(sample_rows()));
        let anonymous = app.clone().oneshot(get("/", None)).await.unwrap();
        let old_cookie = set_cookie(&anonymous).unwrap();

        app.clone()
            .oneshot(post("/login", Some(&old_cookie), "username=jsmith&password=hunter22"))
            .await
            .unwrap();

        let page = app.oneshot(get("/", Some(&old_cookie))).await.unwrap();
        assert!(body_text(page).await.contains(PROMPT_MESSAGE));
    }

    #[tokio::test]
    async fn logout_returns_to_prompt() {
        let app = app_with(stub(sample_rows()));
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(post("/logout", Some(&cookie), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cleared = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));

        let page = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        let body = body_text(page).await;
        assert!(body.contains(PROMPT_MESSAGE));
        assert!(!body.contains("Welcome"));
    }

    #[tokio::test]
    async fn filters_persist_and_exclusions_apply() {
        let source = stub(sample_rows());
        let app = app_with(source.clone());
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(post(
                "/filters",
                Some(&cookie),
                "email=firm&date_from=2024-03-01&date_to=2024-04-30&exclude=bot%40internal",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let page = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        let body = body_text(page).await;
        assert!(body.contains("- 3 Interactions"));
        assert!(body.contains("<option value=\"bot@internal\" selected>"));

        let query = source.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.email_contains, "firm");
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(query.date_to, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());

        let api = app.oneshot(get("/api/dashboard", Some(&cookie))).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(api).await).unwrap();
        assert_eq!(json["table"]["count"], 3);
        assert_eq!(json["filters"]["excluded"], serde_json::json!(["bot@internal"]));
        assert_eq!(json["candidates"].as_array().unwrap().len(), 3);
        let top = json["top_identities"]["data"].as_array().unwrap();
        assert!(top.iter().all(|entry| entry["email"] != "bot@internal"));
    }

    #[tokio::test]
    async fn multiple_exclusions_are_accepted() {
        let app = app_with(stub(sample_rows()));
        let cookie = login(&app).await;

        app.clone()
            .oneshot(post(
                "/filters",
                Some(&cookie),
                "email=&exclude=bot%40internal&exclude=bob%40firm.com",
            ))
            .await
            .unwrap();

        let api = app.oneshot(get("/api/dashboard", Some(&cookie))).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(api).await).unwrap();
        assert_eq!(json["table"]["count"], 2);
        assert_eq!(json["filters"]["date_from"], "2024-01-01");
    }

    #[tokio::test]
    async fn empty_fetch_renders_no_data_messages() {
        let app = app_with(stub(vec![]));
        let cookie = login(&app).await;

        let page = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        let body = body_text(page).await;
        assert!(body.contains(super::super::render::NO_PIE_DATA_MESSAGE));
        assert!(body.contains(super::super::render::NO_EVALUATIONS_MESSAGE));
        assert!(body.contains("- 0 Interactions"));
    }

    #[tokio::test]
    async fn database_failure_fails_only_that_request() {
        let source = Arc::new(StubSource {
            records: vec![],
            fail: true,
            last_query: Mutex::new(None),
        });
        let app = app_with(source);
        let cookie = login(&app).await;

        let page = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(page.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_text(page).await;
        assert!(body.contains("database is unavailable"));
        assert!(!body.contains("pool timed out"));

        let health = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sessions_do_not_share_auth_or_filters() {
        let app = app_with(stub(sample_rows()));
        let alice = login(&app).await;

        app.clone()
            .oneshot(post("/filters", Some(&alice), "email=alice&exclude=bob%40firm.com"))
            .await
            .unwrap();

        let other = app.clone().oneshot(get("/", None)).await.unwrap();
        let other_cookie = set_cookie(&other).unwrap();
        assert!(body_text(other).await.contains(PROMPT_MESSAGE));

        let bob = {
            let response = app
                .clone()
                .oneshot(post("/login", Some(&other_cookie), "username=rdoe&password=letmein"))
                .await
                .unwrap();
            set_cookie(&response).unwrap()
        };

        let api = app.oneshot(get("/api/dashboard", Some(&bob))).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(api).await).unwrap();
        assert_eq!(json["user"]["username"], "rdoe");
        assert_eq!(json["filters"]["email"], "");
        assert_eq!(json["filters"]["excluded"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn api_requires_authentication() {
        let app = app_with(stub(sample_rows()));
        let response = app.oneshot(get("/api/dashboard", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_filter_updates_are_ignored() {
        let source = stub(sample_rows());
        let app = app_with(source.clone());

        let response = app
            .clone()
            .oneshot(post("/filters", None, "email=sneaky"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(source.last_query.lock().unwrap().is_none());
    }
}
