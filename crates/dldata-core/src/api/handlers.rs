//! HTTP handlers
//!
//! Every handler resolves the caller's session first. Only authenticated
//! sessions reach the fetch → pipeline → render chain; everything else gets
//! the login page.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::Form;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::render::{self, DashboardContext};
use crate::auth::{cookie_from_header, AuthStatus, CredentialStore, Identity, Session, SessionStore};
use crate::config::DashboardConfig;
use crate::dashboard::{self, Dashboard};
use crate::db::InteractionSource;
use crate::error::{Error, Result};
use crate::models::DashboardFilters;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn InteractionSource>,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
    pub dashboard: DashboardConfig,
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let cookie = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| cookie_from_header(value, state.sessions.cookie_name()));

        Ok(state.sessions.resolve(cookie))
    }
}

/// Attach the session cookie when the session was created by this request
fn respond(sessions: &SessionStore, session: &Session, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(value) = &session.issued {
        attach_cookie(&mut response, &sessions.session_cookie(value));
    }
    response
}

fn attach_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len(),
    })
}

/// Login page or dashboard, depending on the session
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response> {
    let current = state.sessions.state(&session);

    let Some(identity) = current.auth.identity() else {
        let html = render::login_page(
            current.auth.login_message(),
            current.auth == AuthStatus::Rejected,
        )?;
        return Ok(respond(&state.sessions, &session, Html(html)));
    };

    let today = today();
    let dashboard = dashboard::build(state.source.as_ref(), &current.filters, today).await?;
    let context = DashboardContext::new(identity, &current.filters, today, &dashboard);
    let html = render::dashboard_page(&context)?;

    Ok(respond(&state.sessions, &session, Html(html)))
}

/// Login form submission
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Evaluate submitted credentials and return to the page
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let mut auth = state.sessions.state(&session).auth;
    let credentials = Arc::clone(&state.credentials);

    // bcrypt verification blocks; run it off the async workers
    let auth = tokio::task::spawn_blocking(move || {
        auth.submit(&credentials, &form.username, &form.password);
        auth
    })
    .await
    .map_err(|e| Error::internal(format!("login task failed: {e}")))?;

    let authenticated = auth.is_authenticated();
    state.sessions.update(&session, |current| current.auth = auth);

    let session = if authenticated {
        state.sessions.rotate(&session)
    } else {
        session
    };

    Ok(respond(&state.sessions, &session, Redirect::to("/")))
}

/// End the session and expire its cookie
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    state.sessions.update(&session, |current| current.auth.logout());
    state.sessions.destroy(&session);

    let mut response = Redirect::to("/").into_response();
    attach_cookie(&mut response, &state.sessions.clear_cookie());
    response
}

/// Sidebar filter submission
#[derive(Debug, Deserialize)]
pub struct FilterForm {
    #[serde(default)]
    pub email: String,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FilterForm {
    /// Replace the session's filters with the submitted ones.
    ///
    /// An upper bound equal to `today` is stored as "today" so it keeps
    /// advancing on later days.
    pub fn apply(self, filters: &mut DashboardFilters, default_from: NaiveDate, today: NaiveDate) {
        filters.email = self.email;
        filters.date_from = self.date_from.unwrap_or(default_from);
        filters.date_to = self.date_to.filter(|date| *date != today);
        filters.excluded = self
            .exclude
            .into_iter()
            .filter(|email| !email.is_empty())
            .collect();
    }
}

/// Store new filters for the session and re-render
pub async fn update_filters(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<FilterForm>,
) -> Response {
    let default_from = state.dashboard.default_date_from;
    let applied = state.sessions.update(&session, |current| {
        if !current.auth.is_authenticated() {
            return false;
        }
        form.apply(&mut current.filters, default_from, today());
        true
    });

    if !applied {
        debug!("Ignoring filter update from unauthenticated session");
    }

    respond(&state.sessions, &session, Redirect::to("/"))
}

/// Filters echoed back by the JSON API
#[derive(Serialize)]
pub struct FiltersResponse {
    pub email: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub excluded: BTreeSet<String>,
}

/// JSON form of the dashboard
#[derive(Serialize)]
pub struct DashboardResponse {
    pub user: Identity,
    pub filters: FiltersResponse,
    #[serde(flatten)]
    pub dashboard: Dashboard,
}

/// Pipeline output for the session's current filters
pub async fn api_dashboard(State(state): State<AppState>, session: Session) -> Result<Response> {
    let current = state.sessions.state(&session);

    let Some(identity) = current.auth.identity().cloned() else {
        let body = Json(serde_json::json!({"error": "authentication required"}));
        return Ok(respond(
            &state.sessions,
            &session,
            (StatusCode::UNAUTHORIZED, body),
        ));
    };

    let today = today();
    let dashboard = dashboard::build(state.source.as_ref(), &current.filters, today).await?;
    let filters = current.filters;

    Ok(respond(
        &state.sessions,
        &session,
        Json(DashboardResponse {
            user: identity,
            filters: FiltersResponse {
                date_to: filters.effective_date_to(today),
                email: filters.email,
                date_from: filters.date_from,
                excluded: filters.excluded,
            },
            dashboard,
        }),
    ))
}
