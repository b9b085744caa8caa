//! Middleware that checks the session cookie, extends it, and guards admin routes.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        UserID,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
        get_user_by_id,
    },
    endpoints,
    timezone::get_local_offset,
};

/// How far each authenticated request pushes out the session expiry.
const SESSION_EXTENSION: Duration = Duration::minutes(5);

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
        }
    }
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

#[inline]
async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!(
            "Invalid timezone {}. Redirecting to log in page.",
            state.local_timezone
        );
        return get_redirect(endpoints::LOG_IN_VIEW);
    };

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error getting cookie jar: {error:?}. Redirecting to log in page.");
            return get_redirect(endpoints::LOG_IN_VIEW);
        }
    };
    let user_id = match get_token_from_cookies(&jar) {
        Ok(token) => token.user_id,
        Err(_) => return get_redirect(endpoints::LOG_IN_VIEW),
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(
        jar.clone(),
        SESSION_EXTENSION,
        local_offset,
    ) {
        Ok(updated_jar) => updated_jar,
        Err(error) => {
            tracing::error!("Error extending cookie duration: {error}. Keeping the old cookie.");
            jar
        }
    };

    // Handlers such as log out set their own cookie, which must not be overwritten.
    if !parts.headers.contains_key(SET_COOKIE) {
        for value in jar.into_response().headers().get_all(SET_COOKIE) {
            parts.headers.append(SET_COOKIE, value.to_owned());
        }
    }

    Response::from_parts(parts, body)
}

/// Middleware function that checks for a valid session cookie.
///
/// The user ID is placed into the request extensions and the request is run
/// normally if the cookie is valid, otherwise the client is redirected to the log-in page.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Same as [auth_guard], but redirects with the `HX-Redirect` header for HTMX requests.
pub async fn auth_guard_hx(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}

/// The state needed to check whether the logged in user is an administrator.
#[derive(Debug, Clone)]
pub struct AdminState {
    /// The database connection for looking up the user.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Look up whether the user attached by the auth guard is an administrator.
///
/// Admin status is read from the database on every request, so demoted or
/// deleted users lose access immediately.
fn check_is_admin(state: &AdminState, request: &Request) -> Result<(), Error> {
    let user_id = request
        .extensions()
        .get::<UserID>()
        .copied()
        .ok_or_else(|| {
            tracing::error!("admin guard ran without a user ID, check the middleware order");
            Error::Forbidden
        })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    match get_user_by_id(user_id, &connection) {
        Ok(user) if user.is_admin => Ok(()),
        Ok(_) | Err(Error::NotFound) => {
            tracing::warn!("user {user_id} tried to access an admin route");
            Err(Error::Forbidden)
        }
        Err(error) => Err(error),
    }
}

/// Middleware that only lets administrators through, answering non-admins with a 403 page.
///
/// Must be layered inside [auth_guard] so the user ID is available.
pub async fn admin_guard(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Response {
    match check_is_admin(&state, &request) {
        Ok(()) => next.run(request).await,
        Err(error) => error.into_response(),
    }
}

/// Same as [admin_guard], but answers non-admins with an alert for HTMX requests.
///
/// Must be layered inside [auth_guard_hx] so the user ID is available.
pub async fn admin_guard_hx(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Response {
    match check_is_admin(&state, &request) {
        Ok(()) => next.run(request).await,
        Err(error) => error.into_alert_response(),
    }
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{
        Router,
        extract::State,
        middleware,
        response::Html,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key, SameSite},
    };
    use axum_test::TestServer;
    use sha2::Digest;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{
            AuthState, COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, UserID, auth_guard, auth_guard_hx,
            set_auth_cookie,
        },
        endpoints,
        timezone::get_local_offset,
    };

    async fn test_handler() -> Html<&'static str> {
        Html("<h1>Hello, World!</h1>")
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        let local_timezone = get_local_offset(&state.local_timezone).unwrap();

        set_auth_cookie(jar, UserID::new(1), state.cookie_duration, local_timezone)
    }

    const TEST_LOG_IN_ROUTE: &str = "/log_in";
    const TEST_PROTECTED_ROUTE: &str = "/protected";
    const TEST_API_ROUTE: &str = "/api/protected";

    fn get_state(cookie_duration: Duration) -> AuthState {
        let hash = sha2::Sha512::digest("nafstenoas");

        AuthState {
            cookie_key: Key::from(&hash),
            cookie_duration,
            local_timezone: "Etc/UTC".to_owned(),
        }
    }

    fn get_test_server(cookie_duration: Duration) -> TestServer {
        let state = get_state(cookie_duration);

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
            .with_state(state);

        TestServer::new(app)
    }

    fn get_test_server_hx() -> TestServer {
        let state = get_state(DEFAULT_COOKIE_DURATION);

        let app = Router::new()
            .route(TEST_API_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx))
            .with_state(state);

        TestServer::new(app)
    }

    #[track_caller]
    fn assert_date_time_close(left: OffsetDateTime, right: OffsetDateTime) {
        assert!(
            (left - right).abs() < Duration::seconds(1),
            "got date time {left:?}, want {right:?}"
        );
    }

    #[tokio::test]
    async fn get_protected_route_with_valid_cookie() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);
        let response = server.post(TEST_LOG_IN_ROUTE).await;

        response.assert_status_ok();
        let token_cookie = response.cookie(COOKIE_TOKEN);

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn auth_guard_extends_short_cookie() {
        let server = get_test_server(Duration::seconds(5));
        let response = server.post(TEST_LOG_IN_ROUTE).await;

        response.assert_status_ok();
        let response_time = OffsetDateTime::now_utc();
        let jar = response.cookies();
        assert_date_time_close(
            jar.get(COOKIE_TOKEN).unwrap().expires_datetime().unwrap(),
            response_time + Duration::seconds(5),
        );

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookies(jar).await;

        let auth_cookie = response.cookie(COOKIE_TOKEN);
        assert_date_time_close(
            auth_cookie.expires_datetime().unwrap(),
            response_time + Duration::minutes(5),
        );
        assert_eq!(auth_cookie.secure(), Some(true));
        assert_eq!(auth_cookie.http_only(), Some(true));
        assert_eq!(auth_cookie.same_site(), Some(SameSite::Strict));
    }

    #[tokio::test]
    async fn no_auth_cookie_redirects_to_log_in() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn invalid_auth_cookie_redirects_to_log_in() {
        let server = get_test_server(DEFAULT_COOKIE_DURATION);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::build((COOKIE_TOKEN, "FOOBAR")).build())
            .await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn api_route_without_cookie_uses_hx_redirect() {
        let server = get_test_server_hx();

        let response = server.get(TEST_API_ROUTE).await;

        response.assert_status_ok();
        assert_eq!(response.header("hx-redirect"), endpoints::LOG_IN_VIEW);
    }
}

#[cfg(test)]
mod admin_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, middleware, response::Html, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        auth::{AdminState, UserID, admin_guard, admin_guard_hx},
        db::initialize,
        test_utils::insert_test_user,
    };

    async fn test_handler() -> Html<&'static str> {
        Html("<h1>Admins only</h1>")
    }

    fn get_state() -> AdminState {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        AdminState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    fn get_test_server(state: AdminState, user_id: UserID) -> TestServer {
        let app = Router::new()
            .route("/admin", get(test_handler))
            .route_layer(middleware::from_fn_with_state(state, admin_guard))
            .layer(Extension(user_id));

        TestServer::new(app)
    }

    fn get_test_server_hx(state: AdminState, user_id: UserID) -> TestServer {
        let app = Router::new()
            .route("/api/admin", get(test_handler))
            .route_layer(middleware::from_fn_with_state(state, admin_guard_hx))
            .layer(Extension(user_id));

        TestServer::new(app)
    }

    #[tokio::test]
    async fn admin_is_let_through() {
        let state = get_state();
        let admin = insert_test_user("admin", true, &state.db_connection.lock().unwrap());
        let server = get_test_server(state, admin.id);

        server.get("/admin").await.assert_status_ok();
    }

    #[tokio::test]
    async fn regular_user_is_forbidden() {
        let state = get_state();
        let user = insert_test_user("driver", false, &state.db_connection.lock().unwrap());
        let server = get_test_server(state, user.id);

        server.get("/admin").await.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deleted_user_is_forbidden() {
        let server = get_test_server(get_state(), UserID::new(99));

        server.get("/admin").await.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn regular_user_gets_alert_on_api_route() {
        let state = get_state();
        let user = insert_test_user("driver", false, &state.db_connection.lock().unwrap());
        let server = get_test_server_hx(state, user.id);

        let response = server.get("/api/admin").await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert!(response.text().contains("Only administrators can do that"));
    }
}
