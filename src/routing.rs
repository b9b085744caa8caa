//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    admin::{delete_user_endpoint, get_user_summary_page, get_users_page, set_password_endpoint},
    auth::{
        admin_guard, admin_guard_hx, auth_guard, auth_guard_hx, change_password_endpoint,
        get_account_page, get_log_in_page, get_log_out, get_register_page, post_log_in,
        register_user,
    },
    endpoints,
    error_page::{get_404_not_found, get_internal_server_error_page},
    income::{create_income_endpoint, delete_income_endpoint, get_income_page},
    settlement::{
        create_settlement_endpoint, delete_settlement_endpoint, export_settlement_endpoint,
        get_settlement_page, get_settlements_page,
    },
    summary::get_summary_page,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::REGISTER_VIEW, get(get_register_page))
        .route(endpoints::USERS, post(register_user))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::INCOME_VIEW, get(get_income_page))
        .route(endpoints::SETTLEMENTS_VIEW, get(get_settlements_page))
        .route(endpoints::SETTLEMENT_VIEW, get(get_settlement_page))
        .route(
            endpoints::EXPORT_SETTLEMENT,
            get(export_settlement_endpoint),
        )
        .route(endpoints::SUMMARY_VIEW, get(get_summary_page))
        .route(endpoints::ACCOUNT_VIEW, get(get_account_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // These POST/PUT/DELETE routes need to use the HX-REDIRECT header for auth redirects to work properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(endpoints::INCOME_API, post(create_income_endpoint))
            .route(
                endpoints::DELETE_INCOME_ENTRY,
                delete(delete_income_endpoint),
            )
            .route(endpoints::SETTLEMENTS_API, post(create_settlement_endpoint))
            .route(
                endpoints::DELETE_SETTLEMENT,
                delete(delete_settlement_endpoint),
            )
            .route(endpoints::ACCOUNT_PASSWORD, put(change_password_endpoint))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    // The admin guard needs the user ID from the auth guard, so it is the inner layer.
    let admin_routes = Router::new()
        .route(endpoints::ADMIN_USERS_VIEW, get(get_users_page))
        .route(
            endpoints::ADMIN_USER_SUMMARY_VIEW,
            get(get_user_summary_page),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .merge(
            Router::new()
                .route(endpoints::ADMIN_USER_PASSWORD, put(set_password_endpoint))
                .route(endpoints::ADMIN_DELETE_USER, delete(delete_user_endpoint))
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_guard_hx))
                .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
        );

    protected_routes
        .merge(admin_routes)
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the income page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::INCOME_VIEW)
}


#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, auth::COOKIE_TOKEN, endpoints, routing::build_router};

    fn get_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "a very secret test secret",
            "Etc/UTC",
        )
        .unwrap();

        TestServer::new(build_router(state))
    }

    async fn register(server: &TestServer, username: &str) -> axum_extra::extract::cookie::Cookie<'static> {
        let password = "correct horse battery staple";
        let response = server
            .post(endpoints::USERS)
            .form(&[
                ("username", username),
                ("password", password),
                ("confirm_password", password),
            ])
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        response.cookie(COOKIE_TOKEN)
    }

    #[tokio::test]
    async fn pages_redirect_to_log_in_without_cookie() {
        let server = get_test_server();

        for page in [
            endpoints::INCOME_VIEW,
            endpoints::SETTLEMENTS_VIEW,
            endpoints::SUMMARY_VIEW,
            endpoints::ADMIN_USERS_VIEW,
        ] {
            let response = server.get(page).await;

            response.assert_status(StatusCode::SEE_OTHER);
            assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/no/such/page")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_admins_see_admin_pages() {
        let server = get_test_server();
        let admin_cookie = register(&server, "admin").await;
        let driver_cookie = register(&server, "driver").await;

        server
            .get(endpoints::ADMIN_USERS_VIEW)
            .add_cookie(admin_cookie)
            .await
            .assert_status_ok();
        server
            .get(endpoints::ADMIN_USERS_VIEW)
            .add_cookie(driver_cookie.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get(endpoints::INCOME_VIEW)
            .add_cookie(driver_cookie)
            .await
            .assert_status_ok();
    }
}
