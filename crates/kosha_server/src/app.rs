//! I assemble the router and its middleware stack.
//!

use std::{any::Any, time::Duration};

use axum::{
    body::Body,
    extract::Request,
    http::{self, header, HeaderName, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::error;

use crate::{routes, state::AppState};

/// Build the application router over given state.
///
/// Middleware, outermost first: panic recovery, preflight
/// status shaping, request tracing, cors, request timeout.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health/", get(routes::health::health))
        .route("/resources", post(routes::resources::create))
        .route(
            "/resources/{id}",
            get(routes::resources::get)
                .head(routes::resources::head)
                .put(routes::resources::put)
                .delete(routes::resources::delete)
                .options(routes::resources::options),
        )
        .route("/containers", post(routes::containers::create))
        .route(
            "/containers/{id}",
            get(routes::containers::list)
                .delete(routes::containers::delete)
                .options(routes::resources::options),
        )
        .route(
            "/users",
            get(routes::accounts::list_users).post(routes::accounts::create_user),
        )
        .route(
            "/users/{id}",
            get(routes::accounts::get_user)
                .patch(routes::accounts::update_user)
                .delete(routes::accounts::delete_user),
        )
        .route("/accounts", post(routes::accounts::create_account))
        .route(
            "/accounts/{id}/invitations",
            post(routes::accounts::create_invitation),
        )
        .route(
            "/invitations/{token}/accept",
            post(routes::accounts::accept_invitation),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(preflight_no_content))
        .layer(CatchPanicLayer::custom(recover_panic))
        .with_state(state)
}

/// The liberal cors policy: any origin, the served methods,
/// the common request headers, and cached preflights.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Shape cors preflight responses as `204 No Content`. The
/// cors middleware answers them with `200` and an empty body;
/// the wire contract is `204`.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Map recovered handler panics onto the wire error shape.
fn recover_panic(_err: Box<dyn Any + Send + 'static>) -> http::Response<Body> {
    error!("Recovered a panicking handler.");
    http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"error":{"code":"INTERNAL","message":"Internal server error."}}"#,
        ))
        .expect("Static response must build.")
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Bytes;
    use bytes::Buf;
    use http_body_util::BodyExt;
    use kosha_index::ListingOptions;
    use rdf_codec::media_type;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.base_dir = dir.path().into();
        config.server.base_uri = "https://kosha.test".into();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let state = AppState::init_with_pool(&config, pool).await.unwrap();

        TestApp {
            router: build_router(state.clone(), Duration::from_secs(30)),
            state,
            _dir: dir,
        }
    }

    async fn send(
        app: &TestApp,
        request: http::Request<Body>,
    ) -> (StatusCode, http::HeaderMap, Bytes) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    fn json_of(body: &Bytes) -> serde_json::Value {
        serde_json::from_reader(body.clone().reader()).unwrap()
    }

    const NOTE_JSON_LD: &str = r#"[
        {
            "@id": "urn:example:note:1",
            "@type": ["https://www.w3.org/ns/activitystreams#Note"],
            "https://www.w3.org/ns/activitystreams#content": [{"@value": "hi"}]
        }
    ]"#;

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .uri("/health/")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn posted_jsonld_is_served_as_turtle() {
        let app = test_app().await;

        let (status, headers, body) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/resources")
                .header("content-type", "application/ld+json")
                .body(Body::from(NOTE_JSON_LD))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let location = headers[header::LOCATION].to_str().unwrap().to_owned();
        assert!(location.starts_with("/resources/"));
        assert!(headers.contains_key(header::ETAG));

        let body = json_of(&body);
        assert_eq!(body["contentType"], "application/ld+json");
        assert!(body["message"].as_str().unwrap().contains("created"));

        let (status, headers, body) = send(
            &app,
            http::Request::builder()
                .uri(location.as_str())
                .header("accept", "text/turtle")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_TYPE].to_str().unwrap(),
            "text/turtle"
        );
        let turtle = std::str::from_utf8(&body).unwrap();
        assert!(turtle.contains("urn:example:note:1"));
        assert!(turtle.contains("hi"));
    }

    #[tokio::test]
    async fn put_creates_then_replaces_with_new_etag() {
        let app = test_app().await;

        let (status, headers1, _) = send(
            &app,
            http::Request::builder()
                .method("PUT")
                .uri("/resources/test-update")
                .header("content-type", "text/turtle")
                .body(Body::from("<urn:a> <urn:b> <urn:c>."))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, headers2, _) = send(
            &app,
            http::Request::builder()
                .method("PUT")
                .uri("/resources/test-update")
                .header("content-type", "text/turtle")
                .body(Body::from("<urn:a> <urn:b> <urn:d>."))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(headers1[header::ETAG], headers2[header::ETAG]);
    }

    #[tokio::test]
    async fn missing_content_type_is_a_400() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/resources")
                .body(Body::from("<urn:a> <urn:b> <urn:c>."))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"]["code"], "MISSING_CONTENT_TYPE");
    }

    #[tokio::test]
    async fn delete_then_get_is_a_stable_404() {
        let app = test_app().await;

        let (_, headers, _) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/resources")
                .header("content-type", "text/turtle")
                .body(Body::from("<urn:a> <urn:b> <urn:c>."))
                .unwrap(),
        )
        .await;
        let location = headers[header::LOCATION].to_str().unwrap().to_owned();

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("DELETE")
                .uri(location.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json_of(&body)["message"].as_str().unwrap().contains("deleted"));

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .uri(location.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_of(&body)["error"]["code"], "RESOURCE_NOT_FOUND");

        // Deleting again reports the same absence.
        let (status, _, _) = send(
            &app,
            http::Request::builder()
                .method("DELETE")
                .uri(location.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_gets_204_with_allowed_methods() {
        let app = test_app().await;
        let (status, headers, _) = send(
            &app,
            http::Request::builder()
                .method("OPTIONS")
                .uri("/resources/x")
                .header(header::ORIGIN, "https://app.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap();
        assert!(allowed.contains("POST"));
    }

    #[tokio::test]
    async fn bare_options_lists_methods() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("OPTIONS")
                .uri("/resources/x")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let methods = json_of(&body)["methods"].clone();
        assert!(methods.as_array().unwrap().iter().any(|m| m == "POST"));
    }

    #[tokio::test]
    async fn unsupported_accept_is_a_406() {
        let app = test_app().await;

        let (_, headers, _) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/resources")
                .header("content-type", "text/turtle")
                .body(Body::from("<urn:a> <urn:b> <urn:c>."))
                .unwrap(),
        )
        .await;
        let location = headers[header::LOCATION].to_str().unwrap().to_owned();

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .uri(location.as_str())
                .header("accept", "application/xml")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(json_of(&body)["error"]["code"], "NOT_ACCEPTABLE");
    }

    #[tokio::test]
    async fn container_listing_paginates_with_stats() {
        let app = test_app().await;

        let container = app
            .state
            .storage
            .create_container(None, None, None)
            .await
            .unwrap();
        for i in 0..25 {
            app.state
                .storage
                .create_resource(
                    Some(container.id),
                    Bytes::from_static(b"<urn:a> <urn:b> <urn:c>."),
                    &media_type::TEXT_TURTLE,
                    None,
                    Some(format!("doc-{:02}", i)),
                )
                .await
                .unwrap();
        }

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .uri(format!(
                    "/containers/{}?limit=10&offset=10&sort=name:asc",
                    container.id
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["memberCount"], 25);
        let members = body["members"].as_array().unwrap();
        assert_eq!(members.len(), 10);
        assert_eq!(members[0]["name"], "doc-10");
    }

    #[tokio::test]
    async fn container_delete_refuses_non_empty_then_deep_deletes() {
        let app = test_app().await;

        let container = app
            .state
            .storage
            .create_container(None, None, None)
            .await
            .unwrap();
        app.state
            .storage
            .create_resource(
                Some(container.id),
                Bytes::from_static(b"<urn:a> <urn:b> <urn:c>."),
                &media_type::TEXT_TURTLE,
                None,
                None,
            )
            .await
            .unwrap();

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("DELETE")
                .uri(format!("/containers/{}", container.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"]["code"], "CONTAINER_NOT_EMPTY");

        let (status, _, _) = send(
            &app,
            http::Request::builder()
                .method("DELETE")
                .uri(format!("/containers/{}?deep=true", container.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The container listing is gone with it.
        assert!(app
            .state
            .storage
            .list_container(container.id, &ListingOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn user_registration_round_trips() {
        let app = test_app().await;

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/users")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"email": "alice@example.org", "name": "Alice"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = json_of(&body);
        assert!(created["webid"]
            .as_str()
            .unwrap()
            .starts_with("https://kosha.test/users/"));

        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .uri(format!("/users/{}", created["id"].as_str().unwrap()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["email"], "alice@example.org");

        // Same email again: a stable conflict.
        let (status, _, body) = send(
            &app,
            http::Request::builder()
                .method("POST")
                .uri("/users")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"email": "alice@example.org", "name": "Imposter"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"]["code"], "ALREADY_EXISTS");
    }
}
