use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use ambulance_dispatch::config::EnvironmentConfig;
use ambulance_dispatch::models::UserRole;
use ambulance_dispatch::repositories::MemoryDispatchStore;
use ambulance_dispatch::services::ChangeFeed;
use ambulance_dispatch::{create_router, AppState};

struct TestApp {
    state: AppState,
    router: Router,
    admin_token: String,
}

struct TestDriver {
    token: String,
    driver_id: String,
    ambulance_id: String,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryDispatchStore::new());
        let state = AppState::new(store, EnvironmentConfig::default(), ChangeFeed::default());
        state.start_dashboard().await.unwrap();

        let admin_token = state
            .jwt
            .generate_token(Uuid::new_v4(), UserRole::Admin, Duration::hours(1))
            .unwrap();

        Self {
            router: create_router(state.clone()),
            state,
            admin_token,
        }
    }

    async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.send_raw(method, uri, token, body).await;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin_token.clone();
        self.send(method, uri, Some(&token), body).await
    }

    /// Registrar un conductor y su ambulancia en la posición indicada
    async fn driver_with_ambulance(&self, plate: &str, latitude: f64, longitude: f64) -> TestDriver {
        let user_id = Uuid::new_v4();
        let (status, body) = self
            .admin(
                Method::POST,
                "/api/admin/drivers",
                Some(json!({
                    "user_id": user_id,
                    "full_name": format!("Driver {}", plate),
                    "phone": "+234 803 555 0199",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let driver_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .admin(
                Method::POST,
                "/api/admin/ambulances",
                Some(json!({
                    "plate_number": plate,
                    "driver_id": driver_id,
                    "base_latitude": 9.05,
                    "base_longitude": 7.45,
                    "current_latitude": latitude,
                    "current_longitude": longitude,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let ambulance_id = body["data"]["id"].as_str().unwrap().to_string();

        let token = self
            .state
            .jwt
            .generate_token(user_id, UserRole::Driver, Duration::hours(1))
            .unwrap();

        TestDriver {
            token,
            driver_id,
            ambulance_id,
        }
    }

    async fn submit(&self, latitude: f64, longitude: f64) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/requests",
            None,
            Some(json!({
                "requester_name": "Amina",
                "requester_phone": "+234 803 555 0101",
                "emergency_type": "cardiac",
                "latitude": latitude,
                "longitude": longitude,
            })),
        )
        .await
    }

    async fn advance(&self, driver: &TestDriver, request_id: &str, status: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/driver/requests/{}/status", request_id),
            Some(&driver.token),
            Some(json!({ "status": status })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_submission_assigns_nearest_ambulance() {
    let app = TestApp::new().await;
    let near = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;
    let _far = app.driver_with_ambulance("ABJ-002", 9.00, 7.50).await;

    let (status, body) = app.submit(9.081, 7.401).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["request"]["status"], "assigned");
    assert_eq!(body["data"]["ambulance"]["id"], near.ambulance_id.as_str());
    assert_eq!(body["data"]["request"]["assigned_driver_id"], near.driver_id.as_str());

    let (_, ambulance) = app
        .admin(Method::GET, &format!("/api/admin/ambulances/{}", near.ambulance_id), None)
        .await;
    assert_eq!(ambulance["status"], "busy");
}

#[tokio::test]
async fn test_submission_without_candidate_stays_pending() {
    let app = TestApp::new().await;
    app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (_, first) = app.submit(9.08, 7.40).await;
    assert_eq!(first["data"]["request"]["status"], "assigned");

    let (status, second) = app.submit(9.08, 7.40).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["data"]["request"]["status"], "pending");
    assert!(second["data"]["ambulance"].is_null());
    assert!(second["message"].as_str().unwrap().contains("search"));
}

#[tokio::test]
async fn test_invalid_submission_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/requests",
            None,
            Some(json!({
                "requester_phone": "not a phone",
                "emergency_type": "alien",
                "latitude": 123.0,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    for field in ["requester_phone", "emergency_type", "latitude", "longitude"] {
        assert!(body["details"].get(field).is_some(), "missing {}", field);
    }

    let (_, requests) = app.admin(Method::GET, "/api/admin/requests", None).await;
    assert_eq!(requests.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/requests",
            None,
            Some(json!({ "latitude": "north" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_tracking_is_case_insensitive() {
    let app = TestApp::new().await;
    let (_, body) = app.submit(9.08, 7.40).await;
    let code = body["data"]["tracking_code"].as_str().unwrap().to_string();
    assert!(code.starts_with("SC-"));

    let (status, tracked) = app
        .send(
            Method::GET,
            &format!("/api/requests/track/{}", code.to_lowercase()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracked["tracking_code"], code.as_str());
    assert_eq!(tracked["status"], "pending");
    assert!(tracked.get("requester_phone").is_none());

    let (status, _) = app
        .send(Method::GET, "/api/requests/track/SC-ZZZZZZZZ", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::GET, "/api/requests/track/nope", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_driver_cannot_advance() {
    let app = TestApp::new().await;
    let assigned = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;
    let other = app.driver_with_ambulance("ABJ-002", 12.0, 8.5).await;

    let (_, body) = app.submit(9.08, 7.40).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["ambulance"]["id"], assigned.ambulance_id.as_str());

    let (status, body) = app.advance(&other, &request_id, "en_route").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (_, request) = app
        .admin(Method::GET, &format!("/api/admin/requests/{}", request_id), None)
        .await;
    assert_eq!(request["status"], "assigned");
}

#[tokio::test]
async fn test_driver_completes_trip() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.00, 7.30).await;

    let (_, body) = app.submit(9.10, 7.45).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, assignment) = app
        .send(Method::GET, "/api/driver/assignment", Some(&driver.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assignment["data"]["request"]["id"], request_id.as_str());

    // Saltarse un paso es ilegal
    let (status, body) = app.advance(&driver, &request_id, "arrived").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ILLEGAL_TRANSITION");

    let (status, _) = app.advance(&driver, &request_id, "en_route").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.advance(&driver, &request_id, "arrived").await;
    assert_eq!(status, StatusCode::OK);
    let (_, ambulance) = app
        .admin(Method::GET, &format!("/api/admin/ambulances/{}", driver.ambulance_id), None)
        .await;
    assert_eq!(ambulance["status"], "arrived");
    assert_eq!(ambulance["current_latitude"], 9.10);
    assert_eq!(ambulance["current_longitude"], 7.45);

    let (status, body) = app.advance(&driver, &request_id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert!(!body["data"]["completed_at"].is_null());

    let (_, ambulance) = app
        .admin(Method::GET, &format!("/api/admin/ambulances/{}", driver.ambulance_id), None)
        .await;
    assert_eq!(ambulance["status"], "available");
    assert_eq!(ambulance["current_latitude"], 9.10);

    // Estado final: nada más cambia
    let (status, _) = app
        .admin(Method::POST, &format!("/api/admin/requests/{}/cancel", request_id), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, assignment) = app
        .send(Method::GET, "/api/driver/assignment", Some(&driver.token), None)
        .await;
    assert!(assignment["data"]["request"].is_null());
}

#[tokio::test]
async fn test_admin_cancel_releases_ambulance() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (_, body) = app.submit(9.08, 7.40).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .admin(Method::POST, &format!("/api/admin/requests/{}/cancel", request_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (_, ambulance) = app
        .admin(Method::GET, &format!("/api/admin/ambulances/{}", driver.ambulance_id), None)
        .await;
    assert_eq!(ambulance["status"], "available");
}

#[tokio::test]
async fn test_pending_request_dispatched_on_retry() {
    let app = TestApp::new().await;

    let (_, body) = app.submit(9.08, 7.40).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["request"]["status"], "pending");

    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (status, body) = app
        .admin(Method::POST, &format!("/api/admin/requests/{}/dispatch", request_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["request"]["status"], "assigned");
    assert_eq!(body["data"]["ambulance"]["id"], driver.ambulance_id.as_str());
}

#[tokio::test]
async fn test_manual_assignment_rejects_busy_ambulance() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (_, first) = app.submit(9.08, 7.40).await;
    assert_eq!(first["data"]["request"]["status"], "assigned");
    let (_, second) = app.submit(9.08, 7.40).await;
    let second_id = second["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .admin(
            Method::POST,
            &format!("/api/admin/requests/{}/assign", second_id),
            Some(json!({ "ambulance_id": driver.ambulance_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (status, _) = app.send(Method::GET, "/api/admin/ambulances", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/admin/ambulances", Some(&driver.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/api/admin/ambulances", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_driver_without_profile_is_forbidden() {
    let app = TestApp::new().await;
    let token = app
        .state
        .jwt
        .generate_token(Uuid::new_v4(), UserRole::Driver, Duration::hours(1))
        .unwrap();

    let (status, _) = app
        .send(Method::GET, "/api/driver/assignment", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_driver_reports_location() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/driver/location",
            Some(&driver.token),
            Some(json!({ "latitude": 9.2, "longitude": 7.6 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_latitude"], 9.2);
    assert_eq!(body["data"]["status"], "available");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/driver/location",
            Some(&driver.token),
            Some(json!({ "latitude": 95.0, "longitude": 7.6 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_offline_ambulance_is_not_dispatched() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;
    let uri = format!("/api/admin/ambulances/{}/status", driver.ambulance_id);

    let (status, _) = app.admin(Method::PUT, &uri, Some(json!({ "status": "offline" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.submit(9.08, 7.40).await;
    assert_eq!(body["data"]["request"]["status"], "pending");

    let (status, body) = app.admin(Method::PUT, &uri, Some(json!({ "status": "available" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "available");

    let (status, _) = app.admin(Method::PUT, &uri, Some(json!({ "status": "busy" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_duplicate_plate_conflicts() {
    let app = TestApp::new().await;
    let body = json!({
        "plate_number": "ABJ-777",
        "base_latitude": 9.05,
        "base_longitude": 7.45,
    });

    let (status, _) = app.admin(Method::POST, "/api/admin/ambulances", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.admin(Method::POST, "/api/admin/ambulances", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_dashboard_stats_follow_changes() {
    let app = TestApp::new().await;
    app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;
    app.submit(9.08, 7.40).await;
    app.submit(9.08, 7.40).await;

    // El dashboard consume el feed en segundo plano
    let mut stats = Value::Null;
    for _ in 0..50 {
        let (_, body) = app.admin(Method::GET, "/api/admin/stats", None).await;
        stats = body;
        if stats["active_requests"] == 2 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }

    assert_eq!(stats["active_requests"], 2);
    assert_eq!(stats["available_ambulances"], 0);
}

#[tokio::test]
async fn test_tracking_stream_ends_on_terminal_status() {
    let app = TestApp::new().await;
    let (_, body) = app.submit(9.08, 7.40).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();
    let code = body["data"]["tracking_code"].as_str().unwrap().to_string();

    app.admin(Method::POST, &format!("/api/admin/requests/{}/cancel", request_id), None)
        .await;

    let (status, text) = app
        .send_raw(
            Method::GET,
            &format!("/api/requests/track/{}/events", code),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("event: tracking"));
    assert!(text.contains("\"status\":\"cancelled\""));
}

#[tokio::test]
async fn test_submission_is_rate_limited() {
    let store = Arc::new(MemoryDispatchStore::new());
    let config = EnvironmentConfig {
        rate_limit_requests: 1,
        ..EnvironmentConfig::default()
    };
    let state = AppState::new(store, config, ChangeFeed::default());
    let router = create_router(state);

    let submit = || {
        Request::builder()
            .method(Method::POST)
            .uri("/api/requests")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::from(
                json!({
                    "requester_phone": "08035550101",
                    "emergency_type": "fire",
                    "latitude": 9.0,
                    "longitude": 7.4,
                })
                .to_string(),
            ))
            .unwrap()
    };

    let first = router.clone().oneshot(submit()).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = router.oneshot(submit()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_direct_clients_get_separate_quotas() {
    let store = Arc::new(MemoryDispatchStore::new());
    let config = EnvironmentConfig {
        rate_limit_requests: 1,
        ..EnvironmentConfig::default()
    };
    let router = create_router(AppState::new(store, config, ChangeFeed::default()));

    let submit_from = |peer: &str| {
        let addr: SocketAddr = peer.parse().unwrap();
        Request::builder()
            .method(Method::POST)
            .uri("/api/requests")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(addr))
            .body(Body::from(
                json!({
                    "requester_phone": "08035550101",
                    "emergency_type": "medical",
                    "latitude": 9.0,
                    "longitude": 7.4,
                })
                .to_string(),
            ))
            .unwrap()
    };

    let first = router.clone().oneshot(submit_from("198.51.100.1:40000")).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let other = router.clone().oneshot(submit_from("198.51.100.2:40000")).await.unwrap();
    assert_eq!(other.status(), StatusCode::CREATED);
    let again = router.oneshot(submit_from("198.51.100.1:40001")).await.unwrap();
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_offline_ambulance_is_not_released_by_cancel() {
    let app = TestApp::new().await;
    let driver = app.driver_with_ambulance("ABJ-001", 9.08, 7.40).await;

    let (_, body) = app.submit(9.08, 7.40).await;
    let request_id = body["data"]["request"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["ambulance"]["id"], driver.ambulance_id.as_str());

    let (status, _) = app
        .admin(
            Method::PUT,
            &format!("/api/admin/ambulances/{}/status", driver.ambulance_id),
            Some(json!({ "status": "offline" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .admin(Method::POST, &format!("/api/admin/requests/{}/cancel", request_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, ambulance) = app
        .admin(Method::GET, &format!("/api/admin/ambulances/{}", driver.ambulance_id), None)
        .await;
    assert_eq!(ambulance["status"], "offline");

    let (_, next) = app.submit(9.08, 7.40).await;
    assert_eq!(next["data"]["request"]["status"], "pending");
    assert!(next["data"]["ambulance"].is_null());
}
