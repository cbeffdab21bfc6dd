//! End-to-end dispatcher tests against mock backends.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use gateway_cache::{CacheManager, MemoryStore};
use gateway_config::{GatewayConfig, RouteConfig};
use gateway_server::{create_router, GatewayState, Server, NO_BACKEND_MESSAGE};
use tower::ServiceExt;
use wiremock::matchers::{body_string, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEAD_BACKEND: &str = "http://127.0.0.1:1";

fn state(routes: Vec<RouteConfig>, cached: bool) -> GatewayState {
    let config = GatewayConfig {
        routes,
        ..GatewayConfig::default()
    };
    let mut builder = GatewayState::builder().config(config);
    if cached {
        builder = builder.cache(CacheManager::memory(MemoryStore::default()));
    }
    builder.build().unwrap()
}

async fn backend_named(name: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(name))
        .mount(&server)
        .await;
    server
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_round_robin_alternates_backends() {
    let b1 = backend_named("b1").await;
    let b2 = backend_named("b2").await;
    let app = create_router(state(
        vec![RouteConfig::new("/api", [b1.uri(), b2.uri()])],
        false,
    ));

    let mut seen = Vec::new();
    for _ in 0..4 {
        let (status, _, body) = get(&app, "/api/x").await;
        assert_eq!(status, StatusCode::OK);
        seen.push(body);
    }
    assert_eq!(seen, vec!["b1", "b2", "b1", "b2"]);
}

#[tokio::test]
async fn test_failed_backend_is_skipped() {
    let b1 = backend_named("b1").await;
    let b2 = backend_named("b2").await;
    let state = state(vec![RouteConfig::new("/api", [b1.uri(), b2.uri()])], false);
    let app = create_router(state.clone());

    let balancer = state.balancer(&state.config.routes[0]);
    for _ in 0..3 {
        balancer.report_failure(&b1.uri());
    }

    for _ in 0..2 {
        let (status, _, body) = get(&app, "/api/x").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "b2");
    }
}

#[tokio::test]
async fn test_unreachable_backend_reports_failures() {
    let live = backend_named("live").await;
    let state = state(
        vec![RouteConfig::new("/api", [DEAD_BACKEND.to_string(), live.uri()])],
        false,
    );
    let app = create_router(state.clone());

    let mut statuses = Vec::new();
    for _ in 0..7 {
        let (status, _, body) = get(&app, "/api/x").await;
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            assert!(body.contains(DEAD_BACKEND));
        }
        statuses.push(status.as_u16());
    }

    // Three failures take the dead backend out of rotation
    assert_eq!(statuses, vec![500, 200, 500, 200, 500, 200, 200]);

    let statuses = state.balancer(&state.config.routes[0]).statuses();
    assert!(!statuses[0].healthy);
    assert_eq!(statuses[0].fail_count, 3);
    assert!(statuses[1].healthy);
    assert_eq!(statuses[1].recent_latencies.len(), 4);
}

#[tokio::test]
async fn test_cacheable_response_served_from_cache() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("payload")
                .insert_header("x-backend", "origin")
                .insert_header("server", "mock"),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/pub", [backend.uri()]).with_cache(30)],
        true,
    ));

    let (status, headers, body) = get(&app, "/pub/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "payload");
    assert_eq!(headers["server"], "mock");

    let (status, headers, body) = get(&app, "/pub/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "payload");
    assert_eq!(headers["x-backend"], "origin");
    assert!(headers.get("server").is_none());
    assert!(headers.get(header::DATE).is_none());
}

#[tokio::test]
async fn test_cache_paths_limit_caching() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/logo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("logo"))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(2)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/pub", [backend.uri()])
            .with_cache(30)
            .with_cache_paths(["/public"])],
        true,
    ));

    for _ in 0..2 {
        assert_eq!(get(&app, "/pub/public/logo").await.2, "logo");
        assert_eq!(get(&app, "/pub/private/data").await.2, "secret");
    }
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(2)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/pub", [backend.uri()]).with_cache(30)],
        true,
    ));

    for _ in 0..2 {
        let (status, _, body) = get(&app, "/pub/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "missing");
    }
}

#[tokio::test]
async fn test_distinct_bodies_use_distinct_cache_entries() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("one"))
        .respond_with(ResponseTemplate::new(200).set_body_string("first"))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(body_string("two"))
        .respond_with(ResponseTemplate::new(200).set_body_string("second"))
        .expect(1)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/pub", [backend.uri()]).with_cache(30)],
        true,
    ));

    for _ in 0..2 {
        let post = |body: &'static str| {
            Request::post("/pub/search").body(Body::from(body)).unwrap()
        };
        assert_eq!(send(&app, post("one")).await.2, "first");
        assert_eq!(send(&app, post("two")).await.2, "second");
    }
}

#[tokio::test]
async fn test_query_and_body_bytes_keep_separate_cache_entries() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("a", "1|x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("query-variant"))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(query_param("a", "1"))
        .and(body_string("x|"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body-variant"))
        .expect(1)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/pub", [backend.uri()]).with_cache(30)],
        true,
    ));

    let first = get(&app, "/pub/s?a=1|x").await.2;
    let second = send(
        &app,
        Request::get("/pub/s?a=1").body(Body::from("x|")).unwrap(),
    )
    .await
    .2;

    assert_eq!(first, "query-variant");
    assert_eq!(second, "body-variant");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&backend)
        .await;

    let mut config = GatewayConfig {
        routes: vec![RouteConfig::new("/api", [backend.uri()])],
        ..GatewayConfig::default()
    };
    config.server.max_body_size = 16;
    let app = create_router(GatewayState::builder().config(config).build().unwrap());

    let (status, _, _) = send(
        &app,
        Request::post("/api/upload").body(Body::from("x".repeat(64))).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _, body) = send(
        &app,
        Request::post("/api/upload").body(Body::from("small")).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "accepted");
}

#[tokio::test]
async fn test_request_is_rewritten_for_backend() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/42"))
        .and(query_param("page", "2"))
        .and(header_eq("x-api-key", "route-key"))
        .and(header_eq("user-agent", "gateway-test"))
        .and(body_string("hello"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_string("created")
                .insert_header("x-upstream", "yes"),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let app = create_router(state(
        vec![RouteConfig::new("/api", [backend.uri()])
            .with_custom_header("x-api-key", "route-key")
            .with_user_agent("gateway-test")],
        false,
    ));

    let request = Request::post("/api/users/42?page=2")
        .header(header::USER_AGENT, "curl/8")
        .header("x-api-key", "client-key")
        .body(Body::from("hello"))
        .unwrap();
    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "created");
    assert_eq!(headers["x-upstream"], "yes");
}

#[tokio::test]
async fn test_route_without_backends_is_unavailable() {
    let app = create_router(state(
        vec![RouteConfig::new("/empty", Vec::<String>::new())],
        false,
    ));

    let (status, headers, body) = get(&app, "/empty/x").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, NO_BACKEND_MESSAGE);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let backend = backend_named("b").await;
    let app = create_router(state(vec![RouteConfig::new("/api", [backend.uri()])], false));

    let (status, _, _) = get(&app, "/apix").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_and_request_id_on_proxied_responses() {
    let backend = backend_named("b").await;
    let app = create_router(state(vec![RouteConfig::new("/api", [backend.uri()])], false));

    let request = Request::get("/api/x")
        .header(header::ORIGIN, "https://app.example")
        .header("x-request-id", "req-1")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example"
    );
    assert_eq!(headers["x-request-id"], "req-1");
}

#[tokio::test]
async fn test_server_serves_until_shutdown() {
    let backend = backend_named("served").await;
    let state = state(vec![RouteConfig::new("/api", [backend.uri()])], true);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(Server::new(state).serve(listener, async {
        let _ = stopped.await;
    }));

    let body = reqwest::get(format!("http://{addr}/api/ping"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "served");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
