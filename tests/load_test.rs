//! Concurrency tests for admission control.

use std::sync::Arc;

use api_shield::fetch::HttpTransport;
use api_shield::security::DnsResolver;
use api_shield::HttpServer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

mod common;

use common::{MockTransport, Reply, StaticResolver, TODO_JSON};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_exceed_capacity() {
    let transport = MockTransport::new(Reply::Status(200, TODO_JSON));
    let upstream: Arc<dyn HttpTransport> = transport.clone();
    let resolver: Arc<dyn DnsResolver> = StaticResolver::public();
    let app = HttpServer::with_components(common::config_with_capacity(10), upstream, resolver)
        .router();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri("/api/v1/fetch-external?url=https://jsonplaceholder.typicode.com/todos/1")
                .header("x-user-id", "hammer")
                .body(Body::empty())
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(ok, 10);
    assert_eq!(limited, 40);
    assert_eq!(transport.calls(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_callers_have_independent_buckets() {
    let upstream: Arc<dyn HttpTransport> = MockTransport::new(Reply::Status(200, TODO_JSON));
    let resolver: Arc<dyn DnsResolver> = StaticResolver::public();
    let app = HttpServer::with_components(common::config_with_capacity(3), upstream, resolver)
        .router();

    let mut handles = Vec::new();
    for caller in 0..20 {
        for _ in 0..3 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                let request = Request::builder()
                    .uri("/api/v1/fetch-external?url=https://jsonplaceholder.typicode.com/todos/1")
                    .header("x-user-id", format!("caller-{}", caller))
                    .body(Body::empty())
                    .unwrap();
                app.oneshot(request).await.unwrap().status()
            }));
        }
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
}
