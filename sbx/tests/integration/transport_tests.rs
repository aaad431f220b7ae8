use sbx::{HttpPool, RemotePool, TransportError};
use sbx_common::protocol::{WireRequest, WireResponse};

use crate::common::{MockPoolServer, PoolBehavior, init_test_logging};

fn request() -> WireRequest {
    WireRequest {
        session_id: "session-1".to_string(),
        script: "#!/bin/bash\nset -e\necho hi\n".to_string(),
        archive: None,
    }
}

#[tokio::test]
async fn test_http_pool_posts_request_and_decodes_response() {
    init_test_logging();
    crate::test_log!("TEST START: test_http_pool_posts_request_and_decodes_response");

    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse {
        stdout: "hi\n".to_string(),
        exit_status: 0,
        duration_ms: Some(12),
        ..WireResponse::default()
    }))
    .await;

    let pool = HttpPool::new(Some("pool-token".to_string())).unwrap();
    let response = pool
        .execute(&format!("{}/", server.endpoint()), &request())
        .await
        .unwrap();

    assert_eq!(response.stdout, "hi\n");
    assert_eq!(response.duration_ms, Some(12));

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body.session_id, "session-1");
    assert_eq!(received[0].authorization.as_deref(), Some("Bearer pool-token"));

    crate::test_log!("TEST PASS: test_http_pool_posts_request_and_decodes_response");
}

#[tokio::test]
async fn test_http_pool_without_token_sends_no_authorization() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse::default())).await;

    let pool = HttpPool::new(None).unwrap();
    pool.execute(&server.endpoint(), &request()).await.unwrap();

    assert!(server.received()[0].authorization.is_none());
}

#[tokio::test]
async fn test_http_pool_reports_non_success_status() {
    init_test_logging();
    crate::test_log!("TEST START: test_http_pool_reports_non_success_status");

    let server = MockPoolServer::start(PoolBehavior::Status(503, "pool exhausted".to_string())).await;
    let pool = HttpPool::new(None).unwrap();

    let err = pool.execute(&server.endpoint(), &request()).await.unwrap_err();
    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "pool exhausted");
        }
        other => panic!("expected status error, got {other:?}"),
    }

    crate::test_log!("TEST PASS: test_http_pool_reports_non_success_status");
}

#[tokio::test]
async fn test_http_pool_truncates_long_error_bodies() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Status(500, "x".repeat(4096))).await;
    let pool = HttpPool::new(None).unwrap();

    let err = pool.execute(&server.endpoint(), &request()).await.unwrap_err();
    let TransportError::Status { body, .. } = err else {
        panic!("expected status error");
    };
    assert!(body.len() < 4096);
}

#[tokio::test]
async fn test_http_pool_rejects_malformed_response() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::RawBody("not json".to_string())).await;
    let pool = HttpPool::new(None).unwrap();

    let err = pool.execute(&server.endpoint(), &request()).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn test_http_pool_connection_refused_is_request_error() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse::default())).await;
    let endpoint = server.endpoint();
    drop(server);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let pool = HttpPool::new(None).unwrap();
    let err = pool.execute(&endpoint, &request()).await.unwrap_err();
    assert!(matches!(err, TransportError::Request(_)), "{err:?}");
}
