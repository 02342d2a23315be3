use nostream::{HttpClient, HttpSegmentFetcher, MediaSegment, NostreamError, SegmentFetcher};
use url::Url;
use wiremock::MockServer;

use crate::SegmentMock;

fn segment(server: &MockServer, mock_path: &str, hash: &str) -> MediaSegment {
    let url = Url::parse(&format!("{}{mock_path}", server.uri())).unwrap();
    MediaSegment::new(1, hash, url)
}

#[tokio::test]
async fn test_fetch_payload() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server.mock_segment("/seg.ts", b"payload").await;

    let fetcher = HttpSegmentFetcher::new(HttpClient::default());
    let bytes = fetcher.fetch(&segment(&server, "/seg.ts", "00")).await?;
    assert_eq!(bytes.as_ref(), b"payload");

    Ok(())
}

#[tokio::test]
async fn test_fetch_not_found() {
    let server = MockServer::start().await;
    server.mock_status("/gone.ts", 404).await;

    let fetcher = HttpSegmentFetcher::default();
    let error = fetcher
        .fetch(&segment(&server, "/gone.ts", "00"))
        .await
        .unwrap_err();
    assert!(matches!(error, NostreamError::SegmentUnavailable(_)));
    assert!(!error.is_transient());
}

#[tokio::test]
async fn test_fetch_server_error_is_transient() {
    let server = MockServer::start().await;
    server.mock_status("/busy.ts", 503).await;

    let fetcher = HttpSegmentFetcher::default();
    let error = fetcher
        .fetch(&segment(&server, "/busy.ts", "00"))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        NostreamError::HttpError(status) if status.as_u16() == 503
    ));
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_fetch_connection_refused_is_transient() {
    // nothing listens on the discard port
    let url = Url::parse("http://127.0.0.1:9/seg.ts").unwrap();
    let fetcher = HttpSegmentFetcher::default();
    let error = fetcher
        .fetch(&MediaSegment::new(1, "00", url))
        .await
        .unwrap_err();
    assert!(matches!(error, NostreamError::RequestError(_)));
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_fetch_verifies_hash() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server.mock_segment("/hello.ts", b"hello").await;
    // sha256("hello")
    let hello = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    let fetcher = HttpSegmentFetcher::default().with_verify_hash(true);
    let bytes = fetcher.fetch(&segment(&server, "/hello.ts", hello)).await?;
    assert_eq!(bytes.as_ref(), b"hello");

    let error = fetcher
        .fetch(&segment(&server, "/hello.ts", "00ff"))
        .await
        .unwrap_err();
    assert!(matches!(error, NostreamError::HashMismatch { .. }));

    // unchecked by default
    let fetcher = HttpSegmentFetcher::default();
    assert!(fetcher
        .fetch(&segment(&server, "/hello.ts", "00ff"))
        .await
        .is_ok());

    Ok(())
}
