// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Integration Tests for the HTTP feed and Salesforce clients
//!
//! Each test starts a one-shot HTTP server on an ephemeral local port that
//! answers by method and path.

use anyhow::Result;
use optout_sync::checkpoint::{MemoryCheckpointStore, SequenceId, Watermark};
use optout_sync::crm::{
    CrmClient, CrmError, SalesforceClient, SalesforceCredentials,
};
use optout_sync::feed::{FeedClient, FeedEntry, FeedError, HttpFeedClient, MockFeedClient};
use optout_sync::reconcile::{reconcile_all, ReconciliationOutcome};
use optout_sync::sync::{RunState, SyncRunner};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

type Responder = Arc<dyn Fn(&str, &str, &str) -> (u16, String) + Send + Sync>;

struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// `respond(method, path, base_url)` returns the status and JSON body
    async fn start<F>(respond: F) -> Result<Self>
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Responder = Arc::new(respond);

        let log = requests.clone();
        let base = base_url.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let respond = respond.clone();
                let log = log.clone();
                let base = base.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, respond, log, base).await;
                });
            }
        });

        Ok(Self { base_url, requests })
    }

    async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

async fn serve_one(
    mut stream: TcpStream,
    respond: Responder,
    log: Arc<Mutex<Vec<String>>>,
    base_url: String,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();
    log.lock().await.push(format!("{} {}", method, path));

    let (status, body) = respond(&method, &path, &base_url);
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

const TOKEN_PATH: &str = "/services/oauth2/token";
const QUERY_PATH: &str = "/services/data/v59.0/query";
const UPDATE_PATH: &str = "/services/data/v59.0/composite/sobjects";

/// Salesforce stub that logs in, finds every email, and answers updates
/// with `update_status` / `update_body`
async fn salesforce_stub(update_status: u16, update_body: &'static str) -> Result<StubServer> {
    StubServer::start(move |method, path, base_url| match (method, path) {
        ("POST", TOKEN_PATH) => (
            200,
            format!(
                r#"{{"access_token":"00Dtoken","instance_url":"{}","token_type":"Bearer"}}"#,
                base_url
            ),
        ),
        ("GET", QUERY_PATH) => (
            200,
            r#"{"totalSize":1,"done":true,"records":[{"Id":"003A","Email":"a@x.com","HasOptedOutOfEmail":false}]}"#
                .to_string(),
        ),
        ("PATCH", UPDATE_PATH) => (update_status, update_body.to_string()),
        _ => (404, "[]".to_string()),
    })
    .await
}

async fn logged_in_client(server: &StubServer) -> Result<SalesforceClient> {
    let credentials = SalesforceCredentials {
        login_url: server.base_url.clone(),
        api_version: "v59.0".to_string(),
        client_id: "cid".to_string(),
        client_secret: "csecret".to_string(),
        username: "ops@example.com".to_string(),
        password: "pw".to_string(),
        security_token: "tok".to_string(),
    };
    let mut client = SalesforceClient::new(credentials, Duration::from_secs(5))?;
    client.authenticate().await?;
    Ok(client)
}

fn emails(list: &[&str]) -> Vec<String> {
    list.iter().map(|e| e.to_string()).collect()
}

// ==================== Salesforce Update Path ====================

#[tokio::test]
async fn test_update_outage_interrupts_reconciliation() -> Result<()> {
    let server = salesforce_stub(503, r#"[{"errorCode":"SERVER_UNAVAILABLE"}]"#).await?;
    let client = logged_in_client(&server).await?;

    let result = reconcile_all(&client, &emails(&["a@x.com", "a@x.com"])).await;

    let err = result.expect_err("a 503 on update must stop the pass");
    assert!(matches!(err.source, CrmError::Transport(_)));
    assert_eq!(err.attempted, 0);
    assert_eq!(err.total, 2);
    let patches = server
        .requests()
        .await
        .iter()
        .filter(|r| r.starts_with("PATCH"))
        .count();
    assert_eq!(patches, 1);
    Ok(())
}

#[tokio::test]
async fn test_expired_session_on_update_is_auth_error() -> Result<()> {
    let server = salesforce_stub(
        401,
        r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#,
    )
    .await?;
    let client = logged_in_client(&server).await?;

    let result = reconcile_all(&client, &emails(&["a@x.com"])).await;

    let err = result.expect_err("a 401 on update must stop the pass");
    assert!(matches!(err.source, CrmError::Auth(_)));
    Ok(())
}

#[tokio::test]
async fn test_rate_limited_update_is_transport_error() -> Result<()> {
    let server = salesforce_stub(429, "").await?;
    let client = logged_in_client(&server).await?;

    let result = reconcile_all(&client, &emails(&["a@x.com"])).await;

    assert!(matches!(
        result.map_err(|e| e.source),
        Err(CrmError::Transport(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_per_record_rejection_is_recorded_as_failed() -> Result<()> {
    let server = salesforce_stub(
        200,
        r#"[{"id":"003A","success":false,"errors":[{"statusCode":"UNABLE_TO_LOCK_ROW","message":"unable to obtain exclusive access to this record","fields":[]}]}]"#,
    )
    .await?;
    let client = logged_in_client(&server).await?;

    let report = reconcile_all(&client, &emails(&["a@x.com"])).await?;

    assert_eq!(report.counts().failed, 1);
    assert!(matches!(
        &report.outcomes[0].outcome,
        ReconciliationOutcome::Failed(reason) if reason.contains("UNABLE_TO_LOCK_ROW")
    ));
    Ok(())
}

#[tokio::test]
async fn test_successful_update() -> Result<()> {
    let server = salesforce_stub(200, r#"[{"id":"003A","success":true,"errors":[]}]"#).await?;
    let client = logged_in_client(&server).await?;

    let report = reconcile_all(&client, &emails(&["a@x.com"])).await?;

    assert_eq!(report.counts().success, 1);
    assert_eq!(
        server.requests().await,
        vec![
            format!("POST {}", TOKEN_PATH),
            format!("GET {}", QUERY_PATH),
            format!("PATCH {}", UPDATE_PATH),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_update_outage_does_not_checkpoint() -> Result<()> {
    let server = salesforce_stub(503, "").await?;
    let credentials = SalesforceCredentials {
        login_url: server.base_url.clone(),
        api_version: "v59.0".to_string(),
        client_id: "cid".to_string(),
        client_secret: "csecret".to_string(),
        username: "ops@example.com".to_string(),
        password: "pw".to_string(),
        security_token: String::new(),
    };
    let mut client = SalesforceClient::new(credentials, Duration::from_secs(5))?;

    let start = Watermark::At(SequenceId::Numeric(5));
    let store = MemoryCheckpointStore::with_watermark(start.clone());
    let feed = MockFeedClient::new(vec![
        FeedEntry::new(6, Some("a@x.com")),
        FeedEntry::new(7, Some("a@x.com")),
    ]);

    let report = SyncRunner::new(&store, &feed, &mut client).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert!(!report.watermark_persisted);
    assert_eq!(report.counts.failed, 0);
    assert_eq!(store.current().await, start);
    assert_eq!(store.save_count().await, 0);
    Ok(())
}

// ==================== Feed Client ====================

#[tokio::test]
async fn test_feed_client_parses_entries() -> Result<()> {
    let server = StubServer::start(|_, _, _| {
        (200, r#"[[3,"a@x.com"],[6,"b@x.com"],[7,null]]"#.to_string())
    })
    .await?;
    let client = HttpFeedClient::new(&format!("{}/unsubscribes", server.base_url), Duration::from_secs(5))?;

    let entries = client.fetch_all().await?;

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1], FeedEntry::new(6, Some("b@x.com")));
    assert_eq!(server.requests().await, vec!["GET /unsubscribes".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_feed_client_reports_http_status() -> Result<()> {
    let server = StubServer::start(|_, _, _| (503, String::new())).await?;
    let client = HttpFeedClient::new(&server.base_url, Duration::from_secs(5))?;

    let result = client.fetch_all().await;

    assert!(matches!(result, Err(FeedError::HttpStatus { status: 503 })));
    Ok(())
}

#[tokio::test]
async fn test_feed_client_rejects_non_array_body() -> Result<()> {
    let server = StubServer::start(|_, _, _| (200, r#"{"data":[]}"#.to_string())).await?;
    let client = HttpFeedClient::new(&server.base_url, Duration::from_secs(5))?;

    assert!(matches!(
        client.fetch_all().await,
        Err(FeedError::Malformed(_))
    ));
    Ok(())
}
