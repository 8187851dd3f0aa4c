//! Integration Tests for the Weibo ingestion passes
//!
//! Uses wiremock to stand in for the Weibo API and the in-memory store for
//! persistence.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weibo_ingestion::http_client::{ApiHttpClient, HttpClientConfig};
use weibo_ingestion::sources::{Timeline, WeiboApiSource};
use weibo_ingestion::store::{Collection, MemoryStore};
use weibo_ingestion::throttle::NoPause;
use weibo_ingestion::{BatchResult, CommentPassPolicy, FetchOutcome, IngestSettings, Ingestor, WeiboSource};

fn source(server: &MockServer) -> WeiboApiSource {
    let client = ApiHttpClient::new(&format!("{}/2", server.uri()), HttpClientConfig::default()).unwrap();
    WeiboApiSource::new(Arc::new(client), "comments-token", "statuses-token", 200)
}

fn comment(id: i64, status_id: i64, user_id: i64) -> Value {
    json!({
        "id": id,
        "created_at": "Wed Jun 01 00:50:25 +0800 2011",
        "text": format!("comment {id}"),
        "source": "<a href=\"http://weibo.com\">新浪微博</a>",
        "user": { "id": user_id, "screen_name": format!("user{user_id}") },
        "mid": id.to_string(),
        "status": { "id": status_id, "text": "status", "comments_count": 5 }
    })
}

fn rate_limited() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "error": "User requests out of rate limit!",
        "error_code": 10023,
        "request": "/2/comments/show.json"
    }))
}

async fn mount_comments(server: &MockServer, status_id: i64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/2/comments/show.json"))
        .and(query_param("id", status_id.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_comments_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/comments/show.json"))
        .and(query_param("id", "42"))
        .and(query_param("page", "1"))
        .and(query_param("count", "200"))
        .and(query_param("access_token", "comments-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "comments": [comment(1, 42, 7), comment(2, 42, 8)],
            "total_number": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    match source(&server).fetch_comments(42).await {
        FetchOutcome::Data(page) => {
            let comments = page.records;
            assert_eq!(comments.len(), 2);
            assert_eq!(comments[0].status_id(), Some(42));
            assert_eq!(comments[1].user.as_ref().map(|u| u.id), Some(8));
        }
        other => panic!("expected data, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_page_is_empty() {
    let server = MockServer::start().await;
    mount_comments(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({ "comments": [], "total_number": 0 })),
    )
    .await;

    assert_eq!(source(&server).fetch_comments(1).await, FetchOutcome::Empty);
}

#[tokio::test]
async fn test_failures_are_hard_limits() {
    let server = MockServer::start().await;
    mount_comments(&server, 1, rate_limited()).await;
    mount_comments(
        &server,
        2,
        ResponseTemplate::new(200).set_body_json(json!({ "error": "expired_token", "error_code": 21327 })),
    )
    .await;
    mount_comments(&server, 3, ResponseTemplate::new(500)).await;
    mount_comments(&server, 4, ResponseTemplate::new(200).set_body_string("<html>busy</html>")).await;

    let source = source(&server);
    for id in 1..=4 {
        assert_eq!(source.fetch_comments(id).await, FetchOutcome::HardLimit, "status {id}");
    }
}

#[tokio::test]
async fn test_timeline_uses_statuses_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/statuses/public_timeline.json"))
        .and(query_param("access_token", "statuses-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statuses": [{ "id": 1, "comments_count": 0 }],
            "total_number": 1
        })))
        .mount(&server)
        .await;

    match source(&server).fetch_timeline(Timeline::Public).await {
        FetchOutcome::Data(statuses) => assert!(statuses.records[0].has_no_comments()),
        other => panic!("expected data, got {other:?}"),
    }
}

#[tokio::test]
async fn test_comment_pass_halts_on_rate_limit() {
    let server = MockServer::start().await;
    mount_comments(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({ "comments": [comment(11, 1, 7), comment(12, 1, 8)] })),
    )
    .await;
    mount_comments(&server, 2, ResponseTemplate::new(200).set_body_json(json!({ "comments": [] }))).await;
    mount_comments(&server, 3, rate_limited()).await;
    Mock::given(method("GET"))
        .and(path("/2/comments/show.json"))
        .and(query_param("id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "comments": [comment(41, 4, 7)] })))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.seed(
        Collection::Statuses,
        (1..=4).map(|id| json!({ "id": id, "comments_count": 5 })),
    );

    let pause = Arc::new(NoPause::new());
    let ingestor = Ingestor::new(store.clone(), Arc::new(source(&server)), IngestSettings::default())
        .with_pause(pause.clone());
    let policy = CommentPassPolicy {
        slow: true,
        ..Default::default()
    };
    let result = ingestor.ingest_comments_for_all_statuses(policy).await.unwrap();

    assert_eq!(result, BatchResult::new(2, 2));
    assert_eq!(store.len(Collection::Comments), 2);
    assert_eq!(store.get(Collection::Statuses, 2).unwrap()["comments_count"], 0);
    assert_eq!(store.get(Collection::Statuses, 3).unwrap()["comments_count"], 5);
    assert_eq!(pause.requested().len(), 1);

    // users come from the stored comments
    let users = ingestor.ingest_users_from_comments().await.unwrap();
    assert_eq!(users, BatchResult::new(2, 2));
}

#[tokio::test]
async fn test_undecodable_comments_are_misses_not_empty() {
    let server = MockServer::start().await;
    mount_comments(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({
            "comments": [{ "idstr": "11" }, { "id": null }, { "id": "13" }]
        })),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    store.seed(Collection::Statuses, vec![json!({ "id": 1, "comments_count": 3 })]);

    let ingestor = Ingestor::new(store.clone(), Arc::new(source(&server)), IngestSettings::default());
    let result = ingestor
        .ingest_comments_for_all_statuses(CommentPassPolicy::default())
        .await
        .unwrap();

    assert_eq!(result, BatchResult::new(3, 0));
    assert_eq!(store.len(Collection::Comments), 0);
    assert_eq!(store.get(Collection::Statuses, 1).unwrap()["comments_count"], 3);
    assert_eq!(store.updates_issued(), 0);
}

#[tokio::test]
async fn test_statuses_by_ids_drop_failed_fetches() {
    let server = MockServer::start().await;
    for (id, response) in [
        (1, ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "comments_count": 3 }))),
        (2, ResponseTemplate::new(500)),
        (3, ResponseTemplate::new(200).set_body_json(json!({ "id": 3, "comments_count": 0 }))),
    ] {
        Mock::given(method("GET"))
            .and(path("/2/statuses/show.json"))
            .and(query_param("id", id.to_string()))
            .respond_with(response)
            .mount(&server)
            .await;
    }

    let store = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::new(store.clone(), Arc::new(source(&server)), IngestSettings::default());
    let result = ingestor.ingest_statuses_by_ids(&[1, 2, 3]).await.unwrap();

    assert_eq!(result, BatchResult::new(2, 2));
    assert!(store.get(Collection::Statuses, 2).is_none());
}
