use std::sync::Arc;

use forum_client::models::{NewMessage, NotificationType};
use forum_client::storage::{KeyValueStore, MemoryStore, AUTH_TOKEN_KEY};
use forum_client::{ApiError, ClientConfig, ForumClient};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in_client(server: &MockServer) -> ForumClient {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store.set(AUTH_TOKEN_KEY, "tok-inbox").unwrap();
    ForumClient::with_store(&ClientConfig::new(server.uri()), store).unwrap()
}

#[tokio::test]
async fn messages_come_back_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/conversations/c1"))
        .and(query_param("limit", "50"))
        .and(header("authorization", "Bearer tok-inbox"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [
            { "id": "m2", "content": "second", "createdAt": "2024-05-02T10:00:00Z" },
            { "id": "m1", "content": "first", "createdAt": "2024-05-01T10:00:00Z" }
        ]})))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let messages = client.messages.messages("c1", None).await.unwrap();
    let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn sending_requires_content_and_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "message": { "id": "m9", "content": "hi" } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let orphan = NewMessage { content: "hi".into(), ..Default::default() };
    assert!(matches!(client.messages.send(&orphan).await, Err(ApiError::Validation(_))));

    let new = NewMessage { recipient_id: Some("u2".into()), content: "hi".into(), ..Default::default() };
    assert_eq!(client.messages.send(&new).await.unwrap().id, "m9");
}

#[tokio::test]
async fn conversations_degrade_when_backend_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/conversations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    assert!(client.messages.conversations(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn unread_notifications_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("unreadOnly", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "n1", "type": "reply", "message": "New reply", "read": false },
            { "id": "n2", "type": "badge", "message": "Unknown kind" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": { "count": 2 } })))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let unread = client.notifications.list(true, None).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0].kind, NotificationType::Reply);
    assert_eq!(unread[1].kind, NotificationType::Other);
    assert_eq!(client.notifications.unread_count().await.unwrap(), 2);
}

#[tokio::test]
async fn unread_count_is_zero_when_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    assert_eq!(client.notifications.unread_count().await.unwrap(), 0);
}

#[tokio::test]
async fn mark_all_read_hits_bulk_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/notifications/read-all"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/notifications/n1/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    client.notifications.mark_all_read().await.unwrap();
    client.notifications.mark_read("n1").await.unwrap();
}
