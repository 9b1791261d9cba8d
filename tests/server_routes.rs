//! HTTP surface tests using `axum-test`.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use world_helper::chatbase::{
    ApiMessage, ChatBackend, ChatbaseError, ConversationQuery, ConversationRecord,
    ConversationsResponse, HistorySource, TextStream,
};
use world_helper::server::router;
use world_helper::widget::{WidgetContext, WidgetStore};
use world_helper::AppState;

struct Canned(Vec<&'static str>);

#[async_trait::async_trait]
impl ChatBackend for Canned {
    async fn stream(&self, _messages: Vec<ApiMessage>) -> Result<TextStream, ChatbaseError> {
        let chunks: Vec<Result<String, ChatbaseError>> =
            self.0.iter().map(|c| Ok((*c).to_string())).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Never finishes until the sender is dropped.
struct Held(std::sync::Mutex<Option<mpsc::Receiver<Result<String, ChatbaseError>>>>);

#[async_trait::async_trait]
impl ChatBackend for Held {
    async fn stream(&self, _messages: Vec<ApiMessage>) -> Result<TextStream, ChatbaseError> {
        let rx = self.0.lock().unwrap().take().expect("single exchange");
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

struct OneConversation;

#[async_trait::async_trait]
impl HistorySource for OneConversation {
    async fn fetch(&self, _query: &ConversationQuery) -> Result<ConversationsResponse, ChatbaseError> {
        Ok(ConversationsResponse {
            data: vec![ConversationRecord {
                id: "c1".to_string(),
                created_at: "2024-05-01T08:30:00Z".to_string(),
                messages: Vec::new(),
                chatbot_id: "bot".to_string(),
                customer: None,
                source: "Widget".to_string(),
            }],
        })
    }
}

fn setup(chat: Arc<dyn ChatBackend>) -> (TestServer, WidgetStore) {
    let widgets = WidgetStore::new(WidgetContext::new(
        chat,
        Arc::new(OneConversation),
        ConversationQuery::new("bot"),
    ));
    let state = AppState {
        widgets: widgets.clone(),
    };
    (TestServer::new(router(state)).unwrap(), widgets)
}

async fn create_widget(server: &TestServer) -> String {
    let response = server.post("/api/widgets").await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_index_creates_and_reuses_widget() {
    let (server, widgets) = setup(Arc::new(Canned(vec![])));

    let response = server.get("/").await;
    response.assert_status_ok();
    assert_eq!(widgets.len(), 1);
    let id = widgets.list_ids().remove(0);
    let html = response.text();
    assert!(html.contains(&id));
    assert!(html.contains("Hello! How can I help you?"));

    server
        .get("/")
        .add_query_param("widget", &id)
        .await
        .assert_status_ok();
    assert_eq!(widgets.len(), 1);

    server
        .get("/")
        .add_query_param("widget", "gone")
        .await
        .assert_status_ok();
    assert_eq!(widgets.len(), 2);
}

#[tokio::test]
async fn test_message_streams_sse_and_appends_reply() {
    let (server, _widgets) = setup(Arc::new(Canned(vec!["Hel", "lo!"])));
    let id = create_widget(&server).await;

    let response = server
        .post(&format!("/api/widgets/{id}/messages"))
        .json(&json!({ "message": "hi" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/event-stream");

    let body = response.text();
    let start = body.find("event: stream.start").unwrap();
    let partial = body.find("event: message.partial").unwrap();
    let appended = body.find("event: message.appended").unwrap();
    let done = body.find("event: done").unwrap();
    assert!(start < partial && partial < appended && appended < done);
    assert!(body.contains("Hello!"));

    let snapshot: Value = server.get(&format!("/api/widgets/{id}")).await.json();
    let messages = snapshot["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["sender"], "bot");
    assert_eq!(messages[2]["text"], "Hello!");
    assert_eq!(snapshot["busy"], false);
}

#[tokio::test]
async fn test_refused_messages() {
    let (server, _widgets) = setup(Arc::new(Canned(vec![])));
    let id = create_widget(&server).await;
    let path = format!("/api/widgets/{id}/messages");

    server
        .post(&path)
        .json(&json!({ "message": "   " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Empty reply: the user message stays last.
    server
        .post(&path)
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status_ok();
    server
        .post(&path)
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .post("/api/widgets/unknown/messages")
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_while_busy_conflicts() {
    let (tx, rx) = mpsc::channel(4);
    let (server, widgets) = setup(Arc::new(Held(std::sync::Mutex::new(Some(rx)))));
    let widget = widgets.create_with_id("w");

    let mut events = widget.submit("first").unwrap();
    events.next().await;

    server
        .post("/api/widgets/w/messages")
        .json(&json!({ "message": "second" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    drop(tx);
    while events.next().await.is_some() {}
    assert_eq!(widget.messages().len(), 2);
}

#[tokio::test]
async fn test_reload_mid_exchange_shows_streaming_reply() {
    let (tx, rx) = mpsc::channel(4);
    let (server, widgets) = setup(Arc::new(Held(std::sync::Mutex::new(Some(rx)))));
    let widget = widgets.create_with_id("w");

    let mut events = widget.submit("hi").unwrap();
    events.next().await;

    let page = server.get("/").add_query_param("widget", "w").await.text();
    assert!(page.contains(r#"data-busy="true""#));
    assert!(page.contains(r#"class="message-wrapper bot typing""#));

    tx.send(Ok("Visit **World**".to_string())).await.unwrap();
    events.next().await;

    let page = server.get("/").add_query_param("widget", "w").await.text();
    assert!(page.contains(r#"class="message-wrapper bot streaming""#));
    assert!(page.contains("<strong>World</strong>"));
    assert!(page.contains(r#"autocomplete="off" disabled"#));

    let snapshot: Value = server.get("/api/widgets/w").await.json();
    assert_eq!(snapshot["busy"], true);
    assert_eq!(snapshot["streaming_text"], "Visit **World**");

    drop(tx);
    while events.next().await.is_some() {}

    let page = server.get("/").add_query_param("widget", "w").await.text();
    assert!(page.contains(r#"data-busy="false""#));
    assert!(!page.contains(r#"class="message-wrapper bot streaming""#));
    assert!(page.contains("<strong>World</strong>"));
}

#[tokio::test]
async fn test_view_actions() {
    let (server, _widgets) = setup(Arc::new(Canned(vec![])));
    let id = create_widget(&server).await;

    server
        .post(&format!("/api/widgets/{id}/view/sources"))
        .await
        .assert_status_ok();
    let view: Value = server
        .post(&format!("/api/widgets/{id}/view/info"))
        .await
        .json();
    assert_eq!(view["popup"], "info");
    assert_eq!(view["backdrop"], true);

    let view: Value = server
        .post(&format!("/api/widgets/{id}/view/backdrop"))
        .await
        .json();
    assert_eq!(view["popup"], "none");
    assert_eq!(view["backdrop"], false);

    server
        .post(&format!("/api/widgets/{id}/view/explode"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_copy_routes() {
    let (server, _widgets) = setup(Arc::new(Canned(vec!["**bold**"])));
    let id = create_widget(&server).await;
    server
        .post(&format!("/api/widgets/{id}/messages"))
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status_ok();

    let link: Value = server
        .post(&format!("/api/widgets/{id}/copy/link"))
        .json(&json!({ "url": "https://world.org/about" }))
        .await
        .json();
    assert_eq!(link["text"], "https://world.org/about");
    assert_eq!(link["notice"], "Link copied!");

    let copied: Value = server
        .post(&format!("/api/widgets/{id}/copy/messages/2"))
        .await
        .json();
    assert_eq!(copied["text"], "bold");
    assert_eq!(copied["index"], 2);

    server
        .post(&format!("/api/widgets/{id}/copy/messages/1"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let snapshot: Value = server.get(&format!("/api/widgets/{id}")).await.json();
    assert_eq!(snapshot["link_notice"], "Link copied!");
    assert_eq!(snapshot["copied_message"], 2);
}

#[tokio::test]
async fn test_conversations_route() {
    let (server, widgets) = setup(Arc::new(Canned(vec![])));
    let widget = widgets.create_with_id("fresh");

    let history: Value = server.get("/api/widgets/fresh/conversations").await.json();
    assert_eq!(history["status"], "loaded");
    assert_eq!(history["previews"][0]["id"], "c1");
    assert_eq!(history["previews"][0]["date"], "2024-05-01");
    assert!(widget.mount().is_none());
}

#[tokio::test]
async fn test_delete_widget() {
    let (server, widgets) = setup(Arc::new(Canned(vec![])));
    let id = create_widget(&server).await;

    server
        .delete(&format!("/api/widgets/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(widgets.is_empty());

    server
        .get(&format!("/api/widgets/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/widgets/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
