use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::page::render_widget;
use crate::widget::events::sse_event;
use crate::chatbase::ConversationPreview;
use crate::widget::{
    ChatWidget, CopyOutcome, HistoryState, ViewAction, ViewState, WidgetContext, WidgetError,
    WidgetSnapshot, WidgetStore,
};

/// Events buffered between an exchange and a slow page.
const EVENT_BUFFER: usize = 64;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, context: WidgetContext) -> anyhow::Result<()> {
    let widgets = WidgetStore::new(context);
    let _sweeper =
        widgets.spawn_sweeper(Duration::from_secs(config.widget.idle_timeout_secs));

    let state = AppState { widgets };

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %format!("http://{addr}"),
        "Server started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // HTML page
        .route("/", get(index_handler))
        // Widget API
        .route("/api/widgets", post(api_create_widget))
        .route(
            "/api/widgets/{id}",
            get(api_get_widget).delete(api_delete_widget),
        )
        .route("/api/widgets/{id}/messages", post(api_send_message))
        .route("/api/widgets/{id}/conversations", get(api_get_conversations))
        .route("/api/widgets/{id}/view/{action}", post(api_view_action))
        .route("/api/widgets/{id}/copy/link", post(api_copy_link))
        .route("/api/widgets/{id}/copy/messages/{index}", post(api_copy_message))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters of the page.
#[derive(Debug, Deserialize)]
struct IndexQuery {
    /// Widget to re-render after an interaction.
    #[serde(default)]
    widget: Option<String>,
}

/// GET / - Render the widget page, creating a widget for a fresh load.
async fn index_handler(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> impl IntoResponse {
    let widget = match query.widget.as_deref().and_then(|id| state.widgets.get(id)) {
        Some(widget) => {
            widget.touch();
            widget
        }
        None => {
            let widget = state.widgets.create();
            tracing::debug!(widget_id = %widget.id(), "Created widget for page load");
            widget
        }
    };
    widget.mount();

    Html(render_widget(&widget.snapshot()))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

type ApiError = (StatusCode, String);

/// Request body for posting a message.
#[derive(Debug, Deserialize)]
struct MessageRequest {
    /// User input as typed.
    message: String,
}

/// Request body for copying a link.
#[derive(Debug, Deserialize)]
struct CopyLinkRequest {
    url: String,
}

/// Response from copying a message.
#[derive(Debug, Serialize)]
struct CopyMessageResponse {
    /// Plain text placed on the clipboard.
    text: String,
    index: usize,
}

/// View state plus the derived backdrop flag.
#[derive(Debug, Serialize)]
struct ViewResponse {
    #[serde(flatten)]
    view: ViewState,
    backdrop: bool,
}

/// History panel contents.
#[derive(Debug, Serialize)]
struct HistoryResponse {
    #[serde(flatten)]
    state: HistoryState,
    previews: Vec<ConversationPreview>,
}

fn find_widget(state: &AppState, id: &str) -> Result<ChatWidget, ApiError> {
    let widget = state
        .widgets
        .get(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Widget not found: {id}")))?;
    widget.touch();
    Ok(widget)
}

fn widget_error(e: &WidgetError) -> Response {
    let status = match e {
        WidgetError::EmptyMessage => StatusCode::UNPROCESSABLE_ENTITY,
        WidgetError::Busy => StatusCode::CONFLICT,
        // A repeated message is ignored, not rejected.
        WidgetError::DuplicateMessage => return StatusCode::NO_CONTENT.into_response(),
        WidgetError::NotCopyable(_) => StatusCode::NOT_FOUND,
        WidgetError::Clipboard(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

/// POST /api/widgets - Create a widget.
async fn api_create_widget(State(state): State<AppState>) -> Json<WidgetSnapshot> {
    let widget = state.widgets.create();
    widget.mount();
    Json(widget.snapshot())
}

/// GET /api/widgets/{id} - Get widget state.
async fn api_get_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WidgetSnapshot>, ApiError> {
    Ok(Json(find_widget(&state, &id)?.snapshot()))
}

/// DELETE /api/widgets/{id} - Drop a widget.
async fn api_delete_widget(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.widgets.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// POST /api/widgets/{id}/messages - Submit a message and stream the reply.
async fn api_send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Response, Response> {
    let widget = find_widget(&state, &id).map_err(IntoResponse::into_response)?;

    tracing::info!(
        widget_id = %id,
        message_length = req.message.len(),
        "Received chat message"
    );

    let mut events = widget.submit(&req.message).map_err(|e| {
        tracing::debug!(widget_id = %id, reason = %e, "Message not submitted");
        widget_error(&e)
    })?;

    // The exchange runs to completion even if the page goes away.
    let (tx, rx) = tokio::sync::mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        let mut page_gone = false;
        while let Some(event) = events.next().await {
            if !page_gone && tx.send(event).await.is_err() {
                tracing::debug!(widget_id = %id, "Page disconnected; finishing exchange");
                page_gone = true;
            }
        }
    });

    let sse_stream =
        ReceiverStream::new(rx).map(|event| Ok::<String, Infallible>(sse_event(&event)));
    Ok(build_sse_response(Body::from_stream(sse_stream)))
}

/// GET /api/widgets/{id}/conversations - History panel contents.
async fn api_get_conversations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let widget = find_widget(&state, &id)?;

    if let Some(handle) = widget.mount() {
        if let Err(e) = handle.await {
            tracing::error!(widget_id = %id, error = %e, "History task failed");
        }
    }

    let history = widget.history();
    Ok(Json(HistoryResponse {
        previews: history.previews(),
        state: history,
    }))
}

/// POST /api/widgets/{id}/view/{action} - Toggle popups and panels.
async fn api_view_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<ViewResponse>, ApiError> {
    let widget = find_widget(&state, &id)?;
    let action: ViewAction = action
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;

    let view = widget.apply_view(action);
    Ok(Json(ViewResponse {
        view,
        backdrop: view.backdrop_visible(),
    }))
}

/// POST /api/widgets/{id}/copy/link - Copy a clicked link.
async fn api_copy_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CopyLinkRequest>,
) -> Result<Json<CopyOutcome>, ApiError> {
    let widget = find_widget(&state, &id)?;
    Ok(Json(widget.copy_link(&req.url).await))
}

/// POST /api/widgets/{id}/copy/messages/{index} - Copy a bot message as plain text.
async fn api_copy_message(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<CopyMessageResponse>, Response> {
    let widget = find_widget(&state, &id).map_err(IntoResponse::into_response)?;
    let text = widget
        .copy_message(index)
        .await
        .map_err(|e| widget_error(&e))?;
    Ok(Json(CopyMessageResponse { text, index }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn build_sse_response(body: Body) -> Response {
    (
        [
            ("Content-Type", "text/event-stream"),
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
            ("X-Accel-Buffering", "no"),
        ],
        body,
    )
        .into_response()
}
