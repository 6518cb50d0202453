use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use wweb::{ChatId, SendOptions, SessionState, WwebError, session_invalidated};

use super::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct SendRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusResponse {
    whatsapp: &'static str,
    qr_available: bool,
    session_state: SessionState,
}

pub(super) async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    // Readiness is checked before the body so a not-ready session answers
    // 400 whatever the caller posted.
    if !state.supervisor.is_ready() {
        return error_response(StatusCode::BAD_REQUEST, "backend session is not ready yet");
    }
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };
    if body.to.is_empty() || body.message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing parameters: to, message");
    }

    let chat_id = ChatId::normalize(&body.to);

    match state.client.is_registered_user(&chat_id).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(StatusCode::BAD_REQUEST, "recipient is not registered on the backend");
        }
        Err(err) => return send_failure(&state, err).await,
    }

    let options = SendOptions {
        suppress_read_receipt: true,
    };
    match state.client.send_message(&chat_id, &body.message, options).await {
        Ok(()) => {
            info!(target = "wweb.http", to = %chat_id, "message sent");
            (StatusCode::OK, Json(json!({ "status": "sent", "to": chat_id.as_str() }))).into_response()
        }
        Err(err) => send_failure(&state, err).await,
    }
}

/// Send-path failures split into "the session died under us" (distinct 503 so
/// callers know to retry shortly) and everything else (500 plus a
/// best-effort backend state diagnostic).
async fn send_failure(state: &AppState, err: WwebError) -> Response {
    let message = err.to_string();
    if session_invalidated(&message) {
        warn!(target = "wweb.http", error = %message, "session invalidated while sending; reconnecting");
        state.supervisor.session_invalidated(message);
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "backend session is reconnecting; retry in a few seconds",
        );
    }

    error!(target = "wweb.http", error = %message, "failed to send message");
    match state.client.get_state().await {
        Ok(diagnostic) => {
            info!(target = "wweb.http", state = %diagnostic, "backend state after send failure");
        }
        Err(state_err) => {
            warn!(target = "wweb.http", error = %state_err, "could not query backend state");
        }
    }
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to send message")
}

pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session_state = state.supervisor.state();
    Json(StatusResponse {
        whatsapp: if session_state.is_ready() { "ready" } else { "pending" },
        qr_available: state.supervisor.credential().is_some(),
        session_state,
    })
}

pub(super) async fn qr_page(State(state): State<AppState>) -> Response {
    let Some(credential) = state.supervisor.credential() else {
        return (
            StatusCode::NOT_FOUND,
            Html(
                "<html><body><p>No pairing code available. Wait for the gateway to issue one \
                 (it can take a minute or two) and reload this page.</p>\
                 <p><a href='/qr'>Reload</a></p></body></html>"
                    .to_string(),
            ),
        )
            .into_response();
    };

    let page = format!(
        "<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"></head>\
         <body style=\"font-family:sans-serif;text-align:center;padding:2rem\">\
         <h1>Link device</h1>\
         <p>Scan with your phone (WhatsApp &rarr; Linked devices)</p>\
         <img src=\"{}\" alt=\"QR\" style=\"max-width:100%\"/>\
         <p><a href=\"/qr\">Refresh</a></p></body></html>",
        credential.data_uri()
    );
    Html(page).into_response()
}

pub(super) async fn qr_png(State(state): State<AppState>) -> Response {
    match state.supervisor.credential() {
        Some(credential) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            credential.png().to_vec(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no pairing code available"),
    }
}

pub(super) async fn clear_session(State(state): State<AppState>) -> Response {
    match state.supervisor.clear_session().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "message": "session cleared; open /qr to pair again" })),
        )
            .into_response(),
        Err(err) => {
            error!(target = "wweb.http", error = %err, "failed to clear session");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to clear session")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
