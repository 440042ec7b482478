//! HTTP surface for the portal.
//!
//! One route handles the whole exchange: GET renders the form, POST
//! applies the submitted fields. Submissions arrive as ordered
//! `(name, value)` pairs so repeated field names (multi-select options)
//! survive the decode. The transport owns everything else.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use tokio::sync::Mutex;

use confportal_core::ConfigStorage;

use crate::session::{SessionController, SessionOutcome};

/// Shared handle to the single session controller.
///
/// The controller is not reentrant; the mutex serializes requests so one
/// exchange is in flight at a time.
pub type PortalState<S> = Arc<Mutex<SessionController<S>>>;

/// Build the portal router with its single form route at `/`.
pub fn portal_router<S>(portal: PortalState<S>) -> Router
where
    S: ConfigStorage + Send + 'static,
{
    Router::new()
        .route("/", get(render_handler::<S>).post(submit_handler::<S>))
        .with_state(portal)
}

/// GET `/` — initial page load, renders the current values.
async fn render_handler<S>(
    State(portal): State<PortalState<S>>,
    Query(fields): Query<Vec<(String, String)>>,
) -> Response
where
    S: ConfigStorage + Send + 'static,
{
    let mut controller = portal.lock().await;
    respond(controller.handle_request(&fields))
}

/// POST `/` — form submission.
async fn submit_handler<S>(
    State(portal): State<PortalState<S>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response
where
    S: ConfigStorage + Send + 'static,
{
    let mut controller = portal.lock().await;
    respond(controller.handle_request(&fields))
}

fn respond(outcome: SessionOutcome) -> Response {
    match outcome {
        SessionOutcome::Page(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        // Terminal cycles send no body; the caller owns the goodbye page.
        SessionOutcome::Terminated => StatusCode::NO_CONTENT.into_response(),
    }
}
