//! # confportal-web
//!
//! HTML form layer and HTTP surface for the device configuration portal.
//!
//! This crate provides:
//! - The form codec: schema + values → form markup, submitted fields →
//!   value store
//! - The session controller tying decode → persist → callbacks → render
//!   together
//! - A single Axum route serving the portal
//!
//! ## Usage
//!
//! ```rust,ignore
//! use confportal_web::{portal_router, SessionController};
//!
//! let mut controller = SessionController::new(state, storage);
//! controller.load()?;
//! let app = portal_router(Arc::new(Mutex::new(controller)));
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod form;
pub mod routes;
pub mod session;

// Re-exports
pub use form::{apply_submission, render_form, ButtonSet, SaveStatus};
pub use routes::{portal_router, PortalState};
pub use session::{SessionController, SessionOutcome};
