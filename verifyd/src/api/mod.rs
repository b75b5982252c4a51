//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//! - **[`models`]**: Request/response data structures
//!
//! Everything lives under `/api/v1`. Authentication is a JWT session cookie
//! (or bearer token); errors are JSON `{"error": "..."}` with the status
//! classes documented in [`crate::errors`].

pub mod handlers;
pub mod models;
