//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is served under `/api`:
//!
//! - **Authentication** (`/register`, `/login`, `/logout`, `/forgot-password/*`)
//! - **Identities** (`/users/*`) and admin management (`/admin/identities/*`)
//! - **Questions** (`/questions/*`, `/premium/questions/*`) and their answers
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at
//! `/api/openapi.json` and browsable at `/docs`.

pub mod handlers;
pub mod models;
