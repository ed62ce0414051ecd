//! API request and response data models.
//!
//! API models are distinct from the database models in [`crate::db::models`], so the
//! storage representation can change without changing the public contract. In particular
//! credential hashes and token digests never appear here. All models are annotated with
//! `utoipa` for the generated OpenAPI document.
//!
//! - [`auth`]: Login, registration and password reset payloads
//! - [`identities`]: Identity profiles and role changes
//! - [`questions`]: Questions and answers
//! - [`pagination`]: `skip`/`limit` query parameters

pub mod auth;
pub mod identities;
pub mod pagination;
pub mod questions;
