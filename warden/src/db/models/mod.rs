//! Database record models matching table schemas.
//!
//! These structs correspond directly to table rows and derive `sqlx::FromRow` so the
//! PostgreSQL backend can decode them; the in-memory backend stores the same structs.
//! They are distinct from the API models in [`crate::api::models`], which never expose
//! credential or token hashes.
//!
//! - [`identities`]: accounts, credential hashes and roles
//! - [`sessions`]: bearer sessions, stored by token digest
//! - [`password_reset_tokens`]: single-use, time-limited reset tokens
//! - [`questions`]: questions and their answers, the owned resources behind the ownership gate

pub mod identities;
pub mod password_reset_tokens;
pub mod questions;
pub mod sessions;
