//! Persistence backends.
//!
//! The [`repository`] module defines the store traits; [`InMemoryStore`] and
//! [`PostgresStore`] implement all of them. Application code only ever sees an
//! `Arc<dyn Store>`:
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden::db::handlers::{InMemoryStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
//! let identity = store.get_identity_by_username("alice").await?;
//! ```

pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{AnswerRepository, IdentityRepository, QuestionRepository, ResetTokenRepository, SessionRepository, Store};
