//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Services   │  (auth, api handlers)
//! └──────┬──────┘
//!        │  Arc<dyn Store>
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::handlers - InMemoryStore / PostgresStore)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: store traits and their backends
//! - [`models`]: database record structures matching table schemas
//! - [`errors`]: database-specific error types
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! warden::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
