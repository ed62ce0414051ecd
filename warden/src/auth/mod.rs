//! Authentication and authorization system.
//!
//! This module provides:
//! - Password hashing and verification using Argon2id
//! - Opaque bearer session tokens with single-active-session supersession
//! - Single-use password reset tokens
//! - Gates (middleware) for authentication, role checks and resource ownership
//!
//! # Sessions
//!
//! Clients log in via `POST /api/login` with username and password and receive an opaque
//! token, which they pass back as `Authorization: Bearer <token>`. Only a SHA-256 digest of
//! the token is stored. Logging in again revokes the previous session; resetting the
//! password revokes all of them.
//!
//! # Authorization
//!
//! Access control is layered per route group:
//! - **Authentication**: [`middleware::authenticate`] resolves the token and injects a
//!   [`current_user::CurrentIdentity`]
//! - **Roles**: [`middleware::require_role`] admits exactly one role (`standard`, `premium`
//!   or `admin`); roles are not hierarchical
//! - **Ownership**: [`middleware::require_owner`] compares the owner of the resource named
//!   in the path with the authenticated identity
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for getting the authenticated identity in handlers
//! - [`middleware`]: Route protection middleware
//! - [`password`]: Password hashing, verification and policy
//! - [`token`]: Random token generation and digests
//! - [`session`]: Session issuance, resolution and revocation
//! - [`reset`]: Password reset tokens and their delivery
//! - [`service`]: The login, registration and reset operations
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use warden::auth::current_user::CurrentIdentity;
//!
//! async fn protected_handler(identity: CurrentIdentity) -> String {
//!     format!("Hello, {}!", identity.id)
//! }
//! ```

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod reset;
pub mod service;
pub mod session;
pub mod token;
