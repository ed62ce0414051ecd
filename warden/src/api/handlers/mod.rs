//! HTTP request handlers, organized by resource.
//!
//! Handlers only deal with request parsing, validation of user input and response shaping.
//! Authentication, role and ownership checks happen in the gates from
//! [`crate::auth::middleware`], which are attached per route group in
//! [`crate::build_router`]; a handler that takes a [`crate::auth::current_user::CurrentIdentity`]
//! is only reachable behind the authentication gate.
//!
//! - [`auth`]: Registration, login, logout and password reset
//! - [`identities`]: Profiles and admin identity management
//! - [`questions`]: Questions, including promotion
//! - [`answers`]: Answers to questions
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status
//! and a user-safe message.

pub mod answers;
pub mod auth;
pub mod identities;
pub mod questions;
