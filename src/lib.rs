//! # growpromise
//!
//! Session core for the GrowPromise parent/child promise tracker client.
//!
//! The app itself is screens and navigation; this crate holds the part with
//! real state: who is logged in, how that survives a restart, and where the
//! navigator is allowed to go.
//!
//! ARCHITECTURE
//! ============
//! - [`store::SessionStore`] owns the in-memory [`session::Session`] and is the
//!   only writer of the persisted credential record.
//! - [`resolver::AuthStatusResolver`] settles the session once at boot.
//! - [`guard::RouteGuard`] turns (route, session) into at most one redirect.
//! - [`api::AuthApi`] and [`storage::KeyValueStore`] are the two injected
//!   collaborators; [`context::AppContext`] wires everything together.

pub mod account;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod flags;
pub mod guard;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod store;

#[cfg(test)]
mod test_support;

pub use context::AppContext;
pub use error::{AuthError, ValidationError};
pub use session::{Session, User, UserType};
