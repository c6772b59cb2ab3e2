//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (resolve session, apply route credential policy)
//!     → headers.rs (strip hop-by-hop, keep the rest)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: `required` routes never reach the network without a credential
//! - Credentials are resolved per request, never cached

pub mod auth;
pub mod headers;

pub use auth::{AuthContext, AuthPolicy, RequestSessionResolver, SessionResolver};
