//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, gateway headers, tracing)
//!     → gateway.rs (mapped or catch-all pipeline)
//!     → request.rs (fresh request ID, stream negotiation)
//!     → [routing + forward subsystems]
//!     → response.rs (error envelope, request ID, observation record)
//!     → Send to client
//! ```

pub mod gateway;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CallTrace, RequestContext};
pub use server::{AppState, GatewayServer};
