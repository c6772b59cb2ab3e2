//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup, most specific path first)
//!     → matcher.rs (segment match, parameter capture)
//!     → Return: mapping + rendered target path, or NotFound / MethodNotAllowed
//!
//! Route Compilation (at startup):
//!     BUILTIN_ROUTES + [[routes]] from config
//!     → table.rs (parse patterns and templates, detect overlaps)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - At most one mapping per (path shape, method)

pub mod matcher;
pub mod router;
pub mod table;

pub use router::{MethodSet, ResolvedRoute, RouteMapping, RouteSummary, RouteTable};
pub use table::BUILTIN_ROUTES;
