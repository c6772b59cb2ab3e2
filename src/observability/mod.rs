//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every forwarded call produces:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!     → sink.rs (ObservationRecord in the recent-call ring)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Diagnostics endpoint (admin/, newest first)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs, the sink and the response
//! - The sink is the only mutable state shared across requests

pub mod logging;
pub mod metrics;
pub mod sink;

pub use sink::{ObservabilitySink, ObservationRecord};
