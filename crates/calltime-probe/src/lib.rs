//! Call-timing engine for calltime.
//!
//! This crate turns textual function identifiers into tracked targets and
//! aggregates per-function timing while those targets run:
//! - **Resolution**: `"Type.Method"` style identifiers are resolved against a
//!   read-only [`FunctionCatalog`] with fallback namespaces
//! - **Registration**: every resolved target gets a dense [`TrackedId`] that
//!   indexes the stats table directly
//! - **Aggregation**: call count, total time, max time and fault count are
//!   updated with atomics from any number of threads
//!
//! # Usage
//!
//! ```rust,ignore
//! use calltime_probe::{CallSiteBinder, StaticCatalog, Tracker};
//!
//! let catalog = StaticCatalog::builder()
//!     .function("app.cache", "Lru", "get", &["u64"])
//!     .build();
//! let tracker = Tracker::new(catalog, CallSiteBinder::new());
//! let report = tracker.register(["Lru.get"]);
//! tracker.start();
//!
//! // every call routed through the binder is timed
//! let value = tracker.binder().call(target, || cache.get(42));
//!
//! for row in tracker.drain().rows() {
//!     println!("{} {} {:?}", row.name, row.calls, row.total);
//! }
//! ```
//!
//! When the session is stopped, the probes cost one atomic load per call.

pub mod binder;
pub mod catalog;
pub mod clock;
pub mod error;
mod epoch;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod session;
pub mod stats;
pub mod tracker;

pub use binder::{CallSiteBinder, InstrumentationBinder};
pub use catalog::{CatalogEntry, FunctionCatalog, StaticCatalog, TargetId};
pub use error::{BindError, EntryWarning, ResolveError};
pub use registry::{MethodRegistry, Registration, TrackedId};
pub use request::{TrackRequest, compose_identifiers};
pub use resolver::SymbolIndex;
pub use session::{CallState, Probe, ReportSink, TimedScope, TimingSession};
pub use stats::{StatRow, StatSnapshot, StatsTable};
pub use tracker::{RegisterReport, Tracker};
